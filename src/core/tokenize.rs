/// Corpus tokenizer — turns raw lines into normalized word tokens.

/// Characters stripped from both ends of every word.
const STRIPPED: &[char] = &[
    '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '_', '+', '-', '=', '{', '}', '[', ']',
    '\\', '|', ';', '\'', ':', '"', ',', '.', '<', '>', '/', '?',
];

/// Split a line on spaces, lower-case each word, and strip surrounding
/// punctuation. Words that end up empty are dropped.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split(' ')
        .filter_map(|word| {
            let lowered = word.trim().to_lowercase();
            let cleaned = lowered.trim_matches(STRIPPED);
            (!cleaned.is_empty()).then(|| cleaned.to_string())
        })
        .collect()
}

/// Tokenize every line of `text` into one flat sequence.
pub fn tokenize_corpus(text: &str) -> Vec<String> {
    text.lines().flat_map(tokenize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_and_lowers() {
        assert_eq!(tokenize("Hello, world!"), vec!["hello", "world"]);
        assert_eq!(tokenize("  Here,   kitty kitty. "), vec!["here", "kitty", "kitty"]);
    }

    #[test]
    fn inner_punctuation_survives() {
        assert_eq!(tokenize("don't (stop) e-mail"), vec!["don't", "stop", "e-mail"]);
    }

    #[test]
    fn punctuation_only_words_vanish() {
        assert!(tokenize("-- ... !!").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn corpus_spans_lines() {
        let tokens = tokenize_corpus("Say hello.\nTo be\n\nor not");
        assert_eq!(tokens, vec!["say", "hello", "to", "be", "or", "not"]);
    }
}
