/// Markov chain text generator — training, sampling, and sentence generation.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::codec::{self, CodecError};
use crate::core::matrix::{Axis, SparseTransitionTable, DEFAULT_WEIGHT};
use crate::core::sampler::{self, SamplerOptions};

#[derive(Debug, Error)]
pub enum MarkovError {
    #[error("training needs at least 2 tokens, got {0}")]
    SequenceTooShort(usize),
    #[error("chain has no states to sample from")]
    EmptyChain,
    #[error("unknown state: {0}")]
    UnknownState(String),
    #[error("invalid sentence length range {min}..={max}")]
    InvalidLengthRange { min: usize, max: usize },
    #[error("generation failed after {0} restarts (no usable transitions)")]
    GenerationFailed(u32),
}

/// Punctuation appended to generated sentences.
pub const SENTENCE_ENDERS: &[char] = &['.', '!', '?'];

/// A first-order Markov chain over string states.
///
/// Rows of the table are preceding states and columns are following states,
/// so a row is the outgoing-transition distribution of its state. Weights
/// are accumulated increments, not probabilities.
///
/// Usage:
///
/// ```
/// use attain::core::markov::MarkovChain;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut chain = MarkovChain::new();
/// chain.train(&["big", "seq", "of", "prepped", "words"]).unwrap();
///
/// let mut rng = StdRng::seed_from_u64(42);
/// assert_eq!(chain.generate(4, None, &mut rng).unwrap().len(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarkovChain {
    table: SparseTransitionTable,
    /// Every label seen on either axis, in first-seen order.
    states: Axis,
    options: SamplerOptions,
}

impl MarkovChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SamplerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Wrap an existing table, e.g. one loaded from disk.
    ///
    /// States are the table's row labels followed by column-only labels.
    pub fn from_table(table: SparseTransitionTable) -> Self {
        let mut states = Axis::new();
        for label in table.row_labels().iter().chain(table.column_labels()) {
            states.insert(label);
        }
        Self {
            table,
            states,
            options: SamplerOptions::default(),
        }
    }

    pub fn options(&self) -> &SamplerOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SamplerOptions) {
        self.options = options;
    }

    pub fn table(&self) -> &SparseTransitionTable {
        &self.table
    }

    /// Known states in first-seen order.
    pub fn states(&self) -> &[String] {
        self.states.labels()
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop every learned state and weight. Sampling options are kept.
    pub fn reset(&mut self) {
        self.table = SparseTransitionTable::with_default(self.table.default_value());
        self.states = Axis::new();
    }

    /// Learn transitions from one ordered token sequence.
    ///
    /// Each adjacent pair (prev, curr) adds `1 / (N - 1)` to the weight at
    /// (prev, curr). Training again adds to the existing weights.
    pub fn train<S: AsRef<str>>(&mut self, sequence: &[S]) -> Result<(), MarkovError> {
        if sequence.len() < 2 {
            return Err(MarkovError::SequenceTooShort(sequence.len()));
        }

        let increment = 1.0 / (sequence.len() - 1) as f64;
        for pair in sequence.windows(2) {
            let (prev, curr) = (pair[0].as_ref(), pair[1].as_ref());
            let current = self.table.get(prev, curr);
            self.table.set(prev, curr, current + increment);
            self.states.insert(prev);
            self.states.insert(curr);
        }

        debug!(
            tokens = sequence.len(),
            states = self.states.len(),
            increment,
            "trained markov chain"
        );
        Ok(())
    }

    /// Pick a state uniformly from the vocabulary.
    pub fn random_state<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&str, MarkovError> {
        self.states
            .labels()
            .choose(rng)
            .map(String::as_str)
            .ok_or(MarkovError::EmptyChain)
    }

    /// Pick a restart state other than `dead_end` whenever another state exists.
    fn restart_state<R: Rng + ?Sized>(
        &self,
        dead_end: &str,
        rng: &mut R,
    ) -> Result<&str, MarkovError> {
        let labels = self.states.labels();
        match self.states.offset(dead_end) {
            Some(skip) if labels.len() > 1 => {
                let mut pick = rng.gen_range(0..labels.len() - 1);
                if pick >= skip {
                    pick += 1;
                }
                Ok(&labels[pick])
            }
            _ => self.random_state(rng),
        }
    }

    /// Draw the state that follows `current`.
    ///
    /// When `current` has nothing to draw from, sampling restarts from a
    /// different random state, up to the configured restart budget.
    pub fn next_state<'a, R: Rng + ?Sized>(
        &'a self,
        current: &str,
        rng: &mut R,
    ) -> Result<&'a str, MarkovError> {
        if self.is_empty() {
            return Err(MarkovError::EmptyChain);
        }

        let mut state = current;
        for _ in 0..=self.options.max_restarts {
            let sampled =
                sampler::sample_row(&self.table, state, &self.options, self.len(), rng);
            if let Some(label) = sampled.and_then(|offset| self.table.column_label(offset)) {
                return Ok(label);
            }

            let restart = self.restart_state(state, rng)?;
            debug!(dead_end = state, restart, "no outgoing transitions, restarting");
            state = restart;
        }

        Err(MarkovError::GenerationFailed(self.options.max_restarts))
    }

    /// Generate `length` states, the first being `start` or a random state.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        length: usize,
        start: Option<&str>,
        rng: &mut R,
    ) -> Result<Vec<String>, MarkovError> {
        if self.is_empty() {
            return Err(MarkovError::EmptyChain);
        }
        if length == 0 {
            return Ok(Vec::new());
        }

        let first = match start {
            Some(state) if self.contains(state) => state,
            Some(state) => return Err(MarkovError::UnknownState(state.to_string())),
            None => self.random_state(rng)?,
        };

        let mut states = Vec::with_capacity(length);
        states.push(first.to_string());
        while states.len() < length {
            let last = &states[states.len() - 1];
            let next = self.next_state(last, rng)?.to_string();
            states.push(next);
        }
        Ok(states)
    }

    /// Generate a capitalised pseudo-sentence of `min_length..=max_length` words
    /// ending in `.`, `!` or `?`.
    pub fn generate_sentence<R: Rng + ?Sized>(
        &self,
        min_length: usize,
        max_length: usize,
        rng: &mut R,
    ) -> Result<String, MarkovError> {
        if min_length == 0 || min_length > max_length {
            return Err(MarkovError::InvalidLengthRange {
                min: min_length,
                max: max_length,
            });
        }

        let length = rng.gen_range(min_length..=max_length);
        let words = self.generate(length, None, rng)?;
        let ender = SENTENCE_ENDERS.choose(rng).copied().unwrap_or('.');

        let mut sentence = words.join(" ");
        sentence.push(ender);
        Ok(capitalize(&sentence))
    }

    /// Write the table as a dense CSV grid.
    pub fn to_csv(&self, path: &Path) -> Result<(), CodecError> {
        codec::save_table(&self.table, path, codec::ModelFormat::Csv)
    }

    pub fn from_csv(path: &Path) -> Result<Self, CodecError> {
        codec::load_table(path, codec::ModelFormat::Csv, DEFAULT_WEIGHT).map(Self::from_table)
    }

    /// Write the table's set cells as sparse JSON.
    pub fn to_json(&self, path: &Path) -> Result<(), CodecError> {
        codec::save_table(&self.table, path, codec::ModelFormat::Json)
    }

    pub fn from_json(path: &Path) -> Result<Self, CodecError> {
        codec::load_table(path, codec::ModelFormat::Json, DEFAULT_WEIGHT).map(Self::from_table)
    }
}

impl fmt::Display for MarkovChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} known states", self.len())
    }
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::Sampling;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn abab_chain() -> MarkovChain {
        let mut chain = MarkovChain::new();
        chain.train(&["a", "b", "a", "b"]).unwrap();
        chain
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn initial_chain_is_empty() {
        let chain = MarkovChain::new();
        assert_eq!(chain.len(), 0);
        assert!(chain.is_empty());
        assert_eq!(chain.to_string(), "0 known states");
    }

    #[test]
    fn train_accumulates_increments() {
        let chain = abab_chain();
        let table = chain.table();

        // (a, b) is seen twice, (b, a) once, each worth 1/3.
        assert!(approx(table.get("a", "b"), 2.0 / 3.0));
        assert!(approx(table.get("b", "a"), 1.0 / 3.0));
        assert_eq!(table.get("a", "a"), 0.0);
        assert_eq!(table.get("b", "b"), 0.0);
        assert_eq!(table.sparse_row("a").len(), 1);
        assert_eq!(table.sparse_row("b").len(), 1);
    }

    #[test]
    fn training_twice_adds_weights() {
        let mut chain = MarkovChain::new();
        chain.train(&["x", "y"]).unwrap();
        chain.train(&["x", "y"]).unwrap();
        assert!(approx(chain.table().get("x", "y"), 2.0));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn train_rejects_short_sequences() {
        let mut chain = MarkovChain::new();
        assert!(matches!(
            chain.train(&["alone"]),
            Err(MarkovError::SequenceTooShort(1))
        ));
        let empty: [&str; 0] = [];
        assert!(matches!(
            chain.train(&empty),
            Err(MarkovError::SequenceTooShort(0))
        ));
        assert!(chain.is_empty());
    }

    #[test]
    fn vocabulary_membership() {
        let chain = abab_chain();
        assert!(chain.contains("a"));
        assert!(chain.contains("b"));
        assert!(!chain.contains("c"));
        assert_eq!(chain.states(), ["a", "b"].map(String::from));
    }

    #[test]
    fn last_token_is_a_state() {
        let mut chain = MarkovChain::new();
        chain.train(&["one", "two", "three"]).unwrap();
        assert!(chain.contains("three"));
        assert!(!chain.table().contains_row("three"));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn reset_drops_everything() {
        let mut chain = abab_chain();
        chain.reset();
        assert!(chain.is_empty());
        assert_eq!(chain.table().cell_count(), 0);
        chain.train(&["a", "b"]).unwrap();
        assert!(approx(chain.table().get("a", "b"), 1.0));
    }

    #[test]
    fn empty_chain_sampling_errors() {
        let chain = MarkovChain::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(chain.random_state(&mut rng), Err(MarkovError::EmptyChain)));
        assert!(matches!(chain.generate(3, None, &mut rng), Err(MarkovError::EmptyChain)));
        assert!(matches!(
            chain.next_state("a", &mut rng),
            Err(MarkovError::EmptyChain)
        ));
    }

    #[test]
    fn next_state_follows_only_transition() {
        let chain = abab_chain();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(chain.next_state("a", &mut rng).unwrap(), "b");
            assert_eq!(chain.next_state("b", &mut rng).unwrap(), "a");
        }
    }

    #[test]
    fn dead_end_restarts_elsewhere() {
        let mut chain = MarkovChain::new();
        chain.train(&["start", "middle", "end"]).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        // "end" has no outgoing row, so sampling restarts from another state.
        for _ in 0..20 {
            let next = chain.next_state("end", &mut rng).unwrap();
            assert!(next == "middle" || next == "end");
        }
    }

    #[test]
    fn unusable_model_fails_instead_of_looping() {
        let mut table = SparseTransitionTable::new();
        table.set("a", "b", 0.0);
        let mut chain = MarkovChain::from_table(table);
        chain.set_options(SamplerOptions {
            max_restarts: 5,
            ..SamplerOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            chain.next_state("a", &mut rng),
            Err(MarkovError::GenerationFailed(5))
        ));
    }

    #[test]
    fn quantized_chain_survives_huge_loaded_weights() {
        let document = r#"{"__attain_rows__":["a"],"__attain_columns__":["b"],"a":{"0":1e300}}"#;
        let table = codec::read_json(document.as_bytes(), DEFAULT_WEIGHT).unwrap();
        let mut chain = MarkovChain::from_table(table);
        chain.set_options(SamplerOptions {
            sampling: Sampling::Quantized,
            ..SamplerOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(chain.next_state("a", &mut rng).unwrap(), "b");
        assert_eq!(chain.generate(3, Some("a"), &mut rng).unwrap().len(), 3);
    }

    #[test]
    fn generate_exact_length() {
        let mut chain = MarkovChain::new();
        chain
            .train(&["the", "cat", "sat", "on", "the", "mat", "and", "the", "dog"])
            .unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        for length in 1..20 {
            let states = chain.generate(length, None, &mut rng).unwrap();
            assert_eq!(states.len(), length);
            assert!(states.iter().all(|s| chain.contains(s)));
        }
        assert!(chain.generate(0, None, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn generate_from_start_state() {
        let chain = abab_chain();
        let mut rng = StdRng::seed_from_u64(5);
        let states = chain.generate(5, Some("b"), &mut rng).unwrap();
        assert_eq!(states, ["b", "a", "b", "a", "b"].map(String::from));

        assert!(matches!(
            chain.generate(3, Some("zebra"), &mut rng),
            Err(MarkovError::UnknownState(ref s)) if s == "zebra"
        ));
    }

    #[test]
    fn quantized_sampling_generates() {
        let mut chain = MarkovChain::with_options(SamplerOptions {
            sampling: Sampling::Quantized,
            ..SamplerOptions::default()
        });
        chain.train(&["a", "b", "a", "b"]).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let states = chain.generate(4, Some("a"), &mut rng).unwrap();
        assert_eq!(states, ["a", "b", "a", "b"].map(String::from));
    }

    #[test]
    fn sentence_shape() {
        let chain = abab_chain();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..30 {
            let sentence = chain.generate_sentence(2, 4, &mut rng).unwrap();
            let last = sentence.chars().last().unwrap();
            assert!(SENTENCE_ENDERS.contains(&last));
            assert!(sentence.chars().next().unwrap().is_uppercase());

            let words = sentence.split(' ').count();
            assert!((2..=4).contains(&words), "bad length: {sentence}");
        }
    }

    #[test]
    fn sentence_range_is_validated() {
        let chain = abab_chain();
        let mut rng = StdRng::seed_from_u64(8);
        assert!(matches!(
            chain.generate_sentence(0, 3, &mut rng),
            Err(MarkovError::InvalidLengthRange { min: 0, max: 3 })
        ));
        assert!(matches!(
            chain.generate_sentence(5, 4, &mut rng),
            Err(MarkovError::InvalidLengthRange { min: 5, max: 4 })
        ));
        let single = chain.generate_sentence(1, 1, &mut rng).unwrap();
        assert_eq!(single.len(), 2);
    }

    #[test]
    fn deterministic_with_seed() {
        let chain = abab_chain();
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        assert_eq!(
            chain.generate_sentence(3, 9, &mut rng1).unwrap(),
            chain.generate_sentence(3, 9, &mut rng2).unwrap()
        );
        assert_eq!(
            chain.random_state(&mut rng1).unwrap(),
            chain.random_state(&mut rng2).unwrap()
        );
    }

    #[test]
    fn capitalize_lowers_the_rest() {
        assert_eq!(capitalize("hello World again!"), "Hello world again!");
        assert_eq!(capitalize(""), "");
    }
}
