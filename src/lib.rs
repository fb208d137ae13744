//! Attain — a first-order Markov chain text generator.
//!
//! Learns word-to-word transition weights from a token sequence into a
//! sparse, label-indexed table, then walks that table to produce new token
//! sequences and punctuated pseudo-sentences. Tables persist as CSV, JSON,
//! or RON.

pub mod core;
