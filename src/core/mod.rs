pub mod codec;
pub mod config;
pub mod markov;
pub mod matrix;
pub mod sampler;
pub mod tokenize;
