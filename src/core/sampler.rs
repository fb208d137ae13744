/// Weighted next-state sampling over one row of a transition table.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::matrix::SparseTransitionTable;

/// Scale factor of the quantized pool (copies per unit weight per state).
pub const DEFAULT_POOL_SCALE: u32 = 100;
/// Restart attempts allowed per generated token before giving up.
pub const DEFAULT_MAX_RESTARTS: u32 = 10_000;

/// How a column is drawn from a row of weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sampling {
    /// Exact draw, probability proportional to weight.
    #[default]
    Exact,
    /// Expand-and-shuffle pool; resolution bounded by the pool scale.
    Quantized,
}

/// Sampling knobs carried by a `MarkovChain`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerOptions {
    pub sampling: Sampling,
    pub pool_scale: u32,
    pub max_restarts: u32,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            sampling: Sampling::Exact,
            pool_scale: DEFAULT_POOL_SCALE,
            max_restarts: DEFAULT_MAX_RESTARTS,
        }
    }
}

/// Largest pool `weighted_choice_set` will build.
pub const MAX_POOL_LEN: usize = 1 << 20;

/// Build a shuffled pool of column offsets where each offset appears
/// `floor(weight * vocabulary_len * scale)` times.
///
/// Rows whose weights are all too small (or non-positive) give an empty pool.
/// A pool that would exceed [`MAX_POOL_LEN`] is rescaled to fit, keeping the
/// relative copy counts.
pub fn weighted_choice_set<R: Rng + ?Sized>(
    weights: &[f64],
    vocabulary_len: usize,
    scale: u32,
    rng: &mut R,
) -> Vec<usize> {
    let magnitude = vocabulary_len as f64 * f64::from(scale);
    let mut counts: Vec<f64> = weights
        .iter()
        .map(|&weight| {
            let copies = (weight * magnitude).floor();
            if weight.is_finite() && copies >= 1.0 {
                copies.min(f64::MAX)
            } else {
                0.0
            }
        })
        .collect();

    let total: f64 = counts.iter().sum();
    if total > MAX_POOL_LEN as f64 {
        let largest = counts.iter().copied().fold(0.0, f64::max);
        let relative: f64 = counts.iter().map(|count| count / largest).sum();
        let factor = MAX_POOL_LEN as f64 / relative;
        debug!(total, cap = MAX_POOL_LEN, "rescaling oversized sampling pool");
        for count in &mut counts {
            *count = (*count / largest * factor).floor();
        }
    }

    let mut pool = Vec::new();
    for (offset, &copies) in counts.iter().enumerate() {
        if copies >= 1.0 {
            pool.extend(std::iter::repeat(offset).take(copies as usize));
        }
    }

    pool.shuffle(rng);
    pool
}

/// Draw a column offset from the outgoing row of `row`.
///
/// Returns `None` when the row has nothing to draw from: unknown row,
/// no positive weights, or (quantized) an empty pool.
pub fn sample_row<R: Rng + ?Sized>(
    table: &SparseTransitionTable,
    row: &str,
    options: &SamplerOptions,
    vocabulary_len: usize,
    rng: &mut R,
) -> Option<usize> {
    match options.sampling {
        Sampling::Exact => sample_exact(table, row, rng),
        Sampling::Quantized => {
            let pool =
                weighted_choice_set(&table.dense_row(row), vocabulary_len, options.pool_scale, rng);
            pool.choose(rng).copied()
        }
    }
}

fn sample_exact<R: Rng + ?Sized>(
    table: &SparseTransitionTable,
    row: &str,
    rng: &mut R,
) -> Option<usize> {
    // A non-zero default gives every column weight, so the dense row is needed.
    let entries: Vec<(usize, f64)> = if table.default_value() == 0.0 {
        table.sparse_row_offsets(table.row_offset(row)?)
    } else {
        table.dense_row(row).into_iter().enumerate().collect()
    };

    let mut entries: Vec<(usize, f64)> = entries
        .into_iter()
        .filter(|&(_, weight)| weight.is_finite() && weight > 0.0)
        .collect();
    if entries.is_empty() {
        return None;
    }

    // The weight sum must stay finite for the index to be built.
    if !entries.iter().map(|&(_, weight)| weight).sum::<f64>().is_finite() {
        let largest = entries.iter().map(|&(_, weight)| weight).fold(0.0, f64::max);
        debug!(row, largest, "rescaling row weights whose sum overflows");
        for (_, weight) in &mut entries {
            *weight /= largest;
        }
    }

    match WeightedIndex::<f64>::new(entries.iter().map(|&(_, weight)| weight)) {
        Ok(dist) => Some(entries[dist.sample(rng)].0),
        Err(e) => {
            debug!(row, error = %e, "row weights unusable, treating as dead end");
            None
        }
    }
}
