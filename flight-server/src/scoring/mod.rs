//! Scoring engine.
//!
//! Ranks a candidate set of journeys under a mode and filter set. The
//! engine is a pure function: it holds no state, and its only input besides
//! the candidates is a [`NormalizationContext`] describing how far the
//! process has calibrated.

mod normalize;
mod rank;

pub use normalize::{
    Calibration, DEFAULT_WARMUP_THRESHOLD, NormalizationContext, ReferencePercentiles,
};
pub use rank::{ScoredSolution, Weights, score, split_best};
