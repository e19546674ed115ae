//! Normalization of price and stop counts onto `[0, 1]`.
//!
//! Per-request min-max scaling is degenerate on tiny candidate sets (two
//! journeys always map to exactly 0 and 1), so until enough queries have
//! been scored the engine scales against fixed reference medians instead.

use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::Journey;

/// Number of scored queries before per-request min-max takes over.
pub const DEFAULT_WARMUP_THRESHOLD: u64 = 100;

/// Fixed reference points used during warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePercentiles {
    pub median_price: Decimal,
    pub median_stops: f64,
}

impl Default for ReferencePercentiles {
    fn default() -> Self {
        Self {
            median_price: Decimal::new(30000, 2),
            median_stops: 1.0,
        }
    }
}

/// Inputs the scoring engine needs besides the candidates themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationContext {
    /// Queries scored so far by this process.
    pub sample_count: u64,
    pub warmup_threshold: u64,
    pub reference: ReferencePercentiles,
}

impl NormalizationContext {
    /// Context past warm-up: always min-max.
    pub fn calibrated() -> Self {
        Self {
            sample_count: DEFAULT_WARMUP_THRESHOLD,
            warmup_threshold: DEFAULT_WARMUP_THRESHOLD,
            reference: ReferencePercentiles::default(),
        }
    }

    /// Context during warm-up: always reference medians.
    pub fn cold(reference: ReferencePercentiles) -> Self {
        Self {
            sample_count: 0,
            warmup_threshold: DEFAULT_WARMUP_THRESHOLD,
            reference,
        }
    }

    pub fn is_warming_up(&self) -> bool {
        self.sample_count < self.warmup_threshold
    }
}

/// Counts scored queries to decide when warm-up is over.
#[derive(Debug, Default)]
pub struct Calibration {
    samples: AtomicU64,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) {
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn context(
        &self,
        warmup_threshold: u64,
        reference: ReferencePercentiles,
    ) -> NormalizationContext {
        NormalizationContext {
            sample_count: self.samples(),
            warmup_threshold,
            reference,
        }
    }
}

/// Scaling chosen for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Normalizer {
    MinMax {
        min_price: f64,
        max_price: f64,
        min_stops: f64,
        max_stops: f64,
    },
    Reference {
        median_price: f64,
        median_stops: f64,
    },
}

pub(crate) fn price_value(price: Decimal) -> f64 {
    price.to_f64().unwrap_or(f64::MAX)
}

impl Normalizer {
    pub(crate) fn for_candidates(candidates: &[&Journey], ctx: &NormalizationContext) -> Self {
        if ctx.is_warming_up() {
            return Normalizer::Reference {
                median_price: price_value(ctx.reference.median_price),
                median_stops: ctx.reference.median_stops,
            };
        }

        let mut min_price = f64::INFINITY;
        let mut max_price = f64::NEG_INFINITY;
        let mut min_stops = f64::INFINITY;
        let mut max_stops = f64::NEG_INFINITY;
        for journey in candidates {
            let price = price_value(journey.total_price());
            let stops = journey.stops() as f64;
            min_price = min_price.min(price);
            max_price = max_price.max(price);
            min_stops = min_stops.min(stops);
            max_stops = max_stops.max(stops);
        }

        Normalizer::MinMax {
            min_price,
            max_price,
            min_stops,
            max_stops,
        }
    }

    pub(crate) fn price(&self, value: f64) -> f64 {
        match *self {
            Normalizer::MinMax {
                min_price,
                max_price,
                ..
            } => min_max(value, min_price, max_price),
            Normalizer::Reference { median_price, .. } => against_median(value, median_price),
        }
    }

    pub(crate) fn stops(&self, value: f64) -> f64 {
        match *self {
            Normalizer::MinMax {
                min_stops,
                max_stops,
                ..
            } => min_max(value, min_stops, max_stops),
            Normalizer::Reference { median_stops, .. } => against_median(value, median_stops),
        }
    }
}

/// Degenerate ranges normalize to 0.
fn min_max(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return 0.0;
    }
    ((value - min) / range).clamp(0.0, 1.0)
}

/// The median maps to 0.5; twice the median or more maps to 1.
fn against_median(value: f64, median: f64) -> f64 {
    if median <= 0.0 {
        return if value > 0.0 { 1.0 } else { 0.0 };
    }
    (value / (2.0 * median)).clamp(0.0, 1.0)
}
