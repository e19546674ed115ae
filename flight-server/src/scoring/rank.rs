//! Candidate scoring and ranking.
//!
//! Ranks journeys under a mode and filter set. Pure: the same candidates,
//! mode, filters and normalization context always produce the same ordered
//! output, including tie-break order.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{FilterCriteria, FlightSegment, Journey, JourneyId, Mode};

use super::normalize::{NormalizationContext, Normalizer, price_value};

/// Relative importance of each normalized cost dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub price: f64,
    pub stops: f64,
}

impl Weights {
    /// Weight vector for a ranking mode.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Cheapest => Weights {
                price: 1.0,
                stops: 0.0,
            },
            Mode::FewestStops => Weights {
                price: 0.0,
                stops: 1.0,
            },
        }
    }

    fn total(&self) -> f64 {
        self.price + self.stops
    }

    /// Weighted mean of the normalized costs.
    fn cost(&self, price: f64, stops: f64) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (self.price * price + self.stops * stops) / total
    }
}

/// A ranked journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSolution {
    pub journey_id: JourneyId,
    /// In `[0, 1]`, higher is better.
    pub score: f64,
    pub total_price: Decimal,
    pub stops: usize,
    pub segments: Vec<FlightSegment>,
    pub explanation: String,
}

/// Score and rank candidates.
///
/// Filtering precedes scoring. Candidates sharing a [`JourneyId`] are
/// collapsed to the cheapest copy. The result is ordered best-first:
/// highest score, then lower total price, then fewer stops, then lower
/// journey id.
pub fn score(
    candidates: &[Journey],
    mode: Mode,
    filters: &FilterCriteria,
    ctx: &NormalizationContext,
) -> Vec<ScoredSolution> {
    let survivors = deduplicate(candidates.iter().filter(|j| filters.admits(j)));
    if survivors.is_empty() {
        return Vec::new();
    }

    let normalizer = Normalizer::for_candidates(&survivors, ctx);
    let weights = Weights::for_mode(mode);

    let mut scored: Vec<ScoredSolution> = survivors
        .into_iter()
        .map(|journey| {
            let total_price = journey.total_price();
            let stops = journey.stops();
            let cost = weights.cost(
                normalizer.price(price_value(total_price)),
                normalizer.stops(stops as f64),
            );
            ScoredSolution {
                journey_id: journey.id().clone(),
                score: (1.0 - cost).clamp(0.0, 1.0),
                total_price,
                stops,
                segments: journey.segments().to_vec(),
                explanation: explain(mode, total_price, stops),
            }
        })
        .collect();

    scored.sort_by(compare);
    scored
}

/// Best-first ordering with the deterministic tie-break chain.
fn compare(a: &ScoredSolution, b: &ScoredSolution) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.total_price.cmp(&b.total_price))
        .then_with(|| a.stops.cmp(&b.stops))
        .then_with(|| a.journey_id.cmp(&b.journey_id))
}

/// Collapse journeys with the same id, keeping the cheapest copy.
///
/// Output order is by journey id so that input order never leaks into the
/// result.
fn deduplicate<'a>(journeys: impl Iterator<Item = &'a Journey>) -> Vec<&'a Journey> {
    let mut by_id: HashMap<&JourneyId, &Journey> = HashMap::new();
    for journey in journeys {
        by_id
            .entry(journey.id())
            .and_modify(|existing| {
                if journey.total_price() < existing.total_price() {
                    *existing = journey;
                }
            })
            .or_insert(journey);
    }
    let mut unique: Vec<&Journey> = by_id.into_values().collect();
    unique.sort_by(|a, b| a.id().cmp(b.id()));
    unique
}

fn explain(mode: Mode, total_price: Decimal, stops: usize) -> String {
    let stops_text = match stops {
        0 => "direct".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{n} stops"),
    };
    match mode {
        Mode::Cheapest => format!("cheapest: {total_price} total, {stops_text}"),
        Mode::FewestStops => format!("fewest-stops: {stops_text}, {total_price} total"),
    }
}

/// Split a ranked list into the best solution and the alternatives.
pub fn split_best(
    mut ranked: Vec<ScoredSolution>,
) -> Option<(ScoredSolution, Vec<ScoredSolution>)> {
    if ranked.is_empty() {
        return None;
    }
    let best = ranked.remove(0);
    Some((best, ranked))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::{AirlineCode, IataCode, SegmentId};
    use crate::scoring::ReferencePercentiles;
    use proptest::prelude::*;

    const VIA: &[&str] = &["ORD", "DEN", "ATL"];

    fn candidate(idx: usize, stops: usize, cents: i64) -> Journey {
        let mut points = vec!["JFK"];
        points.extend(VIA.iter().take(stops));
        points.push("LAX");
        let segments = points
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                FlightSegment::new(
                    SegmentId::new(format!("J{idx}S{i}")).unwrap(),
                    AirlineCode::parse("DL").unwrap(),
                    IataCode::parse(w[0]).unwrap(),
                    IataCode::parse(w[1]).unwrap(),
                    Decimal::new(cents, 2),
                )
                .unwrap()
            })
            .collect();
        Journey::new(segments).unwrap()
    }

    fn candidates() -> impl Strategy<Value = Vec<Journey>> {
        prop::collection::vec((0usize..4, 0i64..100_000), 0..12).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (stops, cents))| candidate(i, stops, cents))
                .collect()
        })
    }

    fn any_mode() -> impl Strategy<Value = Mode> {
        prop_oneof![Just(Mode::Cheapest), Just(Mode::FewestStops)]
    }

    fn any_ctx() -> impl Strategy<Value = NormalizationContext> {
        prop_oneof![
            Just(NormalizationContext::calibrated()),
            Just(NormalizationContext::cold(ReferencePercentiles::default())),
        ]
    }

    proptest! {
        /// Repeated scoring gives byte-identical output, whatever the input order.
        #[test]
        fn deterministic(mut js in candidates(), mode in any_mode(), ctx in any_ctx()) {
            let filters = FilterCriteria::default();
            let first = serde_json::to_vec(&score(&js, mode, &filters, &ctx)).unwrap();
            let second = serde_json::to_vec(&score(&js, mode, &filters, &ctx)).unwrap();
            prop_assert_eq!(&first, &second);

            js.reverse();
            let reversed = serde_json::to_vec(&score(&js, mode, &filters, &ctx)).unwrap();
            prop_assert_eq!(&first, &reversed);
        }

        /// Output is sorted by score and every score is in [0, 1].
        #[test]
        fn ordered_and_bounded(js in candidates(), mode in any_mode(), ctx in any_ctx()) {
            let ranked = score(&js, mode, &FilterCriteria::default(), &ctx);
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for s in &ranked {
                prop_assert!((0.0..=1.0).contains(&s.score));
            }
        }

        /// Nothing that violates the filters is ever returned.
        #[test]
        fn filters_hold(js in candidates(), max_stops in 0u8..4) {
            let filters = FilterCriteria::default().with_max_stops(max_stops);
            let ranked = score(&js, Mode::Cheapest, &filters, &NormalizationContext::calibrated());
            prop_assert!(ranked.iter().all(|s| s.stops <= usize::from(max_stops)));
        }
    }
}
