//! Journey types.
//!
//! A `Journey` is an ordered, connected sequence of flight segments from an
//! origin airport to a destination airport. Its identity is derived from the
//! ordered segment ids, so two journeys built from the same segments are the
//! same entity no matter which upstream response they came from.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{AirlineCode, DomainError, FlightSegment, IataCode};

/// Deterministic identifier for a journey.
///
/// Hex encoding of the first 16 bytes of SHA-256 over the segment ids joined
/// by `|`. Stable across processes and releases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyId(String);

impl JourneyId {
    /// Compute the id for an ordered segment list.
    pub fn for_segments(segments: &[FlightSegment]) -> Self {
        let mut hasher = Sha256::new();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(segment.id().as_str().as_bytes());
        }
        let digest = hasher.finalize();
        JourneyId(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JourneyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete journey from origin to destination.
///
/// # Invariants
///
/// - At least one segment
/// - Consecutive segments connect (arrival of one = departure of next)
/// - The summed price is representable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "JourneyRecord", into = "JourneyRecord")]
pub struct Journey {
    id: JourneyId,
    segments: Vec<FlightSegment>,
    total_price: Decimal,
}

impl Journey {
    /// Constructs a journey from segments, checking connectivity.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the list is empty, any adjacent pair doesn't share
    /// an airport, or the prices overflow when summed.
    ///
    /// # Examples
    ///
    /// ```
    /// use flight_server::domain::{AirlineCode, FlightSegment, IataCode, Journey, SegmentId};
    /// use rust_decimal::Decimal;
    ///
    /// let leg = |id: &str, from: &str, to: &str| {
    ///     FlightSegment::new(
    ///         SegmentId::new(id).unwrap(),
    ///         AirlineCode::parse("AA").unwrap(),
    ///         IataCode::parse(from).unwrap(),
    ///         IataCode::parse(to).unwrap(),
    ///         Decimal::new(10000, 2),
    ///     )
    ///     .unwrap()
    /// };
    ///
    /// let ok = Journey::new(vec![leg("1", "JFK", "ORD"), leg("2", "ORD", "LAX")]).unwrap();
    /// assert_eq!(ok.stops(), 1);
    ///
    /// assert!(Journey::new(vec![leg("1", "JFK", "ORD"), leg("2", "DEN", "LAX")]).is_err());
    /// ```
    pub fn new(segments: Vec<FlightSegment>) -> Result<Self, DomainError> {
        if segments.is_empty() {
            return Err(DomainError::EmptyJourney);
        }

        for (index, window) in segments.windows(2).enumerate() {
            let arrival = window[0].arrival();
            let departure = window[1].departure();
            if arrival != departure {
                return Err(DomainError::NotConnected {
                    index,
                    arrival,
                    departure,
                });
            }
        }

        let total_price = segments
            .iter()
            .try_fold(Decimal::ZERO, |total, segment| total.checked_add(segment.price()))
            .ok_or(DomainError::PriceOverflow)?;

        Ok(Journey {
            id: JourneyId::for_segments(&segments),
            segments,
            total_price,
        })
    }

    pub fn id(&self) -> &JourneyId {
        &self.id
    }

    pub fn segments(&self) -> &[FlightSegment] {
        &self.segments
    }

    /// Departure airport of the first segment.
    pub fn origin(&self) -> IataCode {
        self.segments[0].departure()
    }

    /// Arrival airport of the last segment.
    pub fn destination(&self) -> IataCode {
        self.segments[self.segments.len() - 1].arrival()
    }

    /// Sum of segment prices.
    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    /// Number of intermediate stops (segment count minus one).
    pub fn stops(&self) -> usize {
        self.segments.len() - 1
    }

    /// Airlines operating any segment, in segment order (may repeat).
    pub fn airlines(&self) -> impl Iterator<Item = AirlineCode> + '_ {
        self.segments.iter().map(FlightSegment::airline)
    }
}

/// Serialized shape of a journey; the id is recomputed on load.
#[derive(Serialize, Deserialize)]
struct JourneyRecord {
    #[serde(default, skip_deserializing)]
    id: Option<JourneyId>,
    segments: Vec<FlightSegment>,
}

impl TryFrom<JourneyRecord> for Journey {
    type Error = DomainError;

    fn try_from(record: JourneyRecord) -> Result<Self, Self::Error> {
        Journey::new(record.segments)
    }
}

impl From<Journey> for JourneyRecord {
    fn from(journey: Journey) -> Self {
        JourneyRecord {
            id: Some(journey.id),
            segments: journey.segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SegmentId;

    fn seg(id: &str, from: &str, to: &str, price: &str) -> FlightSegment {
        FlightSegment::new(
            SegmentId::new(id).unwrap(),
            AirlineCode::parse("AA").unwrap(),
            IataCode::parse(from).unwrap(),
            IataCode::parse(to).unwrap(),
            price.parse().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn empty_journey_rejected() {
        assert_eq!(Journey::new(vec![]), Err(DomainError::EmptyJourney));
    }

    #[test]
    fn direct_journey() {
        let journey = Journey::new(vec![seg("S1", "JFK", "LAX", "299.50")]).unwrap();
        assert_eq!(journey.stops(), 0);
        assert_eq!(journey.total_price(), "299.50".parse::<Decimal>().unwrap());
        assert_eq!(journey.origin().as_str(), "JFK");
        assert_eq!(journey.destination().as_str(), "LAX");
    }

    #[test]
    fn connected_multi_segment_journey() {
        let journey = Journey::new(vec![
            seg("S1", "JFK", "ORD", "120.00"),
            seg("S2", "ORD", "DEN", "80.25"),
            seg("S3", "DEN", "LAX", "99.75"),
        ])
        .unwrap();
        assert_eq!(journey.stops(), 2);
        assert_eq!(journey.total_price(), "300.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn overflowing_total_price_rejected() {
        let err = Journey::new(vec![
            seg("S1", "JFK", "ORD", &Decimal::MAX.to_string()),
            seg("S2", "ORD", "LAX", "1"),
        ])
        .unwrap_err();
        assert_eq!(err, DomainError::PriceOverflow);
    }

    #[test]
    fn disconnected_pair_reports_position() {
        let err = Journey::new(vec![
            seg("S1", "JFK", "ORD", "1"),
            seg("S2", "ORD", "DEN", "1"),
            seg("S3", "SLC", "LAX", "1"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::NotConnected {
                index: 1,
                arrival: IataCode::parse("DEN").unwrap(),
                departure: IataCode::parse("SLC").unwrap(),
            }
        );
    }

    #[test]
    fn id_depends_only_on_segment_ids() {
        let a = Journey::new(vec![seg("S1", "JFK", "LAX", "100")]).unwrap();
        let b = Journey::new(vec![seg("S1", "JFK", "LAX", "250")]).unwrap();
        let c = Journey::new(vec![seg("S2", "JFK", "LAX", "100")]).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().as_str().len(), 32);
    }

    #[test]
    fn id_is_order_sensitive() {
        let forward = JourneyId::for_segments(&[
            seg("A", "JFK", "ORD", "1"),
            seg("B", "ORD", "LAX", "1"),
        ]);
        let reversed = JourneyId::for_segments(&[
            seg("B", "ORD", "LAX", "1"),
            seg("A", "JFK", "ORD", "1"),
        ]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn deserialize_revalidates_connectivity() {
        let good = Journey::new(vec![
            seg("S1", "JFK", "ORD", "1"),
            seg("S2", "ORD", "LAX", "1"),
        ])
        .unwrap();
        let json = serde_json::to_string(&good).unwrap();
        let back: Journey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, good);

        let broken = json.replacen("\"departure\":\"ORD\"", "\"departure\":\"DEN\"", 1);
        assert!(serde_json::from_str::<Journey>(&broken).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::SegmentId;
    use proptest::prelude::*;

    const AIRPORTS: &[&str] = &["JFK", "LAX", "ORD", "DEN", "SFO", "ATL"];

    fn segment(id: usize, from: usize, to: usize) -> Option<FlightSegment> {
        FlightSegment::new(
            SegmentId::new(format!("S{id}")).unwrap(),
            AirlineCode::parse("DL").unwrap(),
            IataCode::parse(AIRPORTS[from]).unwrap(),
            IataCode::parse(AIRPORTS[to]).unwrap(),
            Decimal::ONE,
        )
        .ok()
    }

    proptest! {
        /// A journey is accepted exactly when every adjacent pair connects.
        #[test]
        fn accepted_iff_connected(hops in prop::collection::vec((0usize..6, 0usize..6), 1..5)) {
            let segments: Vec<FlightSegment> = hops
                .iter()
                .enumerate()
                .filter_map(|(i, (from, to))| segment(i, *from, *to))
                .collect();
            prop_assume!(!segments.is_empty());

            let connected = segments
                .windows(2)
                .all(|w| w[0].arrival() == w[1].departure());

            prop_assert_eq!(Journey::new(segments).is_ok(), connected);
        }
    }
}
