//! Conversion from upstream DTOs to domain journeys.
//!
//! Invalid journeys are dropped one at a time; a bad candidate never fails
//! the whole response.

use tracing::warn;

use crate::domain::{AirlineCode, DomainError, FlightSegment, IataCode, Journey, SegmentId};

use super::types::{RawJourney, RawSegment, RouteResponse};

/// Error converting one raw journey.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Failed to parse an airport code
    #[error("invalid airport code: {0}")]
    InvalidAirport(String),

    /// Failed to parse an airline code
    #[error("invalid airline code: {0}")]
    InvalidAirline(String),

    /// Domain invariant violated
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Journey doesn't start and end where the query asked
    #[error("journey runs {origin}-{destination}, expected {from}-{to}")]
    WrongEndpoints {
        origin: IataCode,
        destination: IataCode,
        from: IataCode,
        to: IataCode,
    },
}

/// Journeys that survived conversion, in upstream order.
#[derive(Debug, Clone, Default)]
pub struct Converted {
    pub journeys: Vec<Journey>,
    pub dropped: usize,
}

/// Convert a route response, dropping journeys that fail validation.
pub fn convert_route_response(response: &RouteResponse, from: IataCode, to: IataCode) -> Converted {
    let mut converted = Converted::default();
    for (index, raw) in response.journeys.iter().enumerate() {
        match convert_journey(raw, from, to) {
            Ok(journey) => converted.journeys.push(journey),
            Err(e) => {
                warn!(%from, %to, index, error = %e, "dropping invalid journey");
                converted.dropped += 1;
            }
        }
    }
    converted
}

/// Convert one raw journey.
pub fn convert_journey(
    raw: &RawJourney,
    from: IataCode,
    to: IataCode,
) -> Result<Journey, ConversionError> {
    let segments = raw
        .segments
        .iter()
        .map(convert_segment)
        .collect::<Result<Vec<_>, _>>()?;
    let journey = Journey::new(segments)?;

    if journey.origin() != from || journey.destination() != to {
        return Err(ConversionError::WrongEndpoints {
            origin: journey.origin(),
            destination: journey.destination(),
            from,
            to,
        });
    }
    Ok(journey)
}

fn convert_segment(raw: &RawSegment) -> Result<FlightSegment, ConversionError> {
    let departure = IataCode::parse_normalized(&raw.from)
        .map_err(|_| ConversionError::InvalidAirport(raw.from.clone()))?;
    let arrival = IataCode::parse_normalized(&raw.to)
        .map_err(|_| ConversionError::InvalidAirport(raw.to.clone()))?;
    let airline = AirlineCode::parse_normalized(&raw.airline)
        .map_err(|_| ConversionError::InvalidAirline(raw.airline.clone()))?;

    Ok(FlightSegment::new(
        SegmentId::new(raw.id.as_str())?,
        airline,
        departure,
        arrival,
        raw.price,
    )?)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn seg(id: &str, from: &str, to: &str, price: &str) -> RawSegment {
        RawSegment {
            id: id.into(),
            airline: "AA".into(),
            from: from.into(),
            to: to.into(),
            price: price.parse().unwrap(),
        }
    }

    fn code(s: &str) -> IataCode {
        IataCode::parse(s).unwrap()
    }

    #[test]
    fn keeps_connected_journeys_and_drops_broken_ones() {
        let response = RouteResponse {
            journeys: vec![
                RawJourney {
                    segments: vec![seg("AA1", "JFK", "LAX", "299.50")],
                    total_price: None,
                },
                RawJourney {
                    segments: vec![seg("AA2", "JFK", "ORD", "100"), seg("AA3", "DEN", "LAX", "100")],
                    total_price: None,
                },
                RawJourney {
                    segments: vec![seg("AA4", "JFK", "ORD", "150"), seg("AA5", "ORD", "LAX", "175")],
                    total_price: Some(Decimal::new(325, 0)),
                },
            ],
        };

        let converted = convert_route_response(&response, code("JFK"), code("LAX"));
        assert_eq!(converted.journeys.len(), 2);
        assert_eq!(converted.dropped, 1);
        assert_eq!(converted.journeys[1].stops(), 1);
    }

    #[test]
    fn lowercase_codes_are_normalized() {
        let raw = RawJourney {
            segments: vec![RawSegment {
                airline: "dl".into(),
                ..seg("DL1", "jfk", "lax", "10")
            }],
            total_price: None,
        };
        let journey = convert_journey(&raw, code("JFK"), code("LAX")).unwrap();
        assert_eq!(journey.origin(), code("JFK"));
    }

    #[test]
    fn rejects_negative_price() {
        let raw = RawJourney {
            segments: vec![seg("AA1", "JFK", "LAX", "-1")],
            total_price: None,
        };
        assert!(matches!(
            convert_journey(&raw, code("JFK"), code("LAX")),
            Err(ConversionError::Domain(DomainError::NegativePrice(_)))
        ));
    }

    #[test]
    fn overflowing_prices_drop_the_journey() {
        let huge = Decimal::MAX.to_string();
        let response = RouteResponse {
            journeys: vec![
                RawJourney {
                    segments: vec![seg("AA1", "JFK", "ORD", &huge), seg("AA2", "ORD", "LAX", &huge)],
                    total_price: None,
                },
                RawJourney {
                    segments: vec![seg("AA3", "JFK", "LAX", "299.50")],
                    total_price: None,
                },
            ],
        };

        let converted = convert_route_response(&response, code("JFK"), code("LAX"));
        assert_eq!(converted.dropped, 1);
        assert_eq!(converted.journeys.len(), 1);
        assert!(matches!(
            convert_journey(&response.journeys[0], code("JFK"), code("LAX")),
            Err(ConversionError::Domain(DomainError::PriceOverflow))
        ));
    }

    #[test]
    fn rejects_wrong_endpoints() {
        let raw = RawJourney {
            segments: vec![seg("AA1", "JFK", "SFO", "10")],
            total_price: None,
        };
        assert!(matches!(
            convert_journey(&raw, code("JFK"), code("LAX")),
            Err(ConversionError::WrongEndpoints { .. })
        ));
    }

    #[test]
    fn rejects_bad_codes() {
        let raw = RawJourney {
            segments: vec![seg("AA1", "J1K", "LAX", "10")],
            total_price: None,
        };
        assert_eq!(
            convert_journey(&raw, code("JFK"), code("LAX")).unwrap_err(),
            ConversionError::InvalidAirport("J1K".into())
        );
    }

    #[test]
    fn decimal_accepts_numbers_and_strings() {
        let json = r#"{"journeys":[{"segments":[
            {"id":"a","airline":"AA","from":"JFK","to":"LAX","price":"299.50"},
            {"id":"b","airline":"AA","from":"LAX","to":"SFO","price":12.5}
        ]}]}"#;
        let response: RouteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.journeys[0].segments[0].price, Decimal::new(29950, 2));
        assert_eq!(response.journeys[0].segments[1].price, Decimal::new(125, 1));
    }
}
