//! Schema of the transfer message.
//!
//! Every sample list is stored as parallel fixed point columns, each column
//! delta encoded. postcard turns the `i64` columns into zig-zag varints and
//! prefixes every sequence with its length.

use serde::{Deserialize, Serialize};

use super::delta::{delta_decode, delta_decode_optional, delta_encode, delta_encode_optional};
use crate::error::{CResult, CaptureError};
use crate::types::{Event, EventType, GeoLocation, Point3D};

const COORDINATE_SCALE: f64 = 1e6;
const CENTI: f64 = 100.0;
const MILLI: f64 = 1000.0;

fn fixed(value: f64, scale: f64) -> i64 {
    (value * scale).round() as i64
}

fn check_len(column: &str, len: usize, expected: usize) -> CResult<()> {
    if len != expected {
        return Err(CaptureError::MalformedMessage(format!(
            "column {} holds {} values, expected {}",
            column, len, expected
        )));
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferMessage {
    pub location_count: u64,
    pub acceleration_count: u64,
    pub rotation_count: u64,
    pub direction_count: u64,
    pub event_count: u64,
    pub locations: LocationColumns,
    /// One batch per sample file
    pub accelerations: Vec<PointColumns>,
    pub rotations: Vec<PointColumns>,
    pub directions: Vec<PointColumns>,
    pub events: EventColumns,
}

impl TransferMessage {
    pub fn encode(&self) -> CResult<Vec<u8>> {
        postcard::to_allocvec(self)
            .map_err(|e| CaptureError::MalformedMessage(format!("encoding failed: {}", e)))
    }

    /// Decodes one message, returning the bytes that follow it
    pub fn decode(bytes: &[u8]) -> CResult<(Self, &[u8])> {
        postcard::take_from_bytes(bytes).map_err(|e| match e {
            postcard::Error::DeserializeUnexpectedEnd => {
                CaptureError::Truncated("message ends early".to_string())
            }
            other => CaptureError::MalformedMessage(other.to_string()),
        })
    }
}

/// Location columns. Altitude, speed and accuracies in cm (per second),
/// coordinates in 1e-6 degrees.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationColumns {
    pub timestamps: Vec<i64>,
    pub latitudes: Vec<i64>,
    pub longitudes: Vec<i64>,
    pub speeds: Vec<i64>,
    pub accuracies: Vec<i64>,
    pub altitudes: Vec<Option<i64>>,
    pub vertical_accuracies: Vec<Option<i64>>,
}

impl LocationColumns {
    pub fn from_locations(locations: &[GeoLocation]) -> Self {
        let column = |f: fn(&GeoLocation) -> i64| delta_encode(locations.iter().map(f));
        let optional = |f: fn(&GeoLocation) -> Option<f64>| {
            delta_encode_optional(locations.iter().map(|l| f(l).map(|v| fixed(v, CENTI))))
        };
        Self {
            timestamps: column(|l| l.timestamp),
            latitudes: column(|l| fixed(l.lat, COORDINATE_SCALE)),
            longitudes: column(|l| fixed(l.lon, COORDINATE_SCALE)),
            speeds: column(|l| fixed(l.speed, CENTI)),
            accuracies: column(|l| fixed(l.accuracy, CENTI)),
            altitudes: optional(|l| l.altitude),
            vertical_accuracies: optional(|l| l.vertical_accuracy),
        }
    }

    pub fn into_locations(self, count: usize) -> CResult<Vec<GeoLocation>> {
        check_len("timestamps", self.timestamps.len(), count)?;
        check_len("latitudes", self.latitudes.len(), count)?;
        check_len("longitudes", self.longitudes.len(), count)?;
        check_len("speeds", self.speeds.len(), count)?;
        check_len("accuracies", self.accuracies.len(), count)?;
        check_len("altitudes", self.altitudes.len(), count)?;
        check_len("vertical_accuracies", self.vertical_accuracies.len(), count)?;

        let timestamps = delta_decode(&self.timestamps);
        let latitudes = delta_decode(&self.latitudes);
        let longitudes = delta_decode(&self.longitudes);
        let speeds = delta_decode(&self.speeds);
        let accuracies = delta_decode(&self.accuracies);
        let altitudes = delta_decode_optional(&self.altitudes);
        let vertical_accuracies = delta_decode_optional(&self.vertical_accuracies);

        Ok((0..count)
            .map(|i| GeoLocation {
                timestamp: timestamps[i],
                lat: latitudes[i] as f64 / COORDINATE_SCALE,
                lon: longitudes[i] as f64 / COORDINATE_SCALE,
                altitude: altitudes[i].map(|v| v as f64 / CENTI),
                speed: speeds[i] as f64 / CENTI,
                accuracy: accuracies[i] as f64 / CENTI,
                vertical_accuracy: vertical_accuracies[i].map(|v| v as f64 / CENTI),
                is_valid: true,
            })
            .collect())
    }
}

/// Inertial columns of one sample file, axes in 1e-3 units
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointColumns {
    pub timestamps: Vec<i64>,
    pub xs: Vec<i64>,
    pub ys: Vec<i64>,
    pub zs: Vec<i64>,
}

impl PointColumns {
    pub fn from_points(points: &[Point3D]) -> Self {
        let column = |f: fn(&Point3D) -> i64| delta_encode(points.iter().map(f));
        Self {
            timestamps: column(|p| p.timestamp),
            xs: column(|p| fixed(p.x, MILLI)),
            ys: column(|p| fixed(p.y, MILLI)),
            zs: column(|p| fixed(p.z, MILLI)),
        }
    }

    pub fn into_points(self) -> CResult<Vec<Point3D>> {
        let count = self.timestamps.len();
        check_len("xs", self.xs.len(), count)?;
        check_len("ys", self.ys.len(), count)?;
        check_len("zs", self.zs.len(), count)?;

        let timestamps = delta_decode(&self.timestamps);
        let xs = delta_decode(&self.xs);
        let ys = delta_decode(&self.ys);
        let zs = delta_decode(&self.zs);
        Ok((0..count)
            .map(|i| {
                Point3D::new(
                    xs[i] as f64 / MILLI,
                    ys[i] as f64 / MILLI,
                    zs[i] as f64 / MILLI,
                    timestamps[i],
                )
            })
            .collect())
    }
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventColumns {
    pub timestamps: Vec<i64>,
    /// [`EventType::code`] values
    pub types: Vec<u8>,
    pub values: Vec<Option<String>>,
}

impl EventColumns {
    pub fn from_events(events: &[Event]) -> Self {
        Self {
            timestamps: delta_encode(events.iter().map(|e| e.timestamp)),
            types: events.iter().map(|e| e.event_type.code()).collect(),
            values: events.iter().map(|e| e.value.clone()).collect(),
        }
    }

    pub fn into_events(self, count: usize) -> CResult<Vec<Event>> {
        check_len("event timestamps", self.timestamps.len(), count)?;
        check_len("event types", self.types.len(), count)?;
        check_len("event values", self.values.len(), count)?;

        delta_decode(&self.timestamps)
            .into_iter()
            .zip(self.types)
            .zip(self.values)
            .map(|((timestamp, code), value)| {
                let event_type = EventType::from_code(code).ok_or_else(|| {
                    CaptureError::MalformedMessage(format!("unknown event type code {}", code))
                })?;
                Ok(Event {
                    timestamp,
                    event_type,
                    value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_columns() {
        // one fix per second, 1e-5 degrees apart
        let locations: Vec<GeoLocation> = (0..10)
            .map(|i| GeoLocation::new(1_000 + i * 1_000, 51.0 + i as f64 * 1e-5, 13.0, 5.0, 4.0))
            .collect();
        let columns = LocationColumns::from_locations(&locations);
        assert_eq!(columns.latitudes[0], 51_000_000);
        assert!(columns.latitudes[1..].iter().all(|d| *d == 10));
        assert!(columns.altitudes.iter().all(Option::is_none));

        let message = TransferMessage {
            location_count: 10,
            locations: columns,
            ..Default::default()
        };
        let bytes = message.encode().unwrap();
        let (decoded, rest) = TransferMessage::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_zigzag_layout() {
        let columns = PointColumns {
            timestamps: vec![1, -1, 300],
            ..Default::default()
        };
        let bytes = postcard::to_allocvec(&columns).unwrap();
        // length, zigzag(1), zigzag(-1), zigzag(300) as LEB128, then three empty columns
        assert_eq!(bytes, vec![0x03, 0x02, 0x01, 0xd8, 0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_column_length_mismatch() {
        let mut columns = LocationColumns::from_locations(&[GeoLocation::new(0, 51.0, 13.0, 1.0, 1.0)]);
        columns.speeds.clear();
        assert!(matches!(
            columns.into_locations(1),
            Err(CaptureError::MalformedMessage(_))
        ));

        let events = EventColumns {
            timestamps: vec![0],
            types: vec![42],
            values: vec![None],
        };
        assert!(matches!(
            events.into_events(1),
            Err(CaptureError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_truncated_message() {
        let message = TransferMessage {
            event_count: 1,
            events: EventColumns::from_events(&[Event::new(EventType::LifecycleStart, 5)]),
            ..Default::default()
        };
        let bytes = message.encode().unwrap();
        assert!(matches!(
            TransferMessage::decode(&bytes[..bytes.len() - 1]),
            Err(CaptureError::Truncated(_))
        ));
    }
}
