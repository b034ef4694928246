use serde::{Deserialize, Serialize};

/// GNSS fix captured during a measurement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub lat: f64,
    pub lon: f64,
    /// Meters above sea level
    #[serde(default)]
    pub altitude: Option<f64>,
    /// m/s. Some devices report negative values.
    pub speed: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
    /// Recomputed by a cleaning strategy, never persisted
    #[serde(skip, default = "default_valid")]
    pub is_valid: bool,
}

fn default_valid() -> bool {
    true
}

impl GeoLocation {
    pub fn new(timestamp: i64, lat: f64, lon: f64, speed: f64, accuracy: f64) -> Self {
        Self {
            timestamp,
            lat,
            lon,
            altitude: None,
            speed,
            accuracy,
            vertical_accuracy: None,
            is_valid: true,
        }
    }

    pub fn with_altitude(mut self, altitude: f64, vertical_accuracy: Option<f64>) -> Self {
        self.altitude = Some(altitude);
        self.vertical_accuracy = vertical_accuracy;
        self
    }

    /// Coordinates inside the WGS84 value range
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Barometer reading
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    pub timestamp: i64,
    /// hPa
    pub pressure: f64,
}

impl Pressure {
    pub fn new(timestamp: i64, pressure: f64) -> Self {
        Self {
            timestamp,
            pressure,
        }
    }
}

/// Inertial sensor sample (accelerometer, gyroscope or magnetometer)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64, timestamp: i64) -> Self {
        Self { x, y, z, timestamp }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::Magnetometer,
    ];

    pub fn file_extension(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "cyfa",
            SensorKind::Gyroscope => "cyfr",
            SensorKind::Magnetometer => "cyfd",
        }
    }
}

/// One contiguous capture segment between start/resume and pause/stop
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub locations: Vec<GeoLocation>,
    pub pressures: Vec<Pressure>,
}

impl Track {
    pub fn new(locations: Vec<GeoLocation>, pressures: Vec<Pressure>) -> Self {
        Self {
            locations,
            pressures,
        }
    }

    /// Time span covered by the locations, in milliseconds
    pub fn duration_millis(&self) -> i64 {
        match (self.locations.first(), self.locations.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0,
        }
    }
}
