//! Derived motion metrics computed from reconstructed tracks.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::cleaning::LocationCleaningStrategy;
use crate::types::Track;

/// Reference pressure of the standard atmosphere at sea level, hPa
pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;

/// Parameters of the ascend calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AscendParameters {
    /// Samples averaged per output value when filtering pressure
    pub window_size: usize,
    /// GNSS altitudes with a worse vertical accuracy (meters) are ignored
    pub vertical_accuracy_threshold_m: f64,
    /// Altitude changes up to this magnitude (meters) are treated as noise
    pub noise_threshold_m: f64,
    /// Ignore barometer data even when present
    pub force_gnss: bool,
}

impl Default for AscendParameters {
    fn default() -> Self {
        Self {
            window_size: 20,
            vertical_accuracy_threshold_m: 12.0,
            noise_threshold_m: 2.0,
            force_gnss: false,
        }
    }
}

/// Summary of a measurement's motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionStatistics {
    pub track_count: usize,
    pub average_speed: f64,
    pub max_speed: f64,
    pub distance: f64,
    pub ascend: Option<f64>,
}

impl MotionStatistics {
    pub fn compute(
        tracks: &[Track],
        strategy: &dyn LocationCleaningStrategy,
        params: &AscendParameters,
    ) -> Self {
        Self {
            track_count: tracks.len(),
            average_speed: average_speed(tracks, strategy),
            max_speed: max_speed(tracks, strategy),
            distance: measurement_distance(tracks, strategy),
            ascend: total_ascend(tracks, params),
        }
    }
}

/// Mean speed (m/s) over all clean locations, 0.0 without any
pub fn average_speed(tracks: &[Track], strategy: &dyn LocationCleaningStrategy) -> f64 {
    let (sum, count) = tracks
        .iter()
        .flat_map(|t| t.locations.iter())
        .filter(|l| strategy.is_clean(l))
        .fold((0.0, 0usize), |(sum, count), l| (sum + l.speed, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Highest speed (m/s) of any clean location, 0.0 without any
pub fn max_speed(tracks: &[Track], strategy: &dyn LocationCleaningStrategy) -> f64 {
    tracks
        .iter()
        .flat_map(|t| t.locations.iter())
        .filter(|l| strategy.is_clean(l))
        .map(|l| l.speed)
        .fold(0.0, f64::max)
}

/// Haversine length in meters of the clean points of one track
pub fn track_distance(track: &Track, strategy: &dyn LocationCleaningStrategy) -> f64 {
    let mut distance = 0.0;
    let mut previous: Option<Point<f64>> = None;
    for location in track.locations.iter().filter(|l| strategy.is_clean(l)) {
        let point = Point::new(location.lon, location.lat);
        if let Some(prev) = previous {
            distance += prev.haversine_distance(&point);
        }
        previous = Some(point);
    }
    distance
}

/// Sum of all track lengths; gaps between tracks are not counted
pub fn measurement_distance(tracks: &[Track], strategy: &dyn LocationCleaningStrategy) -> f64 {
    tracks.iter().map(|t| track_distance(t, strategy)).sum()
}

/// Moving average producing `n - w + 1` values.
///
/// Returns `None` unless the series is longer than the window.
pub fn sliding_window_average(values: &[f64], window_size: usize) -> Option<Vec<f64>> {
    if window_size == 0 || values.len() <= window_size {
        return None;
    }
    let averages = values
        .windows(window_size)
        .map(|w| w.iter().sum::<f64>() / window_size as f64)
        .collect();
    Some(averages)
}

/// Barometric formula against the standard atmosphere, meters
pub fn altitude_from_pressure(pressure_hpa: f64) -> f64 {
    44_330.0 * (1.0 - (pressure_hpa / STANDARD_PRESSURE_HPA).powf(1.0 / 5.255))
}

/// Sum of the climbs in an altitude series.
///
/// A reading only becomes the new reference once it differs from the
/// current reference by more than `noise_threshold_m`, so slow drifts below
/// the threshold never accumulate. `None` for an empty series.
pub fn ascend_from_altitudes(altitudes: &[f64], noise_threshold_m: f64) -> Option<f64> {
    let (&first, rest) = altitudes.split_first()?;
    let mut reference = first;
    let mut ascend = 0.0;
    for &altitude in rest {
        let delta = altitude - reference;
        if delta.abs() > noise_threshold_m {
            if delta > 0.0 {
                ascend += delta;
            }
            reference = altitude;
        }
    }
    Some(ascend)
}

/// Ascend of one track from its barometer samples
pub fn barometric_ascend(track: &Track, params: &AscendParameters) -> Option<f64> {
    let pressures: Vec<f64> = track.pressures.iter().map(|p| p.pressure).collect();
    let averaged = sliding_window_average(&pressures, params.window_size)?;
    let altitudes: Vec<f64> = averaged.into_iter().map(altitude_from_pressure).collect();
    ascend_from_altitudes(&altitudes, params.noise_threshold_m)
}

/// Ascend of one track from its GNSS altitudes
pub fn gnss_ascend(track: &Track, params: &AscendParameters) -> Option<f64> {
    let altitudes: Vec<f64> = track
        .locations
        .iter()
        .filter(|l| {
            l.vertical_accuracy
                .map_or(true, |acc| acc <= params.vertical_accuracy_threshold_m)
        })
        .filter_map(|l| l.altitude)
        .collect();
    ascend_from_altitudes(&altitudes, params.noise_threshold_m)
}

/// Total ascend over all tracks.
///
/// Barometer data is preferred whenever any track carries pressure samples.
/// `None` when no track yields altitude data at all.
pub fn total_ascend(tracks: &[Track], params: &AscendParameters) -> Option<f64> {
    let use_barometer = !params.force_gnss && tracks.iter().any(|t| !t.pressures.is_empty());
    tracks
        .iter()
        .filter_map(|t| {
            if use_barometer {
                barometric_ascend(t, params)
            } else {
                gnss_ascend(t, params)
            }
        })
        .fold(None, |total, ascend| Some(total.unwrap_or(0.0) + ascend))
}
