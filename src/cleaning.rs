//! Location cleaning strategies.
//!
//! A strategy decides per point whether a GNSS fix is trustworthy enough to
//! contribute to speeds, distances and cleaned tracks.

use serde::{Deserialize, Serialize};

use crate::types::GeoLocation;

pub trait LocationCleaningStrategy: Send + Sync {
    fn is_clean(&self, location: &GeoLocation) -> bool;
}

/// Accuracy and speed thresholds of [`DefaultLocationCleaning`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningThresholds {
    /// Points with accuracy at or above this value (meters) are dropped
    pub upper_accuracy_m: f64,
    /// km/h, exclusive
    pub lower_speed_kmh: f64,
    /// km/h, exclusive
    pub upper_speed_kmh: f64,
}

impl Default for CleaningThresholds {
    fn default() -> Self {
        Self {
            upper_accuracy_m: 20.0,
            lower_speed_kmh: 1.0,
            upper_speed_kmh: 100.0,
        }
    }
}

/// Keeps points inside the WGS84 range that are accurate and show plausible
/// movement
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocationCleaning {
    thresholds: CleaningThresholds,
}

impl DefaultLocationCleaning {
    pub fn new(thresholds: CleaningThresholds) -> Self {
        Self { thresholds }
    }
}

impl LocationCleaningStrategy for DefaultLocationCleaning {
    fn is_clean(&self, location: &GeoLocation) -> bool {
        let speed_kmh = location.speed * 3.6;
        location.has_valid_coordinates()
            && location.accuracy < self.thresholds.upper_accuracy_m
            && speed_kmh > self.thresholds.lower_speed_kmh
            && speed_kmh < self.thresholds.upper_speed_kmh
    }
}

/// Treats every location as clean
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllLocations;

impl LocationCleaningStrategy for AcceptAllLocations {
    fn is_clean(&self, _location: &GeoLocation) -> bool {
        true
    }
}

/// Recomputes the transient `is_valid` flag of each location
pub fn mark_validity(strategy: &dyn LocationCleaningStrategy, locations: &mut [GeoLocation]) {
    for location in locations.iter_mut() {
        location.is_valid = strategy.is_clean(location);
    }
}

/// Copies of the locations the strategy accepts, order preserved
pub fn clean_locations(
    strategy: &dyn LocationCleaningStrategy,
    locations: &[GeoLocation],
) -> Vec<GeoLocation> {
    locations
        .iter()
        .filter(|l| strategy.is_clean(l))
        .cloned()
        .collect()
}
