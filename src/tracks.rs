//! Track reconstruction.
//!
//! Splits the chronologically ordered samples of a measurement into the
//! segments between start/resume and the following pause/stop. Samples
//! captured while paused are dropped.
//!
//! Boundary rule: a sample stamped exactly at a PAUSE belongs to the segment
//! ending there; a sample stamped exactly at a RESUME is dropped together
//! with the samples captured during the pause.

use log::debug;

use crate::cleaning::{clean_locations, LocationCleaningStrategy};
use crate::error::{CResult, CaptureError};
use crate::store::MeasurementStore;
use crate::types::{Event, EventType, GeoLocation, Pressure, Track};

/// Read position in one sorted sample slice
struct Cursor<'a, T> {
    items: &'a [T],
    pos: usize,
}

impl<'a, T> Cursor<'a, T> {
    fn new(items: &'a [T]) -> Self {
        Self { items, pos: 0 }
    }

    /// Takes every remaining item for which `pred` holds, stopping at the first miss
    fn take_while(&mut self, pred: impl Fn(&T) -> bool) -> &'a [T] {
        let items = self.items;
        let start = self.pos;
        self.pos += items[start..].partition_point(|item| pred(item));
        &items[start..self.pos]
    }

    fn skip_while(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        self.take_while(pred).len()
    }

    fn rest(&mut self) -> &'a [T] {
        let items = self.items;
        let rest = &items[self.pos..];
        self.pos = items.len();
        rest
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.items.len()
    }
}

/// Reconstructs the tracks of a measurement.
///
/// `locations`, `pressures` and `events` must each be sorted ascending by
/// timestamp. Fails with `MalformedEventLog` when a RESUME has no preceding
/// unmatched PAUSE.
pub fn reconstruct_tracks(
    locations: &[GeoLocation],
    pressures: &[Pressure],
    events: &[Event],
) -> CResult<Vec<Track>> {
    if locations.is_empty() {
        return Ok(Vec::new());
    }

    let mut location_cursor = Cursor::new(locations);
    let mut pressure_cursor = Cursor::new(pressures);
    let mut pause_at: Option<i64> = None;
    let mut tracks = Vec::new();

    for event in events {
        match event.event_type {
            EventType::LifecyclePause => pause_at = Some(event.timestamp),
            EventType::LifecycleResume => {
                let paused = pause_at.take().ok_or_else(|| {
                    CaptureError::MalformedEventLog(format!(
                        "RESUME at {} without preceding PAUSE",
                        event.timestamp
                    ))
                })?;

                let segment = location_cursor.take_while(|l| l.timestamp <= paused);
                let segment_pressures = pressure_cursor.take_while(|p| p.timestamp <= paused);
                if !segment.is_empty() {
                    tracks.push(Track::new(segment.to_vec(), segment_pressures.to_vec()));
                }

                let resumed = event.timestamp;
                let dropped = location_cursor.skip_while(|l| l.timestamp <= resumed)
                    + pressure_cursor.skip_while(|p| p.timestamp <= resumed);
                if dropped > 0 {
                    debug!(
                        "Dropped {} samples captured between {} and {}",
                        dropped, paused, resumed
                    );
                }
            }
            _ => {}
        }
    }

    if !location_cursor.is_exhausted() {
        tracks.push(Track::new(
            location_cursor.rest().to_vec(),
            pressure_cursor.rest().to_vec(),
        ));
    }

    Ok(tracks)
}

/// Same segmentation as [`reconstruct_tracks`] over the clean locations only
pub fn reconstruct_cleaned_tracks(
    locations: &[GeoLocation],
    pressures: &[Pressure],
    events: &[Event],
    strategy: &dyn LocationCleaningStrategy,
) -> CResult<Vec<Track>> {
    let cleaned = clean_locations(strategy, locations);
    reconstruct_tracks(&cleaned, pressures, events)
}

/// Loads a measurement's samples from `store` and reconstructs its tracks
pub fn load_tracks<S: MeasurementStore + ?Sized>(
    store: &S,
    measurement_id: u64,
) -> CResult<Vec<Track>> {
    let samples = store.read_samples(measurement_id)?;
    reconstruct_tracks(&samples.locations, &samples.pressures, &samples.events)
}

pub fn load_cleaned_tracks<S: MeasurementStore + ?Sized>(
    store: &S,
    measurement_id: u64,
    strategy: &dyn LocationCleaningStrategy,
) -> CResult<Vec<Track>> {
    let samples = store.read_samples(measurement_id)?;
    reconstruct_cleaned_tracks(
        &samples.locations,
        &samples.pressures,
        &samples.events,
        strategy,
    )
}
