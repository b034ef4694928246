//! Contract with the on-device sample store.
//!
//! The relational store itself lives outside this crate. Everything here
//! reaches it through [`MeasurementStore`]; [`MemoryStore`] backs the tests
//! and the command line tool.

pub mod memory;

pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CResult;
use crate::types::{
    Attachment, AttachmentStatus, Event, GeoLocation, Measurement, MeasurementStatus, Modality,
    Pressure, SensorKind,
};

/// Raw inertial sample file on disk together with its declared size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InertialFile {
    pub sensor: SensorKind,
    pub path: PathBuf,
    pub point_count: u64,
}

/// Everything captured for one measurement, each list ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSamples {
    pub locations: Vec<GeoLocation>,
    pub pressures: Vec<Pressure>,
    pub events: Vec<Event>,
    #[serde(default)]
    pub inertial_files: Vec<InertialFile>,
}

impl MeasurementSamples {
    pub fn inertial_files_for(&self, sensor: SensorKind) -> impl Iterator<Item = &InertialFile> {
        self.inertial_files.iter().filter(move |f| f.sensor == sensor)
    }

    /// Sum of the declared point counts of all files for `sensor`
    pub fn point_count(&self, sensor: SensorKind) -> u64 {
        self.inertial_files_for(sensor).map(|f| f.point_count).sum()
    }
}

/// Narrow view of the sample store consumed by this crate.
///
/// Write methods return the number of rows touched, mirroring the
/// underlying database; callers treat anything but `1` as not found.
pub trait MeasurementStore: Send + Sync {
    fn create_measurement(
        &self,
        modality: Modality,
        timestamp: i64,
        file_format_version: u16,
    ) -> CResult<Measurement>;

    /// Fails with `NotFound` for unknown ids
    fn measurement(&self, id: u64) -> CResult<Measurement>;

    fn measurements_with_status(&self, status: MeasurementStatus) -> CResult<Vec<Measurement>>;

    fn read_status(&self, id: u64) -> CResult<MeasurementStatus> {
        Ok(self.measurement(id)?.status)
    }

    fn write_status(&self, id: u64, status: MeasurementStatus) -> CResult<usize>;

    fn update_distance(&self, id: u64, distance: f64) -> CResult<usize>;

    fn append_event(&self, id: u64, event: Event) -> CResult<()>;

    fn read_samples(&self, id: u64) -> CResult<MeasurementSamples>;

    fn attachments(&self, measurement_id: u64) -> CResult<Vec<Attachment>>;

    fn write_attachment_status(&self, attachment_id: u64, status: AttachmentStatus)
        -> CResult<usize>;

    /// Removes the measurement row and every sample row it owns
    fn delete_measurement(&self, id: u64) -> CResult<usize>;
}
