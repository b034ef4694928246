use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{InertialFile, MeasurementSamples, MeasurementStore};
use crate::error::{CResult, CaptureError};
use crate::types::{
    Attachment, AttachmentStatus, Event, GeoLocation, Measurement, MeasurementStatus, Modality,
    Pressure,
};

#[derive(Default)]
struct Tables {
    next_measurement_id: u64,
    next_attachment_id: u64,
    measurements: BTreeMap<u64, Measurement>,
    samples: BTreeMap<u64, MeasurementSamples>,
    attachments: BTreeMap<u64, Attachment>,
}

/// In-memory sample store.
///
/// Sample lists are kept sorted by timestamp on insert so `read_samples`
/// honours the ordering contract of [`MeasurementStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CaptureError::Internal("Failed to acquire store read lock".to_string()))
    }

    fn write(&self) -> CResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CaptureError::Internal("Failed to acquire store write lock".to_string()))
    }

    /// Inserts a measurement with a caller chosen id, e.g. when loading a dump
    pub fn insert_measurement(&self, measurement: Measurement) -> CResult<()> {
        let mut tables = self.write()?;
        tables.next_measurement_id = tables.next_measurement_id.max(measurement.id + 1);
        tables.samples.entry(measurement.id).or_default();
        tables.measurements.insert(measurement.id, measurement);
        Ok(())
    }

    pub fn add_location(&self, id: u64, location: GeoLocation) -> CResult<()> {
        let mut tables = self.write()?;
        let samples = samples_mut(&mut tables, id)?;
        let at = samples
            .locations
            .partition_point(|l| l.timestamp <= location.timestamp);
        samples.locations.insert(at, location);
        Ok(())
    }

    pub fn add_pressure(&self, id: u64, pressure: Pressure) -> CResult<()> {
        let mut tables = self.write()?;
        let samples = samples_mut(&mut tables, id)?;
        let at = samples
            .pressures
            .partition_point(|p| p.timestamp <= pressure.timestamp);
        samples.pressures.insert(at, pressure);
        Ok(())
    }

    pub fn add_inertial_file(&self, id: u64, file: InertialFile) -> CResult<()> {
        let mut tables = self.write()?;
        samples_mut(&mut tables, id)?.inertial_files.push(file);
        Ok(())
    }

    pub fn add_attachment(
        &self,
        measurement_id: u64,
        path: std::path::PathBuf,
    ) -> CResult<Attachment> {
        let mut tables = self.write()?;
        if !tables.measurements.contains_key(&measurement_id) {
            return Err(CaptureError::NotFound(measurement_id));
        }
        let attachment = Attachment {
            id: tables.next_attachment_id,
            measurement_id,
            status: AttachmentStatus::Saved,
            path,
        };
        tables.next_attachment_id += 1;
        tables.attachments.insert(attachment.id, attachment.clone());
        Ok(attachment)
    }
}

fn samples_mut(tables: &mut Tables, id: u64) -> CResult<&mut MeasurementSamples> {
    tables.samples.get_mut(&id).ok_or(CaptureError::NotFound(id))
}

impl MeasurementStore for MemoryStore {
    fn create_measurement(
        &self,
        modality: Modality,
        timestamp: i64,
        file_format_version: u16,
    ) -> CResult<Measurement> {
        let mut tables = self.write()?;
        let measurement = Measurement {
            id: tables.next_measurement_id,
            status: MeasurementStatus::Open,
            modality,
            distance: 0.0,
            file_format_version,
            timestamp,
        };
        tables.next_measurement_id += 1;
        tables.samples.insert(measurement.id, MeasurementSamples::default());
        tables.measurements.insert(measurement.id, measurement.clone());
        Ok(measurement)
    }

    fn measurement(&self, id: u64) -> CResult<Measurement> {
        self.read()?
            .measurements
            .get(&id)
            .cloned()
            .ok_or(CaptureError::NotFound(id))
    }

    fn measurements_with_status(&self, status: MeasurementStatus) -> CResult<Vec<Measurement>> {
        Ok(self
            .read()?
            .measurements
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect())
    }

    fn write_status(&self, id: u64, status: MeasurementStatus) -> CResult<usize> {
        let mut tables = self.write()?;
        Ok(match tables.measurements.get_mut(&id) {
            Some(measurement) => {
                measurement.status = status;
                1
            }
            None => 0,
        })
    }

    fn update_distance(&self, id: u64, distance: f64) -> CResult<usize> {
        let mut tables = self.write()?;
        Ok(match tables.measurements.get_mut(&id) {
            Some(measurement) => {
                measurement.distance = distance;
                1
            }
            None => 0,
        })
    }

    fn append_event(&self, id: u64, event: Event) -> CResult<()> {
        let mut tables = self.write()?;
        let samples = samples_mut(&mut tables, id)?;
        let at = samples
            .events
            .partition_point(|e| e.timestamp <= event.timestamp);
        samples.events.insert(at, event);
        Ok(())
    }

    fn read_samples(&self, id: u64) -> CResult<MeasurementSamples> {
        self.read()?
            .samples
            .get(&id)
            .cloned()
            .ok_or(CaptureError::NotFound(id))
    }

    fn attachments(&self, measurement_id: u64) -> CResult<Vec<Attachment>> {
        Ok(self
            .read()?
            .attachments
            .values()
            .filter(|a| a.measurement_id == measurement_id)
            .cloned()
            .collect())
    }

    fn write_attachment_status(
        &self,
        attachment_id: u64,
        status: AttachmentStatus,
    ) -> CResult<usize> {
        let mut tables = self.write()?;
        Ok(match tables.attachments.get_mut(&attachment_id) {
            Some(attachment) => {
                attachment.status = status;
                1
            }
            None => 0,
        })
    }

    fn delete_measurement(&self, id: u64) -> CResult<usize> {
        let mut tables = self.write()?;
        tables.samples.remove(&id);
        tables.attachments.retain(|_, a| a.measurement_id != id);
        Ok(tables.measurements.remove(&id).map_or(0, |_| 1))
    }
}
