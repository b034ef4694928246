//! Binary transfer file used to upload a measurement.
//!
//! # File Format
//! `[u16 big-endian format version][message]`, optionally wrapped in a raw
//! DEFLATE stream (see [`compression`]).
//!
//! The message is a postcard encoded [`TransferMessage`]. It starts with the
//! declared counts (locations, accelerations, rotations, directions, events).
//! Locations follow as parallel delta columns of fixed point values. Each
//! inertial stream is a list of batches, one per sample file on disk, each
//! batch holding its own delta columns. Events close the message.
//!
//! Fixed point units: coordinates in 1e-6 degrees, altitude, speed and
//! accuracies in centimeters (per second), inertial axes in 1e-3 units.

pub mod compression;
pub mod delta;
pub mod message;

pub use compression::{compress, decompress};
pub use message::TransferMessage;

use std::io::Write;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{CResult, CaptureError};
use crate::sensor_file::read_sensor_file;
use crate::store::{MeasurementSamples, MeasurementStore};
use crate::types::{Event, GeoLocation, Point3D, SensorKind, PERSISTENCE_FILE_FORMAT_VERSION};
use message::{EventColumns, LocationColumns, PointColumns};

pub const TRANSFER_FILE_FORMAT_VERSION: u16 = 3;

const HEADER_LEN: usize = 2;

/// Decoded content of a transfer file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferFile {
    pub locations: Vec<GeoLocation>,
    /// One batch per sample file
    pub accelerations: Vec<Vec<Point3D>>,
    pub rotations: Vec<Vec<Point3D>>,
    pub directions: Vec<Vec<Point3D>>,
    pub events: Vec<Event>,
}

impl TransferFile {
    pub fn batches(&self, sensor: SensorKind) -> &[Vec<Point3D>] {
        match sensor {
            SensorKind::Accelerometer => &self.accelerations,
            SensorKind::Gyroscope => &self.rotations,
            SensorKind::Magnetometer => &self.directions,
        }
    }

    fn batches_mut(&mut self, sensor: SensorKind) -> &mut Vec<Vec<Point3D>> {
        match sensor {
            SensorKind::Accelerometer => &mut self.accelerations,
            SensorKind::Gyroscope => &mut self.rotations,
            SensorKind::Magnetometer => &mut self.directions,
        }
    }

    /// Number of samples of `sensor` across all batches
    pub fn point_count(&self, sensor: SensorKind) -> usize {
        self.batches(sensor).iter().map(Vec::len).sum()
    }

    pub fn to_message(&self) -> TransferMessage {
        let columns = |sensor: SensorKind| -> Vec<PointColumns> {
            self.batches(sensor)
                .iter()
                .map(|batch| PointColumns::from_points(batch))
                .collect()
        };
        TransferMessage {
            location_count: self.locations.len() as u64,
            acceleration_count: self.point_count(SensorKind::Accelerometer) as u64,
            rotation_count: self.point_count(SensorKind::Gyroscope) as u64,
            direction_count: self.point_count(SensorKind::Magnetometer) as u64,
            event_count: self.events.len() as u64,
            locations: LocationColumns::from_locations(&self.locations),
            accelerations: columns(SensorKind::Accelerometer),
            rotations: columns(SensorKind::Gyroscope),
            directions: columns(SensorKind::Magnetometer),
            events: EventColumns::from_events(&self.events),
        }
    }

    pub fn from_message(message: TransferMessage) -> CResult<Self> {
        let declared = [
            (SensorKind::Accelerometer, message.acceleration_count),
            (SensorKind::Gyroscope, message.rotation_count),
            (SensorKind::Magnetometer, message.direction_count),
        ];
        let mut file = TransferFile {
            locations: message
                .locations
                .into_locations(message.location_count as usize)?,
            events: message.events.into_events(message.event_count as usize)?,
            ..Default::default()
        };
        let streams = [
            (SensorKind::Accelerometer, message.accelerations),
            (SensorKind::Gyroscope, message.rotations),
            (SensorKind::Magnetometer, message.directions),
        ];
        for (sensor, batches) in streams {
            *file.batches_mut(sensor) = batches
                .into_iter()
                .map(PointColumns::into_points)
                .collect::<CResult<_>>()?;
        }
        for (sensor, expected) in declared {
            if file.point_count(sensor) as u64 != expected {
                return Err(CaptureError::MalformedMessage(format!(
                    "{:?} declares {} points but holds {}",
                    sensor,
                    expected,
                    file.point_count(sensor)
                )));
            }
        }
        Ok(file)
    }

    /// Encodes header and message
    pub fn to_bytes(&self) -> CResult<Vec<u8>> {
        let message = self.to_message().encode()?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + message.len());
        bytes.extend_from_slice(&TRANSFER_FILE_FORMAT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&message);
        Ok(bytes)
    }

    /// Parses an uncompressed transfer file.
    ///
    /// Fails with `FormatVersionMismatch` for any version other than
    /// [`TRANSFER_FILE_FORMAT_VERSION`].
    pub fn parse(bytes: &[u8]) -> CResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CaptureError::Truncated("missing format header".to_string()));
        }
        let version = u16::from_be_bytes([bytes[0], bytes[1]]);
        if version != TRANSFER_FILE_FORMAT_VERSION {
            return Err(CaptureError::FormatVersionMismatch {
                found: version,
                supported: TRANSFER_FILE_FORMAT_VERSION,
            });
        }

        let (message, rest) = TransferMessage::decode(&bytes[HEADER_LEN..])?;
        if !rest.is_empty() {
            return Err(CaptureError::Truncated(format!(
                "{} unexpected trailing bytes",
                rest.len()
            )));
        }
        Self::from_message(message)
    }

    /// Inflates and parses a compressed transfer file
    pub fn parse_compressed(bytes: &[u8]) -> CResult<Self> {
        Self::parse(&decompress(bytes)?)
    }
}

/// Builds transfer files for measurements held in a store
pub struct TransferFileSerializer<S: MeasurementStore> {
    store: Arc<S>,
}

impl<S: MeasurementStore> TransferFileSerializer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Collects everything the transfer file of measurement `id` contains.
    ///
    /// Sample files are read fully into memory. A missing file is only
    /// tolerated when it was declared empty.
    pub fn load(&self, id: u64) -> CResult<TransferFile> {
        let measurement = self.store.measurement(id)?;
        if measurement.file_format_version != PERSISTENCE_FILE_FORMAT_VERSION {
            return Err(CaptureError::FormatVersionMismatch {
                found: measurement.file_format_version,
                supported: PERSISTENCE_FILE_FORMAT_VERSION,
            });
        }

        let samples = self.store.read_samples(id)?;
        debug!(
            "Measurement {}: {} locations, {}/{}/{} inertial points declared",
            id,
            samples.locations.len(),
            samples.point_count(SensorKind::Accelerometer),
            samples.point_count(SensorKind::Gyroscope),
            samples.point_count(SensorKind::Magnetometer)
        );

        let mut batches = Vec::with_capacity(SensorKind::ALL.len());
        for sensor in SensorKind::ALL {
            batches.push((sensor, load_batches(&samples, sensor)?));
        }
        let mut file = TransferFile {
            locations: samples.locations,
            events: samples.events,
            ..Default::default()
        };
        for (sensor, sensor_batches) in batches {
            *file.batches_mut(sensor) = sensor_batches;
        }
        Ok(file)
    }

    pub fn serialize(&self, id: u64) -> CResult<Vec<u8>> {
        let bytes = self.load(id)?.to_bytes()?;
        debug!("Serialized measurement {} into {} bytes", id, bytes.len());
        Ok(bytes)
    }

    /// [`serialize`](Self::serialize) followed by raw DEFLATE at level 9
    pub fn serialize_compressed(&self, id: u64) -> CResult<Vec<u8>> {
        let raw = self.serialize(id)?;
        let compressed = compress(&raw)?;
        debug!(
            "Compressed measurement {} from {} to {} bytes",
            id,
            raw.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    /// Writes the (optionally compressed) transfer file into `sink`,
    /// returning the number of bytes written
    pub fn serialize_to<W: Write>(&self, id: u64, compressed: bool, mut sink: W) -> CResult<usize> {
        let bytes = if compressed {
            self.serialize_compressed(id)?
        } else {
            self.serialize(id)?
        };
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(bytes.len())
    }
}

fn load_batches(samples: &MeasurementSamples, sensor: SensorKind) -> CResult<Vec<Vec<Point3D>>> {
    let mut batches = Vec::new();
    for file in samples.inertial_files_for(sensor) {
        if file.point_count == 0 && !file.path.exists() {
            continue;
        }
        let points = read_sensor_file(&file.path)?;
        if points.len() as u64 != file.point_count {
            warn!(
                "{} declares {} points but holds {}",
                file.path.display(),
                file.point_count,
                points.len()
            );
        }
        batches.push(points);
    }
    Ok(batches)
}
