//! Core of a mobile data capturing SDK.
//!
//! Holds the measurement lifecycle with its device-wide OPEN/PAUSED
//! invariant, track reconstruction from pause/resume events, derived motion
//! metrics and the binary transfer file used for upload.

pub mod cleaning;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod sensor_file;
pub mod store;
pub mod tracks;
pub mod types;


pub use cleaning::{AcceptAllLocations, DefaultLocationCleaning, LocationCleaningStrategy};
pub use codec::{TransferFile, TransferFileSerializer, TRANSFER_FILE_FORMAT_VERSION};
pub use config::CaptureConfig;
pub use error::{CResult, CaptureError};
pub use lifecycle::MeasurementLifecycle;
pub use metrics::{AscendParameters, MotionStatistics};
pub use store::{MeasurementStore, MemoryStore};
pub use tracks::{reconstruct_cleaned_tracks, reconstruct_tracks};
pub use types::{
    Event, EventType, GeoLocation, Measurement, MeasurementStatus, Modality, Point3D, Pressure,
    SensorKind, Track, PERSISTENCE_FILE_FORMAT_VERSION,
};
