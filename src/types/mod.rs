pub mod samples;

pub use samples::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the on-disk sample encoding written by this crate
pub const PERSISTENCE_FILE_FORMAT_VERSION: u16 = 3;

/// Lifecycle status of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementStatus {
    /// Capturing data
    Open,
    /// Not capturing, may be resumed
    Paused,
    /// Capturing stopped, waiting for upload
    Finished,
    /// Measurement uploaded, attachments partially synced
    Uploading,
    /// Measurement and all attachments uploaded
    Synced,
    /// Rejected by the server or the user, never uploaded
    Skipped,
    /// Stored in an outdated format which can no longer be uploaded
    Deprecated,
}

impl MeasurementStatus {
    pub const ALL: [MeasurementStatus; 7] = [
        MeasurementStatus::Open,
        MeasurementStatus::Paused,
        MeasurementStatus::Finished,
        MeasurementStatus::Uploading,
        MeasurementStatus::Synced,
        MeasurementStatus::Skipped,
        MeasurementStatus::Deprecated,
    ];

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: MeasurementStatus) -> bool {
        use MeasurementStatus::*;
        matches!(
            (self, next),
            (Open, Paused)
                | (Paused, Open)
                | (Open, Finished)
                | (Paused, Finished)
                | (Finished, Uploading)
                | (Finished, Synced | Skipped | Deprecated)
                | (Uploading, Synced | Skipped | Deprecated)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MeasurementStatus::Synced | MeasurementStatus::Skipped | MeasurementStatus::Deprecated
        )
    }

    /// OPEN or PAUSED, i.e. the measurement is still owned by the capture path
    pub fn is_capturing(self) -> bool {
        matches!(self, MeasurementStatus::Open | MeasurementStatus::Paused)
    }
}

/// Mode of transportation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Walking,
    Bicycle,
    Car,
    Bus,
    Train,
    Motorbike,
    Unknown,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Walking => "WALKING",
            Modality::Bicycle => "BICYCLE",
            Modality::Car => "CAR",
            Modality::Bus => "BUS",
            Modality::Train => "TRAIN",
            Modality::Motorbike => "MOTORBIKE",
            Modality::Unknown => "UNKNOWN",
        }
    }

    /// Parses a modality tag, mapping anything unrecognized to `Unknown`
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "WALKING" => Modality::Walking,
            "BICYCLE" => Modality::Bicycle,
            "CAR" => Modality::Car,
            "BUS" => Modality::Bus,
            "TRAIN" => Modality::Train,
            "MOTORBIKE" => Modality::Motorbike,
            _ => Modality::Unknown,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: u64,
    pub status: MeasurementStatus,
    pub modality: Modality,
    /// Cumulative distance in meters
    pub distance: f64,
    pub file_format_version: u16,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
}

/// Lifecycle marker or modality change recorded during capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    LifecycleStart,
    LifecyclePause,
    LifecycleResume,
    LifecycleStop,
    ModalityTypeChange,
}

impl EventType {
    /// Wire code used in the transfer file
    pub fn code(self) -> u8 {
        match self {
            EventType::LifecycleStart => 1,
            EventType::LifecyclePause => 2,
            EventType::LifecycleResume => 3,
            EventType::LifecycleStop => 4,
            EventType::ModalityTypeChange => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EventType::LifecycleStart),
            2 => Some(EventType::LifecyclePause),
            3 => Some(EventType::LifecycleResume),
            4 => Some(EventType::LifecycleStop),
            5 => Some(EventType::ModalityTypeChange),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// New modality tag for `ModalityTypeChange`, absent otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: i64) -> Self {
        Self {
            timestamp,
            event_type,
            value: None,
        }
    }

    pub fn modality_change(modality: Modality, timestamp: i64) -> Self {
        Self {
            timestamp,
            event_type: EventType::ModalityTypeChange,
            value: Some(modality.as_str().to_string()),
        }
    }
}

/// Upload status of a single attachment file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentStatus {
    Saved,
    Synced,
    Skipped,
    Deprecated,
}

/// Non-time-series file (e.g. an image) belonging to a measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub measurement_id: u64,
    pub status: AttachmentStatus,
    pub path: std::path::PathBuf,
}
