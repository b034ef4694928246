//! Raw inertial sample files.
//!
//! # File Format
//! A flat sequence of 32 byte big-endian records:
//! `[i64 timestamp ms][f64 x][f64 y][f64 z]`. There is no header; the point
//! count is the file size divided by the record size.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{CResult, CaptureError};
use crate::types::Point3D;

pub const RECORD_SIZE: usize = 32;

/// Appends samples to a sensor file, creating it if necessary
pub struct SensorFileWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl SensorFileWriter {
    pub fn open(path: impl Into<PathBuf>) -> CResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, point: &Point3D) -> CResult<()> {
        self.writer.write_all(&encode_record(point))?;
        self.written += 1;
        Ok(())
    }

    pub fn append_all<'a>(&mut self, points: impl IntoIterator<Item = &'a Point3D>) -> CResult<()> {
        for point in points {
            self.append(point)?;
        }
        Ok(())
    }

    /// Points appended through this writer
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> CResult<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

fn encode_record(point: &Point3D) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    record[0..8].copy_from_slice(&point.timestamp.to_be_bytes());
    record[8..16].copy_from_slice(&point.x.to_be_bytes());
    record[16..24].copy_from_slice(&point.y.to_be_bytes());
    record[24..32].copy_from_slice(&point.z.to_be_bytes());
    record
}

fn decode_record(record: &[u8]) -> Point3D {
    let mut word = [0u8; 8];
    let mut next = |offset: usize| {
        word.copy_from_slice(&record[offset..offset + 8]);
        word
    };
    let timestamp = i64::from_be_bytes(next(0));
    let x = f64::from_be_bytes(next(8));
    let y = f64::from_be_bytes(next(16));
    let z = f64::from_be_bytes(next(24));
    Point3D::new(x, y, z, timestamp)
}

/// Decodes a whole sensor file into memory.
///
/// Fails with `MissingFile` if the file does not exist and with `Truncated`
/// if it ends in a partial record.
pub fn read_sensor_file(path: &Path) -> CResult<Vec<Point3D>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CaptureError::MissingFile(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    if bytes.len() % RECORD_SIZE != 0 {
        return Err(CaptureError::Truncated(format!(
            "{} has {} trailing bytes",
            path.display(),
            bytes.len() % RECORD_SIZE
        )));
    }

    Ok(bytes.chunks_exact(RECORD_SIZE).map(decode_record).collect())
}

/// Deletes a file, treating a missing file as already deleted.
///
/// Returns whether a file was actually removed.
pub fn delete_best_effort(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Deleted {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("File {} already gone, nothing to delete", path.display());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
