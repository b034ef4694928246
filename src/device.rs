//! Stable per-installation device identifier.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Mutex;

use log::info;
use uuid::Uuid;

use crate::error::{CResult, CaptureError};

static IDENTIFIER_LOCK: Mutex<()> = Mutex::new(());

/// Returns the identifier stored at `path`, generating and persisting a
/// random one on first use.
///
/// Concurrent callers in the same process always observe the same value.
pub fn device_identifier(path: &Path) -> CResult<String> {
    let _guard = IDENTIFIER_LOCK
        .lock()
        .map_err(|_| CaptureError::Internal("device identifier lock poisoned".to_string()))?;

    match fs::read_to_string(path) {
        Ok(stored) => {
            let stored = stored.trim();
            if Uuid::parse_str(stored).is_ok() {
                return Ok(stored.to_string());
            }
            info!("Replacing unreadable device identifier at {}", path.display());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let identifier = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &identifier)?;
    info!("Generated device identifier {}", identifier);
    Ok(identifier)
}
