//! Process-wide libopus initialization.
//!
//! [`load`] runs once per process, on first use, and checks that the
//! linked libopus answers with a version string. Every constructor calls
//! it before touching the native codec; concurrent first callers block on
//! the same initialization.

use std::ffi::CStr;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{OpusError, Result};
use crate::ffi;

static LIBRARY: OnceCell<std::result::Result<String, String>> = OnceCell::new();

/// Loads the native library. Safe to call multiple times.
///
/// Returns the libopus version string (e.g. `libopus 1.3.1`).
pub fn load() -> Result<&'static str> {
    let result = LIBRARY.get_or_init(|| {
        let version = probe_version();
        match &version {
            Ok(v) => debug!("opus library loaded: {}", v),
            Err(e) => warn!("opus library unusable: {}", e),
        }
        version
    });

    match result {
        Ok(version) => Ok(version.as_str()),
        Err(e) => Err(OpusError::LibraryLoad(e.clone())),
    }
}

/// Returns true if [`load`] has run and succeeded.
pub fn is_loaded() -> bool {
    matches!(LIBRARY.get(), Some(Ok(_)))
}

fn probe_version() -> std::result::Result<String, String> {
    let ptr = unsafe { ffi::opus_get_version_string() };
    if ptr.is_null() {
        return Err("opus_get_version_string returned null".to_string());
    }
    let version = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    if !version.starts_with("libopus") {
        return Err(format!("unexpected version string {:?}", version));
    }
    Ok(version)
}
