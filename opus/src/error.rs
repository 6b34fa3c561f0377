//! Error types for Opus handle operations.

use std::fmt;

use thiserror::Error;

use crate::ffi;

/// Native libopus status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// One or more invalid/out of range arguments.
    BadArg,
    /// Not enough bytes allocated in the buffer.
    BufferTooSmall,
    /// An internal error was detected.
    InternalError,
    /// The compressed data passed is corrupted.
    InvalidPacket,
    /// Invalid/unsupported request number.
    Unimplemented,
    /// An encoder or decoder structure is invalid or already freed.
    InvalidState,
    /// Memory allocation has failed.
    AllocFail,
    /// A status libopus does not document.
    Unknown(i32),
}

impl ErrorCode {
    /// Decodes a negative libopus status.
    pub fn from_raw(code: i32) -> Self {
        match code {
            ffi::OPUS_BAD_ARG => Self::BadArg,
            ffi::OPUS_BUFFER_TOO_SMALL => Self::BufferTooSmall,
            ffi::OPUS_INTERNAL_ERROR => Self::InternalError,
            ffi::OPUS_INVALID_PACKET => Self::InvalidPacket,
            ffi::OPUS_UNIMPLEMENTED => Self::Unimplemented,
            ffi::OPUS_INVALID_STATE => Self::InvalidState,
            ffi::OPUS_ALLOC_FAIL => Self::AllocFail,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw libopus status.
    pub fn raw(&self) -> i32 {
        match self {
            Self::BadArg => ffi::OPUS_BAD_ARG,
            Self::BufferTooSmall => ffi::OPUS_BUFFER_TOO_SMALL,
            Self::InternalError => ffi::OPUS_INTERNAL_ERROR,
            Self::InvalidPacket => ffi::OPUS_INVALID_PACKET,
            Self::Unimplemented => ffi::OPUS_UNIMPLEMENTED,
            Self::InvalidState => ffi::OPUS_INVALID_STATE,
            Self::AllocFail => ffi::OPUS_ALLOC_FAIL,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", ffi::error_string(self.raw()), self.raw())
    }
}

/// Errors returned by encoder and decoder handles.
#[derive(Debug, Error)]
pub enum OpusError {
    /// The native library could not be loaded or is unusable.
    #[error("opus: library load failed: {0}")]
    LibraryLoad(String),

    /// The native codec rejected the configuration or failed to allocate.
    #[error("opus: {kind} create failed: {code}")]
    Initialization { kind: &'static str, code: ErrorCode },

    /// The handle has been closed.
    #[error("opus: {kind} is closed")]
    Closed { kind: &'static str },

    /// A native transform or control call failed. The handle stays open.
    #[error("opus: {op} failed: {code}")]
    Codec { op: &'static str, code: ErrorCode },
}

impl OpusError {
    /// Returns the native status carried by this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Initialization { code, .. } | Self::Codec { code, .. } => Some(*code),
            Self::LibraryLoad(_) | Self::Closed { .. } => None,
        }
    }

    /// Returns true if the handle was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, OpusError>;
