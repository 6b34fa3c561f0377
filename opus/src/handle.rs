//! Open/closed lifecycle shared by encoder and decoder.
//!
//! A [`Handle`] owns exactly one native codec state. The pointer is taken
//! out of the handle when it is released, so a closed handle cannot reach
//! the native layer again and the state is destroyed at most once.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::ptr::NonNull;

use tracing::{debug, warn};

use crate::error::{ErrorCode, OpusError, Result};
use crate::ffi;

/// Native codec state operations needed by [`Handle`].
pub(crate) trait NativeCodec {
    type Raw;

    /// Used in errors and logs ("encoder" / "decoder").
    const KIND: &'static str;

    /// Reinitializes codec state without reallocating.
    unsafe fn reset(raw: *mut Self::Raw) -> c_int;

    /// Frees the native state.
    unsafe fn destroy(raw: *mut Self::Raw);
}

pub(crate) struct Handle<C: NativeCodec> {
    raw: Option<NonNull<C::Raw>>,
    _codec: PhantomData<C>,
}

impl<C: NativeCodec> Handle<C> {
    /// Takes ownership of a freshly created native state.
    ///
    /// `error` is the status reported by the native create call.
    pub(crate) fn from_create(raw: *mut C::Raw, error: c_int) -> Result<Self> {
        match NonNull::new(raw) {
            Some(raw) if error == ffi::OPUS_OK => Ok(Self {
                raw: Some(raw),
                _codec: PhantomData,
            }),
            Some(raw) => {
                unsafe { C::destroy(raw.as_ptr()) };
                Err(Self::create_failed(error))
            }
            None => Err(Self::create_failed(if error == ffi::OPUS_OK {
                ffi::OPUS_ALLOC_FAIL
            } else {
                error
            })),
        }
    }

    fn create_failed(error: c_int) -> OpusError {
        let code = ErrorCode::from_raw(error);
        warn!("opus: {} create failed: {}", C::KIND, code);
        OpusError::Initialization { kind: C::KIND, code }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.raw.is_some()
    }

    /// Returns the live native pointer, or [`OpusError::Closed`].
    pub(crate) fn get(&mut self) -> Result<*mut C::Raw> {
        self.raw
            .map(NonNull::as_ptr)
            .ok_or(OpusError::Closed { kind: C::KIND })
    }

    /// Resets codec state. No-op when closed.
    pub(crate) fn reset(&mut self) {
        let Some(raw) = self.raw else {
            return;
        };
        let ret = unsafe { C::reset(raw.as_ptr()) };
        if ret != ffi::OPUS_OK {
            // OPUS_RESET_STATE only fails on a corrupted state.
            warn!("opus: {} reset returned {}", C::KIND, ErrorCode::from_raw(ret));
        } else {
            debug!("opus: {} reset", C::KIND);
        }
    }

    /// Releases the native state. No-op when already closed.
    pub(crate) fn close(&mut self) {
        if let Some(raw) = self.raw.take() {
            unsafe { C::destroy(raw.as_ptr()) };
            debug!("opus: {} closed", C::KIND);
        }
    }
}

impl<C: NativeCodec> Drop for Handle<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Maps a native status to `Ok(value)` or a codec error.
pub(crate) fn check(op: &'static str, ret: c_int) -> Result<c_int> {
    if ret < 0 {
        let code = ErrorCode::from_raw(ret);
        warn!("opus: {} failed: {}", op, code);
        return Err(OpusError::Codec { op, code });
    }
    Ok(ret)
}
