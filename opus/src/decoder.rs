//! Opus decoder.

use std::os::raw::c_int;
use std::ptr;

use tracing::{debug, trace, warn};

use crate::config::{Channels, DecoderConfig};
use crate::error::{ErrorCode, OpusError, Result};
use crate::ffi;
use crate::handle::{self, Handle, NativeCodec};
use crate::library;

pub(crate) struct DecoderState;

impl NativeCodec for DecoderState {
    type Raw = ffi::OpusDecoder;
    const KIND: &'static str = "decoder";

    unsafe fn reset(raw: *mut ffi::OpusDecoder) -> c_int {
        unsafe { ffi::opus_decoder_ctl(raw, ffi::OPUS_RESET_STATE) }
    }

    unsafe fn destroy(raw: *mut ffi::OpusDecoder) {
        unsafe { ffi::opus_decoder_destroy(raw) }
    }
}

/// Opus decoder.
///
/// Every decoded buffer holds `frame_size * channels` interleaved samples,
/// where `frame_size` comes from [`DecoderConfig`]. It does not have to
/// match the frame size the packet was encoded with: a shorter packet is
/// decoded into the front of the buffer and the rest is silence, a longer
/// one fails with `OPUS_BUFFER_TOO_SMALL`.
pub struct Decoder {
    config: DecoderConfig,
    handle: Handle<DecoderState>,
}

// Safety: The decoder handle is exclusively owned and every native call
// takes `&mut self`.
unsafe impl Send for Decoder {}

impl Decoder {
    /// Creates a new Opus decoder.
    ///
    /// Fails with [`OpusError::Initialization`] if `frame_size` is zero or
    /// `frame_size * channels` exceeds `i32::MAX`, or libopus rejects the
    /// parameters.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        library::load()?;

        let buffer_len = config.frame_size.checked_mul(config.channels.count());
        if config.frame_size == 0 || buffer_len.is_none_or(|n| n > i32::MAX as usize) {
            warn!("opus: decoder frame size {} out of range", config.frame_size);
            return Err(OpusError::Initialization {
                kind: DecoderState::KIND,
                code: ErrorCode::BadArg,
            });
        }

        let mut error: c_int = 0;
        let raw = unsafe {
            ffi::opus_decoder_create(
                config.sample_rate,
                config.channels.count() as c_int,
                &mut error,
            )
        };
        let handle = Handle::from_create(raw, error)?;

        debug!(
            "opus: decoder created ({} Hz, {:?}, frame size {})",
            config.sample_rate, config.channels, config.frame_size
        );
        Ok(Self { config, handle })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> i32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> Channels {
        self.config.channels
    }

    pub fn frame_size(&self) -> usize {
        self.config.frame_size
    }

    /// Returns true until the decoder is closed.
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Decodes one Opus packet into `frame_size * channels` samples.
    ///
    /// An empty packet runs packet loss concealment.
    pub fn decode(&mut self, encoded: &[u8]) -> Result<Vec<i16>> {
        let mut buf = vec![0i16; self.config.buffer_len()];
        self.decode_to(encoded, &mut buf)?;
        Ok(buf)
    }

    /// Decodes to a provided buffer. Returns number of samples per channel.
    ///
    /// The buffer length bounds the decoded frame; samples past the
    /// returned count are left untouched.
    pub fn decode_to(&mut self, encoded: &[u8], buf: &mut [i16]) -> Result<usize> {
        let raw = self.handle.get()?;

        let frame_size = c_int::try_from(buf.len() / self.config.channels.count())
            .map_err(|_| OpusError::Codec { op: "decode", code: ErrorCode::BadArg })?;
        let (data_ptr, data_len) = if encoded.is_empty() {
            (ptr::null(), 0)
        } else {
            let len = ffi::OpusInt32::try_from(encoded.len())
                .map_err(|_| OpusError::Codec { op: "decode", code: ErrorCode::InvalidPacket })?;
            (encoded.as_ptr(), len)
        };

        let n = unsafe {
            ffi::opus_decode(
                raw,
                data_ptr,
                data_len,
                buf.as_mut_ptr(),
                frame_size,
                0, // decode_fec
            )
        };
        let n = handle::check("decode", n)? as usize;

        trace!("opus: decoded {} bytes into {} samples per channel", encoded.len(), n);
        Ok(n)
    }

    /// Performs packet loss concealment (PLC) for one lost frame.
    pub fn decode_plc(&mut self) -> Result<Vec<i16>> {
        self.decode(&[])
    }

    /// Resets the decoder to its initial state. No-op when closed.
    pub fn reset(&mut self) {
        self.handle.reset();
    }

    /// Releases the native decoder. Calling it again does nothing.
    pub fn close(&mut self) {
        self.handle.close();
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}
