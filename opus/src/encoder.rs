//! Opus encoder.

use std::os::raw::c_int;

use tracing::{debug, trace, warn};

use crate::config::{Application, Channels, EncoderConfig};
use crate::error::{ErrorCode, OpusError, Result};
use crate::ffi;
use crate::handle::{self, Handle, NativeCodec};
use crate::library;

/// Target bitrate of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitrate {
    /// Let the encoder choose (`-1000`).
    Auto,
    /// Maximum bitrate the frame size allows (`-1`).
    Max,
    /// Bits per second, 500..=512000.
    Bits(i32),
}

impl Bitrate {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            ffi::OPUS_AUTO => Self::Auto,
            ffi::OPUS_BITRATE_MAX => Self::Max,
            bits => Self::Bits(bits),
        }
    }

    pub fn to_raw(&self) -> i32 {
        match self {
            Self::Auto => ffi::OPUS_AUTO,
            Self::Max => ffi::OPUS_BITRATE_MAX,
            Self::Bits(bits) => *bits,
        }
    }
}

impl From<i32> for Bitrate {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

pub(crate) struct EncoderState;

impl NativeCodec for EncoderState {
    type Raw = ffi::OpusEncoder;
    const KIND: &'static str = "encoder";

    unsafe fn reset(raw: *mut ffi::OpusEncoder) -> c_int {
        unsafe { ffi::opus_encoder_ctl(raw, ffi::OPUS_RESET_STATE) }
    }

    unsafe fn destroy(raw: *mut ffi::OpusEncoder) {
        unsafe { ffi::opus_encoder_destroy(raw) }
    }
}

/// Opus encoder.
///
/// Each call to [`encode`](Self::encode) turns exactly one frame of
/// interleaved samples into one Opus packet. The encoder keeps prediction
/// state between calls; [`reset`](Self::reset) clears it.
///
/// Once [`close`](Self::close) has been called (or the encoder dropped)
/// the native state is gone: `encode` and `get_bitrate` fail with
/// [`OpusError::Closed`], while `set_bitrate`, `set_complexity`, `reset`
/// and `close` do nothing.
pub struct Encoder {
    config: EncoderConfig,
    handle: Handle<EncoderState>,
}

// Safety: The encoder handle is exclusively owned and every native call
// takes `&mut self`.
unsafe impl Send for Encoder {}

impl Encoder {
    /// Creates a new Opus encoder.
    ///
    /// Fails with [`OpusError::LibraryLoad`] if libopus is unusable, or
    /// [`OpusError::Initialization`] if `max_output_size` is zero or above
    /// `i32::MAX`, or libopus rejects the parameters.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        library::load()?;

        if config.max_output_size == 0 || config.max_output_size > i32::MAX as usize {
            warn!("opus: encoder max output size {} out of range", config.max_output_size);
            return Err(OpusError::Initialization {
                kind: EncoderState::KIND,
                code: ErrorCode::BadArg,
            });
        }

        let mut error: c_int = 0;
        let raw = unsafe {
            ffi::opus_encoder_create(
                config.sample_rate,
                config.channels.count() as c_int,
                config.application.to_raw(),
                &mut error,
            )
        };
        let handle = Handle::from_create(raw, error)?;

        debug!(
            "opus: encoder created ({} Hz, {:?}, {:?}, max {} bytes)",
            config.sample_rate, config.channels, config.application, config.max_output_size
        );
        Ok(Self { config, handle })
    }

    /// Creates a new VoIP encoder with the default output bound.
    pub fn new_voip(sample_rate: i32, channels: Channels) -> Result<Self> {
        Self::new(
            EncoderConfig::default()
                .with_sample_rate(sample_rate)
                .with_channels(channels),
        )
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> i32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> Channels {
        self.config.channels
    }

    pub fn application(&self) -> Application {
        self.config.application
    }

    pub fn max_output_size(&self) -> usize {
        self.config.max_output_size
    }

    /// Returns true until the encoder is closed.
    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Encodes one frame of interleaved PCM samples.
    ///
    /// `pcm.len()` must be a valid Opus frame size for the sample rate
    /// times the channel count; libopus decides which sizes are valid.
    /// The returned packet is at most [`max_output_size`](Self::max_output_size) bytes.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.config.max_output_size];
        let n = self.encode_to(pcm, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Encodes to a provided buffer. Returns number of bytes written.
    ///
    /// At most `max_output_size` bytes of `buf` are used.
    pub fn encode_to(&mut self, pcm: &[i16], buf: &mut [u8]) -> Result<usize> {
        let raw = self.handle.get()?;
        let frame_size = samples_per_channel(pcm.len(), self.config.channels)?;
        let max_bytes = buf.len().min(self.config.max_output_size).min(i32::MAX as usize);

        let n = unsafe {
            ffi::opus_encode(
                raw,
                pcm.as_ptr(),
                frame_size,
                buf.as_mut_ptr(),
                max_bytes as i32,
            )
        };
        let n = handle::check("encode", n)? as usize;

        trace!("opus: encoded {} samples into {} bytes", pcm.len(), n);
        Ok(n)
    }

    /// Sets the target bitrate. No-op when closed.
    ///
    /// Accepts [`Bitrate::Auto`] (-1000), [`Bitrate::Max`] (-1) or
    /// 500..=512000 bits per second. Out-of-range values are rejected by
    /// libopus.
    pub fn set_bitrate(&mut self, bitrate: impl Into<Bitrate>) -> Result<()> {
        let Ok(raw) = self.handle.get() else {
            return Ok(());
        };
        let bitrate = bitrate.into();
        let ret = unsafe {
            ffi::opus_encoder_ctl(raw, ffi::OPUS_SET_BITRATE_REQUEST, bitrate.to_raw())
        };
        handle::check("set bitrate", ret)?;
        debug!("opus: encoder bitrate set to {:?}", bitrate);
        Ok(())
    }

    /// Returns the bitrate currently in effect.
    pub fn get_bitrate(&mut self) -> Result<Bitrate> {
        let raw = self.handle.get()?;
        let mut bitrate: ffi::OpusInt32 = 0;
        let ret = unsafe {
            ffi::opus_encoder_ctl(
                raw,
                ffi::OPUS_GET_BITRATE_REQUEST,
                &mut bitrate as *mut ffi::OpusInt32,
            )
        };
        handle::check("get bitrate", ret)?;
        Ok(Bitrate::from_raw(bitrate))
    }

    /// Sets the encoder complexity (0-10). No-op when closed.
    pub fn set_complexity(&mut self, complexity: i32) -> Result<()> {
        let Ok(raw) = self.handle.get() else {
            return Ok(());
        };
        let ret =
            unsafe { ffi::opus_encoder_ctl(raw, ffi::OPUS_SET_COMPLEXITY_REQUEST, complexity) };
        handle::check("set complexity", ret)?;
        Ok(())
    }

    /// Resets the encoder to its initial state. No-op when closed.
    pub fn reset(&mut self) {
        self.handle.reset();
    }

    /// Releases the native encoder. Calling it again does nothing.
    pub fn close(&mut self) {
        self.handle.close();
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Converts an interleaved sample count to samples per channel.
fn samples_per_channel(len: usize, channels: Channels) -> Result<c_int> {
    let count = channels.count();
    if len % count != 0 {
        return Err(OpusError::Codec { op: "encode", code: ErrorCode::BadArg });
    }
    c_int::try_from(len / count).map_err(|_| OpusError::Codec {
        op: "encode",
        code: ErrorCode::BadArg,
    })
}
