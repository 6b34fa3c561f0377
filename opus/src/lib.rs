//! Stateful Opus encoder and decoder handles.
//!
//! Each [`Encoder`] and [`Decoder`] owns one libopus codec state. A handle
//! is open from construction until [`close`](Encoder::close) (or drop),
//! after which it never touches libopus again:
//!
//! - `encode`, `decode` and `get_bitrate` fail with [`OpusError::Closed`]
//! - `set_bitrate`, `reset` and `close` are no-ops
//!
//! Native failures during a transform are reported as [`OpusError::Codec`]
//! with the libopus status; the handle stays open and usable.
//!
//! Handles are `Send` but not `Sync`: one caller drives a handle at a time,
//! distinct handles are independent. The [`capi`] module exposes the same
//! contract over integer ids for foreign hosts.
//!
//! # Example
//!
//! ```no_run
//! use giztoy_opus::{Application, Decoder, DecoderConfig, Encoder, EncoderConfig};
//!
//! let mut encoder = Encoder::new(EncoderConfig::new(48000, false, 1024, Application::VoIP))?;
//! encoder.set_bitrate(50_000)?;
//!
//! let pcm = vec![0i16; 960]; // 20ms at 48kHz
//! let packet = encoder.encode(&pcm)?;
//! encoder.close();
//!
//! let mut decoder = Decoder::new(DecoderConfig::new(48000, false, 960))?;
//! let decoded = decoder.decode(&packet)?;
//! assert_eq!(decoded.len(), 960);
//! decoder.close();
//! # Ok::<(), giztoy_opus::OpusError>(())
//! ```

pub mod capi;
mod config;
mod decoder;
mod encoder;
mod error;
mod ffi;
mod handle;
pub mod library;

pub use config::{
    Application, Channels, DecoderConfig, EncoderConfig, DEFAULT_FRAME_SIZE,
    DEFAULT_MAX_OUTPUT_SIZE,
};
pub use decoder::Decoder;
pub use encoder::{Bitrate, Encoder};
pub use error::{ErrorCode, OpusError, Result};
