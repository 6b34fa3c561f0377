//! Codec parameters captured when a handle is created.

use serde::{Deserialize, Serialize};

use crate::ffi;

/// Channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channels {
    #[default]
    Mono,
    Stereo,
}

impl Channels {
    /// Maps a stereo flag to a channel layout.
    pub fn from_stereo(stereo: bool) -> Self {
        if stereo { Self::Stereo } else { Self::Mono }
    }

    /// Returns the number of interleaved channels.
    pub fn count(&self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    pub fn is_stereo(&self) -> bool {
        matches!(self, Self::Stereo)
    }
}

/// Opus application type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Application {
    /// Best quality for voice signals.
    #[default]
    #[serde(rename = "voip")]
    VoIP,
    /// Best quality for non-voice signals.
    #[serde(rename = "audio")]
    Audio,
    /// Minimum possible coding delay.
    #[serde(rename = "restricted_lowdelay")]
    RestrictedLowdelay,
}

impl Application {
    /// Returns the libopus application constant.
    pub fn to_raw(&self) -> i32 {
        match self {
            Self::VoIP => ffi::OPUS_APPLICATION_VOIP,
            Self::Audio => ffi::OPUS_APPLICATION_AUDIO,
            Self::RestrictedLowdelay => ffi::OPUS_APPLICATION_RESTRICTED_LOWDELAY,
        }
    }

    /// Parses a libopus application constant (2048, 2049 or 2051).
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            ffi::OPUS_APPLICATION_VOIP => Some(Self::VoIP),
            ffi::OPUS_APPLICATION_AUDIO => Some(Self::Audio),
            ffi::OPUS_APPLICATION_RESTRICTED_LOWDELAY => Some(Self::RestrictedLowdelay),
            _ => None,
        }
    }
}

/// Default upper bound for one encoded frame, in bytes.
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 4000;

/// Default decode frame size: 20ms at 48kHz.
pub const DEFAULT_FRAME_SIZE: usize = 960;

/// Encoder parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Sample rate in Hz (8000, 12000, 16000, 24000, or 48000).
    pub sample_rate: i32,
    pub channels: Channels,
    pub application: Application,
    /// Maximum size of one encoded frame in bytes.
    pub max_output_size: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: Channels::Mono,
            application: Application::VoIP,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
        }
    }
}

impl EncoderConfig {
    pub fn new(
        sample_rate: i32,
        stereo: bool,
        max_output_size: usize,
        application: Application,
    ) -> Self {
        Self {
            sample_rate,
            channels: Channels::from_stereo(stereo),
            application,
            max_output_size,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: i32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: Channels) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        self.application = application;
        self
    }

    pub fn with_max_output_size(mut self, max_output_size: usize) -> Self {
        self.max_output_size = max_output_size;
        self
    }
}

/// Decoder parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Sample rate to decode at (8000, 12000, 16000, 24000, or 48000).
    pub sample_rate: i32,
    pub channels: Channels,
    /// Samples per channel in every decoded buffer.
    pub frame_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: Channels::Mono,
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }
}

impl DecoderConfig {
    pub fn new(sample_rate: i32, stereo: bool, frame_size: usize) -> Self {
        Self {
            sample_rate,
            channels: Channels::from_stereo(stereo),
            frame_size,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: i32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: Channels) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Interleaved samples in one decoded buffer.
    pub fn buffer_len(&self) -> usize {
        self.frame_size * self.channels.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_from_stereo() {
        assert_eq!(Channels::from_stereo(true), Channels::Stereo);
        assert_eq!(Channels::from_stereo(false), Channels::Mono);
        assert_eq!(Channels::Stereo.count(), 2);
        assert_eq!(Channels::Mono.count(), 1);
    }

    #[test]
    fn test_application_raw() {
        assert_eq!(Application::VoIP.to_raw(), 2048);
        assert_eq!(Application::Audio.to_raw(), 2049);
        assert_eq!(Application::RestrictedLowdelay.to_raw(), 2051);
        assert_eq!(Application::from_raw(2049), Some(Application::Audio));
        assert_eq!(Application::from_raw(2050), None);
    }

    #[test]
    fn test_defaults() {
        let enc = EncoderConfig::default();
        assert_eq!(enc.sample_rate, 48000);
        assert_eq!(enc.max_output_size, 4000);
        assert_eq!(enc.application, Application::VoIP);

        let dec = DecoderConfig::default();
        assert_eq!(dec.frame_size, 960);
        assert_eq!(dec.buffer_len(), 960);
        assert_eq!(dec.with_channels(Channels::Stereo).buffer_len(), 1920);
    }

    #[test]
    fn test_encoder_config_json() {
        let cfg: EncoderConfig = serde_json::from_str(
            r#"{"sample_rate": 16000, "channels": "stereo", "application": "restricted_lowdelay"}"#,
        )
        .unwrap();
        assert_eq!(cfg.sample_rate, 16000);
        assert_eq!(cfg.channels, Channels::Stereo);
        assert_eq!(cfg.application, Application::RestrictedLowdelay);
        assert_eq!(cfg.max_output_size, DEFAULT_MAX_OUTPUT_SIZE);

        let json = serde_json::to_string(&EncoderConfig::default()).unwrap();
        assert!(json.contains(r#""application":"voip""#));
    }

    #[test]
    fn test_decoder_config_json() {
        let cfg: DecoderConfig = serde_json::from_str(r#"{"frame_size": 1200}"#).unwrap();
        assert_eq!(cfg, DecoderConfig::new(48000, false, 1200));
    }
}
