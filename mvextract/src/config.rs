//! # Capture configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Options used when opening a source and configuring its decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CaptureConfig {
    /// Number of decoder threads, `0` lets the decoder pick.
    ///
    /// More than one thread adds output latency of a few frames, but does not change the frames
    /// or motion vectors produced.
    pub decoder_threads: usize,
    /// Transport protocol used for `rtsp://` sources (`tcp` or `udp`).
    pub rtsp_transport: Option<String>,
    /// Silence the decoder library's own log output.
    pub quiet: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            decoder_threads: 1,
            rtsp_transport: Some("tcp".into()),
            quiet: true,
        }
    }
}

impl CaptureConfig {
    /// Whether `path` refers to an RTSP stream.
    pub fn is_rtsp(path: &str) -> bool {
        path.get(..7)
            .map(|p| p.eq_ignore_ascii_case("rtsp://"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtsp_detection() {
        assert!(CaptureConfig::is_rtsp("rtsp://10.0.0.2:554/stream"));
        assert!(CaptureConfig::is_rtsp("RTSP://cam"));
        assert!(!CaptureConfig::is_rtsp("vid_h264.mp4"));
        assert!(!CaptureConfig::is_rtsp("rtsp"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_uses_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{ "decoder_threads": 4 }"#).unwrap();
        assert_eq!(config.decoder_threads, 4);
        assert_eq!(config.rtsp_transport.as_deref(), Some("tcp"));
        assert!(config.quiet);
    }
}
