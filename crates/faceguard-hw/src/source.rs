//! Video source abstraction for the recognition worker.

use crate::frame::Frame;
use crate::v4l2::V4lSource;
use thiserror::Error;

/// Where frames come from: a local camera index or a stream URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    /// Local V4L2 device index (`/dev/video<n>`).
    Device(u32),
    /// Anything that is not a bare integer: a device path or stream URL.
    Uri(String),
}

impl SourceId {
    /// Parse a source string: a bare non-negative integer is a device index,
    /// everything else passes through as a URI.
    pub fn parse(raw: &str) -> SourceId {
        let raw = raw.trim();
        match raw.parse::<u32>() {
            Ok(index) => SourceId::Device(index),
            Err(_) => SourceId::Uri(raw.to_string()),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Device(index) => write!(f, "{index}"),
            SourceId::Uri(uri) => f.write_str(uri),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source cannot deliver frames at all; the worker gives up.
    #[error("video source unavailable: {0}")]
    Unavailable(String),
    /// A single read failed; the worker retries after a short pause.
    #[error("frame read failed: {0}")]
    Transient(String),
}

/// A stream of grayscale frames. Dropping the source releases the device.
pub trait VideoSource: Send {
    /// Blocking read of the next frame.
    fn read_frame(&mut self) -> Result<Frame, SourceError>;
}

impl std::fmt::Debug for dyn VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VideoSource")
    }
}

/// Open a source for capture.
///
/// Device indices and `/dev/` paths go through V4L2. Network stream URIs
/// parse fine but have no capture backend here, so opening one reports the
/// source as unavailable.
pub fn open_source(id: &SourceId) -> Result<Box<dyn VideoSource>, SourceError> {
    match id {
        SourceId::Device(index) => {
            let path = format!("/dev/video{index}");
            Ok(Box::new(V4lSource::open(&path)?))
        }
        SourceId::Uri(uri) if uri.starts_with("/dev/") => Ok(Box::new(V4lSource::open(uri)?)),
        SourceId::Uri(uri) => Err(SourceError::Unavailable(format!(
            "no capture backend for stream URI: {uri}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_is_device() {
        assert_eq!(SourceId::parse("0"), SourceId::Device(0));
        assert_eq!(SourceId::parse(" 2 "), SourceId::Device(2));
    }

    #[test]
    fn test_parse_non_integer_is_uri() {
        assert_eq!(
            SourceId::parse("rtsp://cam.local/stream"),
            SourceId::Uri("rtsp://cam.local/stream".into())
        );
        assert_eq!(SourceId::parse("/dev/video2"), SourceId::Uri("/dev/video2".into()));
        assert_eq!(SourceId::parse("-1"), SourceId::Uri("-1".into()));
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(SourceId::Device(3).to_string(), "3");
        assert_eq!(SourceId::parse(SourceId::Device(3).to_string().as_str()), SourceId::Device(3));
    }

    #[test]
    fn test_open_stream_uri_unavailable() {
        let err = open_source(&SourceId::Uri("rtsp://cam.local/stream".into())).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn test_open_missing_device_unavailable() {
        // Hosts with 64 capture devices exist; skip there.
        if std::path::Path::new("/dev/video63").exists() {
            return;
        }
        let err = open_source(&SourceId::Device(63)).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
