//! Local camera capture through V4L2.

use crate::frame::{self, Frame};
use crate::source::{SourceError, VideoSource};
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUEST_WIDTH: u32 = 640;
const REQUEST_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

/// Pixel formats we can turn into grayscale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    /// YUYV 4:2:2 packed, the webcam default.
    Yuyv,
    /// 8-bit grayscale, native IR camera output.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

/// An open V4L2 capture device.
pub struct V4lSource {
    device: Device,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl V4lSource {
    /// Open and negotiate a format on a device path like `/dev/video0`.
    pub fn open(device_path: &str) -> Result<Self, SourceError> {
        if !Path::new(device_path).exists() {
            return Err(SourceError::Unavailable(format!(
                "device not found: {device_path}"
            )));
        }

        let device = Device::with_path(device_path)
            .map_err(|e| SourceError::Unavailable(format!("{device_path}: {e}")))?;

        let caps = device
            .query_caps()
            .map_err(|e| SourceError::Unavailable(format!("query caps: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(SourceError::Unavailable(format!(
                "{device_path} does not support video capture"
            )));
        }

        // Ask for YUYV; IR cameras commonly negotiate GREY or Y16 instead.
        let mut fmt = device
            .format()
            .map_err(|e| SourceError::Unavailable(format!("get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUEST_WIDTH;
        fmt.height = REQUEST_HEIGHT;
        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| SourceError::Unavailable(format!("set format: {e}")))?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if negotiated.fourcc == FourCC::new(b"Y16 ")
            || negotiated.fourcc == FourCC::new(b"Y16\0")
        {
            PixelFormat::Y16
        } else {
            return Err(SourceError::Unavailable(format!(
                "unsupported pixel format {:?} (need YUYV, GREY, or Y16)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "opened camera"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        })
    }

    fn buf_to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, SourceError> {
        let pixels = (self.width * self.height) as usize;
        match self.pixel_format {
            PixelFormat::Grey => {
                if buf.len() < pixels {
                    return Err(SourceError::Transient(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Y16 => frame::y16_to_grayscale(buf, self.width, self.height)
                .map_err(|e| SourceError::Transient(e.to_string())),
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height)
                .map_err(|e| SourceError::Transient(e.to_string())),
        }
    }
}

impl VideoSource for V4lSource {
    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| SourceError::Transient(format!("mmap stream: {e}")))?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| SourceError::Transient(format!("dequeue buffer: {e}")))?;

        let data = self.buf_to_grayscale(buf)?;
        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }
}
