//! Captured frame type and pixel-format conversion helpers.

use thiserror::Error;

/// One grayscale frame off a video source.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data, `width * height` bytes, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Extract the Y channel from packed YUYV 4:2:2.
///
/// YUYV packs two pixels per 4 bytes as `[Y0, U, Y1, V]`; luma is every
/// even-indexed byte.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::ShortBuffer {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Downscale 16-bit little-endian grayscale to 8-bit.
pub fn y16_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if buf.len() < expected {
        return Err(FrameError::ShortBuffer {
            expected,
            actual: buf.len(),
        });
    }
    Ok((0..pixels)
        .map(|i| {
            let value = u16::from_le_bytes([buf[i * 2], buf[i * 2 + 1]]);
            (value >> 8) as u8
        })
        .collect())
}
