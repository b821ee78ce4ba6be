//! V4L2 camera capture
//!
//! Requests RGB3 from the driver and falls back to whatever the device
//! negotiates, as long as it is MJPG or YUYV.

use image::{ImageFormat, RgbImage};
use ouroboros::self_referencing;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::{CameraError, Frame, FrameSource, device_path};
use crate::config::CameraConfig;

/// Number of mmap buffers queued with the driver
const BUFFER_COUNT: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelLayout {
    Rgb24,
    Mjpeg,
    Yuyv,
}

impl PixelLayout {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"RGB3" => Some(Self::Rgb24),
            b"MJPG" => Some(Self::Mjpeg),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

#[self_referencing]
struct CaptureState {
    device: Device,
    #[borrows(device)]
    #[covariant]
    stream: MmapStream<'this>,
}

/// Camera backed by a V4L2 device node
pub struct V4l2Camera {
    path: String,
    state: CaptureState,
    layout: PixelLayout,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl V4l2Camera {
    /// Open the device and start streaming
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the node cannot be opened, the
    /// negotiated pixel format is unsupported, or streaming cannot start
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let path = device_path(&config.device);
        let unavailable =
            |e: std::io::Error| CameraError::DeviceUnavailable(format!("{path}: {e}"));

        let device = Device::with_path(&path).map_err(unavailable)?;

        let mut format = device.format().map_err(unavailable)?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(e) => {
                tracing::warn!(device = %path, error = %e, "failed to set capture format");
                device.format().map_err(unavailable)?
            }
        };

        let layout = PixelLayout::from_fourcc(format.fourcc).ok_or_else(|| {
            CameraError::DeviceUnavailable(format!(
                "{path}: unsupported pixel format {}",
                format.fourcc
            ))
        })?;

        if config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.fps);
            if let Err(e) = device.set_params(&params) {
                tracing::warn!(device = %path, error = %e, "failed to set frame rate");
            }
        }

        let state = CaptureState::try_new(device, |device| {
            MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
        })
        .map_err(unavailable)?;

        tracing::info!(
            device = %path,
            width = format.width,
            height = format.height,
            format = ?layout,
            "camera opened"
        );

        Ok(Self {
            path,
            state,
            layout,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }

    fn capture(&mut self) -> Result<Vec<u8>, CameraError> {
        self.state
            .with_stream_mut(|stream| {
                stream.next().map(|(buf, meta)| {
                    let used = usize::try_from(meta.bytesused).unwrap_or(buf.len());
                    let used = if used == 0 { buf.len() } else { used.min(buf.len()) };
                    buf[..used].to_vec()
                })
            })
            .map_err(|e| CameraError::FrameRead(format!("{}: {e}", self.path)))
    }

    fn decode(&self, data: Vec<u8>) -> Result<RgbImage, CameraError> {
        match self.layout {
            PixelLayout::Rgb24 => RgbImage::from_raw(self.width, self.height, data)
                .ok_or_else(|| CameraError::FrameRead("short RGB frame".to_string())),
            PixelLayout::Mjpeg => image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
                .map(|img| img.to_rgb8())
                .map_err(|e| CameraError::FrameRead(format!("MJPG decode failed: {e}"))),
            PixelLayout::Yuyv => yuyv_to_rgb(&data, self.width, self.height),
        }
    }
}

impl FrameSource for V4l2Camera {
    fn name(&self) -> &str {
        &self.path
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let data = self.capture()?;
        let image = self.decode(data)?;
        self.frame_count += 1;

        Ok(Frame {
            seq: self.frame_count,
            image,
        })
    }
}

/// Convert packed YUYV 4:2:2 to RGB
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage, CameraError> {
    let pixels = (width as usize) * (height as usize);
    if data.len() < pixels * 2 {
        return Err(CameraError::FrameRead(format!(
            "YUYV frame length mismatch: expected {}, got {}",
            pixels * 2,
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in data[..pixels * 2].chunks_exact(4) {
        let u = f32::from(chunk[1]) - 128.0;
        let v = f32::from(chunk[3]) - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = f32::from(y);
            rgb.push(clamp_to_u8(1.402_f32.mul_add(v, y)));
            rgb.push(clamp_to_u8(0.714_136_f32.mul_add(-v, 0.344_136_f32.mul_add(-u, y))));
            rgb.push(clamp_to_u8(1.772_f32.mul_add(u, y)));
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| CameraError::FrameRead("YUYV conversion size mismatch".to_string()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
