//! Camera frame sources
//!
//! A [`CameraOpener`] acquires a device and hands back a [`FrameSource`],
//! which yields [`Frame`]s until it is released or the device fails.
//!
//! Device strings:
//! - `0`, `1`, ... : device index (`/dev/videoN` on Linux)
//! - `/dev/video2` : explicit device node
//! - `stub://name` : synthetic test pattern, optionally `stub://name?frames=N`

mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

use image::RgbImage;
use thiserror::Error;

use crate::config::CameraConfig;

pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

/// Prefix selecting the synthetic frame source
pub const STUB_PREFIX: &str = "stub://";

/// One captured image, RGB channel order
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number, starting at 1
    pub seq: u64,
    pub image: RgbImage,
}

/// Camera errors
#[derive(Debug, Error)]
pub enum CameraError {
    /// The device could not be opened
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// A frame could not be read (disconnect, end of stream)
    #[error("frame read failed: {0}")]
    FrameRead(String),

    /// The device handle was released by the controller
    #[error("camera released")]
    Released,
}

/// A device producing successive frames
pub trait FrameSource: Send {
    /// Human-readable device name for logs
    fn name(&self) -> &str;

    /// Block until the next frame is available
    ///
    /// # Errors
    ///
    /// Returns `FrameRead` when the device stops producing frames
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Acquires a frame source
pub trait CameraOpener: Send + Sync {
    /// Open the configured device
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device cannot be opened
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError>;
}

/// Opens the device named in [`CameraConfig`]
#[derive(Debug, Clone)]
pub struct DeviceOpener {
    config: CameraConfig,
}

impl DeviceOpener {
    #[must_use]
    pub const fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl CameraOpener for DeviceOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        if self.config.device.starts_with(STUB_PREFIX) {
            return Ok(Box::new(SyntheticCamera::from_config(&self.config)));
        }
        open_device(&self.config)
    }
}

#[cfg(feature = "camera-v4l2")]
fn open_device(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Ok(Box::new(V4l2Camera::open(config)?))
}

#[cfg(not(feature = "camera-v4l2"))]
fn open_device(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Err(CameraError::DeviceUnavailable(format!(
        "{}: built without camera support (enable the camera-v4l2 feature)",
        config.device
    )))
}

/// Resolve a device string to a device node path
///
/// Bare indices map to `/dev/videoN`; anything else is used as-is.
#[must_use]
pub fn device_path(device: &str) -> String {
    device.parse::<u32>().map_or_else(
        |_| device.to_string(),
        |index| format!("/dev/video{index}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_index_maps_to_video_node() {
        assert_eq!(device_path("0"), "/dev/video0");
        assert_eq!(device_path("3"), "/dev/video3");
        assert_eq!(device_path("/dev/video1"), "/dev/video1");
    }

    #[test]
    fn stub_device_opens_synthetic_source() {
        let opener = DeviceOpener::new(CameraConfig {
            device: "stub://test".to_string(),
            ..CameraConfig::default()
        });
        let mut source = opener.open().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.image.width(), CameraConfig::default().width);
    }

    #[cfg(feature = "camera-v4l2")]
    #[test]
    fn missing_device_node_is_unavailable() {
        let opener = DeviceOpener::new(CameraConfig {
            device: "/dev/drishti-missing-video".to_string(),
            ..CameraConfig::default()
        });
        let Err(CameraError::DeviceUnavailable(message)) = opener.open() else {
            panic!("expected DeviceUnavailable");
        };
        assert!(message.starts_with("/dev/drishti-missing-video"), "{message}");
        assert!(!message.contains("built without"), "{message}");
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn real_device_unavailable_without_camera_support() {
        let opener = DeviceOpener::new(CameraConfig::default());
        assert!(matches!(
            opener.open(),
            Err(CameraError::DeviceUnavailable(_))
        ));
    }
}
