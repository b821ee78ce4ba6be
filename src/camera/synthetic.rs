//! Synthetic frame source for `stub://` devices

use image::{Rgb, RgbImage};

use super::{CameraError, Frame, FrameSource, STUB_PREFIX};
use crate::config::CameraConfig;

/// Generates a moving gradient pattern
///
/// Always opens. Ends with `FrameRead` after `max_frames` when a limit is set
/// (`stub://name?frames=N`), which mimics a camera being unplugged.
#[derive(Debug)]
pub struct SyntheticCamera {
    name: String,
    width: u32,
    height: u32,
    frame_count: u64,
    max_frames: Option<u64>,
}

impl SyntheticCamera {
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            frame_count: 0,
            max_frames: None,
        }
    }

    /// Stop producing frames after `limit` frames
    #[must_use]
    pub const fn with_frame_limit(mut self, limit: u64) -> Self {
        self.max_frames = Some(limit);
        self
    }

    /// Build from a `stub://` device string
    #[must_use]
    pub fn from_config(config: &CameraConfig) -> Self {
        let target = config
            .device
            .strip_prefix(STUB_PREFIX)
            .unwrap_or(&config.device);
        let (name, query) = target.split_once('?').unwrap_or((target, ""));

        let camera = Self::new(name, config.width, config.height);
        let limit = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "frames")
            .and_then(|(_, value)| value.parse().ok());

        tracing::info!(device = %config.device, ?limit, "synthetic camera opened");

        match limit {
            Some(limit) => camera.with_frame_limit(limit),
            None => camera,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn pattern(&self) -> RgbImage {
        let shift = self.frame_count as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        })
    }
}

impl FrameSource for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        if self.max_frames.is_some_and(|max| self.frame_count >= max) {
            return Err(CameraError::FrameRead(format!(
                "{}: end of synthetic stream",
                self.name
            )));
        }

        self.frame_count += 1;
        Ok(Frame {
            seq: self.frame_count,
            image: self.pattern(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_numbered_in_capture_order() {
        let mut camera = SyntheticCamera::new("test", 8, 6);
        let seqs: Vec<u64> = (0..5).map(|_| camera.next_frame().unwrap().seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn frame_limit_ends_stream() {
        let mut camera = SyntheticCamera::new("test", 4, 4).with_frame_limit(2);
        assert!(camera.next_frame().is_ok());
        assert!(camera.next_frame().is_ok());
        assert!(matches!(
            camera.next_frame(),
            Err(CameraError::FrameRead(_))
        ));
    }

    #[test]
    fn limit_parsed_from_device_string() {
        let config = CameraConfig {
            device: "stub://lab?frames=1".to_string(),
            width: 4,
            height: 4,
            ..CameraConfig::default()
        };
        let mut camera = SyntheticCamera::from_config(&config);
        assert_eq!(camera.name(), "lab");
        assert!(camera.next_frame().is_ok());
        assert!(camera.next_frame().is_err());
    }
}
