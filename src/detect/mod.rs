//! Object detection
//!
//! Detectors are synchronous and run on the frame loop's thread. Every
//! detector must drop detections below the threshold it is given.

#[cfg(feature = "detector-onnx")]
mod detr;
pub mod labels;
mod postprocess;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

#[cfg(feature = "detector-onnx")]
pub use detr::DetrDetector;
pub use postprocess::{DetrOutput, decode_detr};

/// Minimum confidence for a detection to be drawn or spoken
///
/// Deliberately high: a false positive here means the speaker says the
/// wrong word out loud.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.9;

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

/// One object found in a frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Whether this detection clears `threshold`
    #[must_use]
    pub fn meets(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// Detection errors
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Model could not be loaded or prepared
    #[error("detector model error: {0}")]
    Model(String),

    /// Inference failed for a frame
    #[error("inference failed: {0}")]
    Inference(String),

    /// Model produced output of an unexpected shape
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// Finds objects in a frame
pub trait Detector: Send + Sync {
    /// Backend identifier
    fn name(&self) -> &'static str;

    /// Run detection, returning only detections with confidence >= `threshold`
    ///
    /// # Errors
    ///
    /// Returns error if inference fails
    fn detect(&self, image: &RgbImage, threshold: f32) -> Result<Vec<Detection>, DetectionError>;
}

/// Detector that never finds anything
///
/// Used when no model is configured; the stream still flows, unannotated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn name(&self) -> &'static str {
        "null"
    }

    fn detect(&self, _image: &RgbImage, _threshold: f32) -> Result<Vec<Detection>, DetectionError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(Detection::new("cat", 0.9, bbox).meets(0.9));
        assert!(!Detection::new("cat", 0.899, bbox).meets(0.9));
    }

    #[test]
    fn null_detector_finds_nothing() {
        let image = RgbImage::new(4, 4);
        assert!(NullDetector.detect(&image, 0.0).unwrap().is_empty());
    }
}
