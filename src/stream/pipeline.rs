//! Per-frame detect, localize, announce, render

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::Result;
use crate::camera::Frame;
use crate::detect::{BoundingBox, Detector};
use crate::render::Renderer;
use crate::translate::{Translator, localize};
use crate::voice::{AnnounceSink, AnnouncementState};

/// What was drawn for one detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Detector label, as used for cooldown
    pub label: String,

    /// Localized label, as drawn and announced
    pub text: String,

    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// An annotated frame ready for the feed
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub seq: u64,
    pub jpeg: Vec<u8>,
    pub annotations: Vec<Annotation>,
}

/// The per-frame work of a feed
pub struct FramePipeline {
    detector: Arc<dyn Detector>,
    translator: Arc<dyn Translator>,
    announcer: Arc<dyn AnnounceSink>,
    renderer: Arc<Renderer>,
    threshold: f32,
}

impl FramePipeline {
    #[must_use]
    pub fn new(
        detector: Arc<dyn Detector>,
        translator: Arc<dyn Translator>,
        announcer: Arc<dyn AnnounceSink>,
        renderer: Arc<Renderer>,
        threshold: f32,
    ) -> Self {
        Self {
            detector,
            translator,
            announcer,
            renderer,
            threshold,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Process one frame using the current time for cooldowns
    ///
    /// # Errors
    ///
    /// Returns error if detection or encoding fails; the frame should be skipped
    pub fn process(
        &self,
        frame: Frame,
        announcements: &Mutex<AnnouncementState>,
    ) -> Result<EncodedFrame> {
        self.process_at(frame, announcements, Instant::now())
    }

    /// Process one frame as if observed at `now`
    ///
    /// Every detection at or above the threshold is localized and drawn.
    /// Announcement is gated per original label by `announcements`.
    ///
    /// # Errors
    ///
    /// Returns error if detection or encoding fails
    pub fn process_at(
        &self,
        frame: Frame,
        announcements: &Mutex<AnnouncementState>,
        now: Instant,
    ) -> Result<EncodedFrame> {
        let Frame { seq, mut image } = frame;

        let detections = self.detector.detect(&image, self.threshold)?;
        let mut annotations = Vec::with_capacity(detections.len());

        for detection in detections
            .into_iter()
            .filter(|d| d.meets(self.threshold))
        {
            let text = localize(self.translator.as_ref(), &detection.label);

            let due = announcements
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .should_announce(&detection.label, now);
            if due {
                tracing::debug!(seq, label = %detection.label, text = %text, "announcing");
                self.announcer.announce(&text);
            }

            self.renderer.draw(&mut image, &detection.bbox, &text, &detection.label);
            annotations.push(Annotation {
                label: detection.label,
                text,
                confidence: detection.confidence,
                bbox: detection.bbox,
            });
        }

        let jpeg = self.renderer.encode(&image)?;
        tracing::trace!(
            seq,
            detections = annotations.len(),
            bytes = jpeg.len(),
            "frame processed"
        );

        Ok(EncodedFrame {
            seq,
            jpeg,
            annotations,
        })
    }
}
