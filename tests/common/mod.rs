//! Shared test utilities
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drishti::camera::{CameraError, CameraOpener, Frame, FrameSource, SyntheticCamera};
use drishti::config::RenderConfig;
use drishti::detect::{BoundingBox, Detection, DetectionError, Detector};
use drishti::render::Renderer;
use drishti::translate::{TranslationError, Translator};
use drishti::voice::AnnounceSink;
use drishti::{FramePipeline, StreamController};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;
pub const COOLDOWN: Duration = Duration::from_secs(5);
pub const THRESHOLD: f32 = 0.9;

pub fn detection(label: &str, confidence: f32) -> Detection {
    Detection::new(label, confidence, BoundingBox::new(4.0, 12.0, 40.0, 40.0))
}

/// Returns the same detections for every frame, optionally failing some calls
#[derive(Default)]
pub struct ScriptedDetector {
    detections: Vec<Detection>,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            ..Self::default()
        }
    }

    /// Fail the `call`-th invocation (1-based)
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(
        &self,
        _image: &image::RgbImage,
        _threshold: f32,
    ) -> Result<Vec<Detection>, DetectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(DetectionError::Inference(format!("scripted failure on call {call}")));
        }
        // Threshold filtering is left to the pipeline so it can be observed
        Ok(self.detections.clone())
    }
}

/// Fixed dictionary; unknown words pass through
pub struct DictionaryTranslator(HashMap<String, String>);

impl DictionaryTranslator {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }
}

impl Translator for DictionaryTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslationError> {
        Ok(self.0.get(text).cloned().unwrap_or_else(|| text.to_string()))
    }
}

/// Always fails, like an unreachable translation service
pub struct OfflineTranslator;

impl Translator for OfflineTranslator {
    fn translate(&self, _text: &str) -> Result<String, TranslationError> {
        Err(TranslationError::Request("network unreachable".to_string()))
    }
}

/// Records announced text in order
#[derive(Default)]
pub struct RecordingSink {
    announced: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn announced(&self) -> Vec<String> {
        self.announced.lock().unwrap().clone()
    }
}

impl AnnounceSink for RecordingSink {
    fn announce(&self, text: &str) {
        self.announced.lock().unwrap().push(text.to_string());
    }
}

/// Synthetic source that flags when it is dropped
pub struct TrackedSource {
    inner: SyntheticCamera,
    released: Arc<AtomicBool>,
}

impl FrameSource for TrackedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        self.inner.next_frame()
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Opens tracked synthetic cameras, or fails if unavailable
#[derive(Default)]
pub struct TestOpener {
    frame_limit: Option<u64>,
    unavailable: bool,
    opens: AtomicUsize,
    released: Arc<AtomicBool>,
}

impl TestOpener {
    pub fn endless() -> Self {
        Self::default()
    }

    pub fn with_frames(limit: u64) -> Self {
        Self {
            frame_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Whether the most recently opened source has been dropped
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl CameraOpener for TestOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        if self.unavailable {
            return Err(CameraError::DeviceUnavailable("no camera attached".to_string()));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);

        let camera = SyntheticCamera::new("test", FRAME_WIDTH, FRAME_HEIGHT);
        let inner = match self.frame_limit {
            Some(limit) => camera.with_frame_limit(limit),
            None => camera,
        };
        Ok(Box::new(TrackedSource {
            inner,
            released: Arc::clone(&self.released),
        }))
    }
}

pub fn pipeline(
    detector: Arc<dyn Detector>,
    translator: Arc<dyn Translator>,
    sink: Arc<dyn AnnounceSink>,
) -> FramePipeline {
    let renderer = Renderer::new(&RenderConfig::default()).expect("default renderer");
    FramePipeline::new(detector, translator, sink, Arc::new(renderer), THRESHOLD)
}

/// Controller over `opener` with a pipeline that detects nothing
pub fn quiet_controller(opener: Arc<TestOpener>) -> StreamController {
    let pipeline = pipeline(
        Arc::new(ScriptedDetector::default()),
        Arc::new(DictionaryTranslator::new(&[])),
        Arc::new(RecordingSink::default()),
    );
    StreamController::new(opener, Arc::new(pipeline), COOLDOWN)
}

pub fn frame(seq: u64) -> Frame {
    Frame {
        seq,
        image: image::RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT),
    }
}
