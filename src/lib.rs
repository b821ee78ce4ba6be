//! Drishti - live object detection stream with spoken, translated labels
//!
//! Frames from a camera run through an object detector; every confident
//! detection is boxed and labelled in the target language, newly seen
//! objects are announced aloud, and the annotated frames are served as an
//! MJPEG stream over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌─────────────┐
//! │  Camera  │──▶│ Detector │──▶│ Translator │──▶│ Renderer │──▶│ /video_feed │
//! └──────────┘   └──────────┘   └─────┬──────┘   └──────────┘   └─────────────┘
//!                                     │ cooldown
//!                               ┌─────▼──────┐
//!                               │ Announcer  │──▶ TTS ──▶ speakers
//!                               └────────────┘
//! ```

pub mod api;
pub mod camera;
pub mod config;
pub mod daemon;
pub mod detect;
pub mod error;
pub mod render;
pub mod stream;
pub mod translate;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use stream::{EncodedFrame, FramePipeline, StreamController, StreamStatus};
