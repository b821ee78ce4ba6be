//! Voice announcements
//!
//! Cooldown bookkeeping decides *whether* a label is spoken; the
//! [`Announcer`] worker pool does the speaking, off the frame loop.

mod announcer;
mod cooldown;
mod playback;
mod tts;

use thiserror::Error;

pub use announcer::{
    AnnounceSink, Announcer, LogSpeaker, Speaker, SynthesizedSpeaker, format_phrase,
};
pub use cooldown::AnnouncementState;
pub use playback::AudioPlayback;
pub use tts::{SpeechSynthesizer, TextToSpeech};

/// Speech errors
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Synthesizer misconfigured (e.g. missing API key)
    #[error("TTS configuration error: {0}")]
    Config(String),

    /// Text-to-speech request failed
    #[error("TTS error: {0}")]
    Synthesis(String),

    /// Audio decoding or playback failed
    #[error("audio error: {0}")]
    Audio(String),
}
