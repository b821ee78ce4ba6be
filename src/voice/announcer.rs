//! Background announcement workers
//!
//! The frame loop hands labels to an [`AnnounceSink`] and moves on. The
//! [`Announcer`] queues them and a small pool of tokio tasks speaks them,
//! so synthesis and playback never stall frame delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use super::{AudioPlayback, SpeechError, SpeechSynthesizer};

/// Placeholder replaced by the localized label in a phrase template
const LABEL_PLACEHOLDER: &str = "{label}";

/// Receives labels to announce; must not block
pub trait AnnounceSink: Send + Sync {
    fn announce(&self, text: &str);
}

/// Speaks one phrase to completion
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, phrase: &str) -> Result<(), SpeechError>;
}

/// Synthesizes a phrase and plays it on the default output device
pub struct SynthesizedSpeaker {
    tts: Arc<dyn SpeechSynthesizer>,
}

impl SynthesizedSpeaker {
    #[must_use]
    pub fn new(tts: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { tts }
    }
}

#[async_trait]
impl Speaker for SynthesizedSpeaker {
    async fn speak(&self, phrase: &str) -> Result<(), SpeechError> {
        let mp3 = self.tts.synthesize(phrase).await?;
        tracing::debug!(bytes = mp3.len(), "speech synthesized");

        tokio::task::spawn_blocking(move || -> Result<(), SpeechError> {
            AudioPlayback::new()?.play_mp3(&mp3)
        })
        .await
        .map_err(|e| SpeechError::Audio(format!("playback task failed: {e}")))?
    }
}

/// Logs phrases instead of speaking them (voice disabled)
pub struct LogSpeaker;

#[async_trait]
impl Speaker for LogSpeaker {
    async fn speak(&self, phrase: &str) -> Result<(), SpeechError> {
        tracing::info!(phrase, "announcement (voice disabled)");
        Ok(())
    }
}

/// Bounded announcement queue drained by worker tasks
///
/// When the queue is full new announcements are dropped, not delayed.
/// Workers exit once every `Announcer` handle is dropped.
#[derive(Clone)]
pub struct Announcer {
    tx: mpsc::Sender<String>,
}

impl Announcer {
    /// Start `workers` tasks speaking through `speaker`
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        speaker: Arc<dyn Speaker>,
        phrase_template: impl Into<String>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let template: Arc<str> = phrase_template.into().into();

        for id in 0..workers.max(1) {
            tokio::spawn(run_worker(
                id,
                Arc::clone(&rx),
                Arc::clone(&speaker),
                Arc::clone(&template),
            ));
        }

        Self { tx }
    }

    /// Queue `text`, returning false if it was dropped
    pub fn try_announce(&self, text: &str) -> bool {
        match self.tx.try_send(text.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(text)) => {
                tracing::warn!(text = %text, "announcement queue full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(text)) => {
                tracing::warn!(text = %text, "announcement workers gone, dropping");
                false
            }
        }
    }
}

impl AnnounceSink for Announcer {
    fn announce(&self, text: &str) {
        self.try_announce(text);
    }
}

async fn run_worker(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    speaker: Arc<dyn Speaker>,
    template: Arc<str>,
) {
    tracing::debug!(worker = id, "announcement worker started");

    loop {
        let next = rx.lock().await.recv().await;
        let Some(text) = next else {
            break;
        };

        let phrase = format_phrase(&template, &text);
        match speaker.speak(&phrase).await {
            Ok(()) => tracing::debug!(worker = id, phrase = %phrase, "announced"),
            Err(e) => tracing::warn!(worker = id, error = %e, "announcement failed"),
        }
    }

    tracing::debug!(worker = id, "announcement worker stopped");
}

/// Fill `template` with `label`
///
/// A template without a `{label}` placeholder gets the label appended.
#[must_use]
pub fn format_phrase(template: &str, label: &str) -> String {
    if template.contains(LABEL_PLACEHOLDER) {
        template.replace(LABEL_PLACEHOLDER, label)
    } else {
        format!("{} {label}", template.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Forwards spoken phrases to the test
    struct ChannelSpeaker(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl Speaker for ChannelSpeaker {
        async fn speak(&self, phrase: &str) -> Result<(), SpeechError> {
            let _ = self.0.send(phrase.to_string());
            Ok(())
        }
    }

    struct FailingSpeaker;

    #[async_trait]
    impl Speaker for FailingSpeaker {
        async fn speak(&self, _phrase: &str) -> Result<(), SpeechError> {
            Err(SpeechError::Synthesis("offline".to_string()))
        }
    }

    async fn next_phrase(rx: &mut mpsc::UnboundedReceiver<String>) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[test]
    fn phrase_substitutes_label() {
        assert_eq!(format_phrase("Yaha hai {label}", "बिल्ली"), "Yaha hai बिल्ली");
        assert_eq!(format_phrase("Here is", "cat"), "Here is cat");
    }

    #[tokio::test]
    async fn worker_speaks_formatted_phrase() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let announcer = Announcer::spawn(Arc::new(ChannelSpeaker(tx)), "Yaha hai {label}", 1, 8);

        announcer.announce("कुत्ता");
        assert_eq!(next_phrase(&mut rx).await.as_deref(), Some("Yaha hai कुत्ता"));
    }

    #[tokio::test]
    async fn full_queue_drops_announcements() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let announcer = Announcer::spawn(Arc::new(ChannelSpeaker(tx)), "{label}", 1, 1);

        // Current-thread runtime: the worker cannot drain between these sends
        assert!(announcer.try_announce("cat"));
        assert!(!announcer.try_announce("dog"));
        assert!(!announcer.try_announce("bus"));

        assert_eq!(next_phrase(&mut rx).await.as_deref(), Some("cat"));

        assert!(announcer.try_announce("car"));
        assert_eq!(next_phrase(&mut rx).await.as_deref(), Some("car"));
    }

    #[tokio::test]
    async fn failed_speech_keeps_worker_alive() {
        let announcer = Announcer::spawn(Arc::new(FailingSpeaker), "{label}", 1, 4);
        announcer.announce("cat");
        tokio::task::yield_now().await;
        assert!(announcer.try_announce("dog"));
    }
}
