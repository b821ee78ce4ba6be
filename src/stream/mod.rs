//! Stream session control
//!
//! [`StreamController`] owns at most one stream session. A session holds
//! the open camera plus the announcement cooldowns, so stopping and starting
//! again begins with a clean slate. Each `video_feed` call runs a frame loop
//! on a blocking thread and hands encoded frames to the HTTP body through a
//! one-slot channel.

pub mod multipart;
mod pipeline;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::camera::{CameraError, CameraOpener, Frame, FrameSource};
use crate::voice::AnnouncementState;

pub use pipeline::{Annotation, EncodedFrame, FramePipeline};

/// Frames of one feed; ends when the loop terminates
pub type FrameStream = ReceiverStream<EncodedFrame>;

/// Snapshot of the controller's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub is_streaming: bool,
    pub camera_initialized: bool,
}

/// One start..stop lifetime of the camera
struct StreamSession {
    active: AtomicBool,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    announcements: Mutex<AnnouncementState>,
    current_feed: AtomicU64,
}

impl StreamSession {
    fn new(source: Box<dyn FrameSource>, cooldown: Duration) -> Self {
        Self {
            active: AtomicBool::new(true),
            source: Mutex::new(Some(source)),
            announcements: Mutex::new(AnnouncementState::new(cooldown)),
            current_feed: AtomicU64::new(0),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Claim the session for a new feed, superseding the previous one
    fn next_feed(&self) -> u64 {
        self.current_feed.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, feed: u64) -> bool {
        self.current_feed.load(Ordering::SeqCst) == feed
    }

    fn read_frame(&self) -> Result<Frame, CameraError> {
        let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
        source
            .as_mut()
            .ok_or(CameraError::Released)?
            .next_frame()
    }

    /// Drop the device handle, waiting out any in-flight capture
    fn release(&self) {
        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(source) = source {
            tracing::debug!(device = source.name(), "camera released");
        }
    }
}

/// Starts, stops and serves the camera stream
pub struct StreamController {
    opener: Arc<dyn CameraOpener>,
    pipeline: Arc<FramePipeline>,
    cooldown: Duration,
    session: tokio::sync::Mutex<Option<Arc<StreamSession>>>,
}

impl StreamController {
    #[must_use]
    pub fn new(
        opener: Arc<dyn CameraOpener>,
        pipeline: Arc<FramePipeline>,
        cooldown: Duration,
    ) -> Self {
        Self {
            opener,
            pipeline,
            cooldown,
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Open the camera; a no-op if already streaming
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the camera cannot be opened
    pub async fn start(&self) -> Result<(), CameraError> {
        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|s| s.is_active()) {
            tracing::debug!("stream already active");
            return Ok(());
        }

        let opener = Arc::clone(&self.opener);
        let source = tokio::task::spawn_blocking(move || opener.open())
            .await
            .map_err(|e| CameraError::DeviceUnavailable(format!("open task failed: {e}")))??;

        tracing::info!(device = source.name(), "stream started");
        *slot = Some(Arc::new(StreamSession::new(source, self.cooldown)));
        Ok(())
    }

    /// Halt any feed and release the camera; a no-op if not streaming
    ///
    /// Returns once the device handle has been dropped.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            tracing::debug!("stream already stopped");
            return;
        };

        session.active.store(false, Ordering::SeqCst);
        if let Err(e) = tokio::task::spawn_blocking(move || session.release()).await {
            tracing::warn!(error = %e, "camera release task failed");
        }

        tracing::info!("stream stopped");
    }

    pub async fn status(&self) -> StreamStatus {
        let slot = self.session.lock().await;
        StreamStatus {
            is_streaming: slot.as_ref().is_some_and(|s| s.is_active()),
            camera_initialized: slot.is_some(),
        }
    }

    /// Start a frame loop for a new consumer
    ///
    /// Returns an empty stream when not streaming. A new feed replaces any
    /// earlier one; the earlier loop exits before its next capture.
    pub async fn video_feed(&self) -> FrameStream {
        let (tx, rx) = mpsc::channel(1);

        let session = self.session.lock().await.clone();
        let Some(session) = session.filter(|s| s.is_active()) else {
            tracing::debug!("video feed requested while inactive");
            return ReceiverStream::new(rx);
        };

        let feed = session.next_feed();
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || run_feed(&session, feed, &pipeline, &tx));

        ReceiverStream::new(rx)
    }

    /// Release everything on process exit
    pub async fn shutdown(&self) {
        self.stop().await;
    }
}

fn run_feed(
    session: &StreamSession,
    feed: u64,
    pipeline: &FramePipeline,
    tx: &mpsc::Sender<EncodedFrame>,
) {
    tracing::info!(feed, "feed started");
    let mut delivered: u64 = 0;

    loop {
        if !session.is_active() {
            tracing::info!(feed, "stream stopped, ending feed");
            break;
        }
        if !session.is_current(feed) {
            tracing::info!(feed, "feed superseded");
            break;
        }

        let frame = match session.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::info!(feed, error = %e, "camera read ended, ending feed");
                break;
            }
        };

        let seq = frame.seq;
        let encoded = match pipeline.process(frame, &session.announcements) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(feed, seq, error = %e, "frame skipped");
                continue;
            }
        };

        if tx.blocking_send(encoded).is_err() {
            tracing::info!(feed, "feed consumer disconnected");
            break;
        }
        delivered += 1;
    }

    tracing::info!(feed, delivered, "feed ended");
}
