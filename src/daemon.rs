//! Daemon - builds the pipeline from config and serves it until interrupted

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::api::ApiServer;
use crate::camera::DeviceOpener;
use crate::config::{DetectorConfig, TranslationConfig, VoiceConfig};
use crate::detect::{Detector, NullDetector};
use crate::render::Renderer;
use crate::stream::{FramePipeline, StreamController};
use crate::translate::{CachedTranslator, GoogleTranslator, IdentityTranslator, Translator};
use crate::voice::{Announcer, LogSpeaker, Speaker, SynthesizedSpeaker, TextToSpeech};
use crate::{Config, Error, Result};

/// Source language of detector labels; translating into it is a no-op
const LABEL_LANGUAGE: &str = "en";

/// The Drishti daemon - owns the stream controller and HTTP server
pub struct Daemon {
    config: Config,
    controller: Arc<StreamController>,
}

impl Daemon {
    /// Wire up every component described by `config`
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the model, font or translator cannot be set up
    pub fn new(config: Config) -> Result<Self> {
        let detector = build_detector(&config.detector)?;
        let translator = build_translator(&config.translation)?;
        let speaker = build_speaker(&config.voice);
        let renderer = Arc::new(Renderer::new(&config.render)?);

        let announcer = Announcer::spawn(
            speaker,
            config.voice.phrase.clone(),
            config.voice.workers,
            config.voice.queue_capacity,
        );

        let pipeline = Arc::new(FramePipeline::new(
            detector,
            translator,
            Arc::new(announcer),
            renderer,
            config.stream.confidence_threshold,
        ));

        let controller = Arc::new(StreamController::new(
            Arc::new(DeviceOpener::new(config.camera.clone())),
            pipeline,
            config.stream.cooldown,
        ));

        Ok(Self { config, controller })
    }

    #[must_use]
    pub fn controller(&self) -> Arc<StreamController> {
        Arc::clone(&self.controller)
    }

    /// Serve until ctrl-c, then release the camera and drain the server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = ApiServer::new(
            Arc::clone(&self.controller),
            self.config.server.host.clone(),
            self.config.server.port,
        )
        .spawn(async move {
            let _ = shutdown_rx.await;
        });

        tracing::info!(
            port = self.config.server.port,
            camera = %self.config.camera.device,
            "drishti ready"
        );

        tokio::select! {
            joined = &mut server => {
                self.controller.shutdown().await;
                return joined.map_err(|e| Error::Server(format!("server task failed: {e}")))?;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for ctrl-c");
                }
                tracing::info!("shutdown requested");
            }
        }

        // Ending the stream closes open feeds so the server can drain
        self.controller.shutdown().await;
        let _ = shutdown_tx.send(());

        server
            .await
            .map_err(|e| Error::Server(format!("server task failed: {e}")))?
    }
}

/// Choose the detector backend for `config`
///
/// # Errors
///
/// Returns error if a configured model or labels file cannot be loaded
pub fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn Detector>> {
    let Some(model_path) = config.model_path.as_deref() else {
        tracing::warn!("no detection model configured, frames will stream unannotated");
        return Ok(Arc::new(NullDetector));
    };

    load_detector(model_path, config)
}

#[cfg(feature = "detector-onnx")]
fn load_detector(
    model_path: &std::path::Path,
    config: &DetectorConfig,
) -> Result<Arc<dyn Detector>> {
    use crate::detect::{DetrDetector, labels};

    let labels = match config.labels_path.as_deref() {
        Some(path) => labels::load(path)?,
        None => labels::coco(),
    };

    let detector = DetrDetector::load(
        model_path,
        labels,
        config.input_width,
        config.input_height,
    )?;
    tracing::info!(model = %model_path.display(), "detector loaded");
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "detector-onnx"))]
fn load_detector(
    model_path: &std::path::Path,
    _config: &DetectorConfig,
) -> Result<Arc<dyn Detector>> {
    Err(Error::Config(format!(
        "{}: built without model support (enable the detector-onnx feature)",
        model_path.display()
    )))
}

/// Choose the label translator for `config`
///
/// # Errors
///
/// Returns error if called outside a tokio runtime or the client cannot be built
pub fn build_translator(config: &TranslationConfig) -> Result<Arc<dyn Translator>> {
    if !config.enabled || config.target_language == LABEL_LANGUAGE {
        tracing::info!("label translation disabled");
        return Ok(Arc::new(IdentityTranslator));
    }

    let runtime = Handle::try_current()
        .map_err(|e| Error::Config(format!("translator needs a tokio runtime: {e}")))?;
    let google = GoogleTranslator::new(runtime, &config.target_language, config.timeout)?;

    tracing::info!(
        target = %config.target_language,
        cache = config.cache_capacity,
        "label translation enabled"
    );
    Ok(Arc::new(CachedTranslator::new(
        Arc::new(google),
        config.cache_capacity,
    )))
}

/// Choose how announcements are voiced
///
/// A misconfigured synthesizer degrades to logging rather than failing startup.
#[must_use]
pub fn build_speaker(config: &VoiceConfig) -> Arc<dyn Speaker> {
    if !config.enabled {
        tracing::info!("voice disabled, announcements will be logged");
        return Arc::new(LogSpeaker);
    }

    match TextToSpeech::from_config(config) {
        Ok(tts) => {
            tracing::info!(provider = ?config.provider, "voice announcements enabled");
            Arc::new(SynthesizedSpeaker::new(Arc::new(tts)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "TTS unavailable, announcements will be logged");
            Arc::new(LogSpeaker)
        }
    }
}
