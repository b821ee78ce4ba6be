//! Configuration management for Drishti

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::{Error, Result};

use file::DrishtiConfigFile;

/// Default HTTP port when neither `PORT` nor the config file set one
pub const DEFAULT_PORT: u16 = 8000;

/// Default announcement cooldown per label
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Drishti configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Camera configuration
    pub camera: CameraConfig,

    /// Detector configuration
    pub detector: DetectorConfig,

    /// Stream pipeline configuration
    pub stream: StreamConfig,

    /// Translation configuration
    pub translation: TranslationConfig,

    /// Voice announcement configuration
    pub voice: VoiceConfig,

    /// Frame rendering configuration
    pub render: RenderConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Bind address
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Device index (`0` is the platform default camera), node path, or `stub://name`
    pub device: String,

    /// Preferred frame width
    pub width: u32,

    /// Preferred frame height
    pub height: u32,

    /// Preferred frame rate (0 leaves the driver default)
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "0".to_string(),
            width: 640,
            height: 480,
            fps: 15,
        }
    }
}

/// Detector configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// DETR ONNX model; without one, frames stream unannotated
    pub model_path: Option<PathBuf>,

    /// Labels file overriding the built-in COCO table
    pub labels_path: Option<PathBuf>,

    /// Model input width
    pub input_width: u32,

    /// Model input height
    pub input_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            labels_path: None,
            input_width: 800,
            input_height: 600,
        }
    }
}

/// Stream pipeline configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Minimum confidence for a detection to be drawn or spoken
    pub confidence_threshold: f32,

    /// Minimum time between two announcements of the same label
    pub cooldown: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Translation configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Translate labels at all
    pub enabled: bool,

    /// Target language code
    pub target_language: String,

    /// LRU capacity for translated labels
    pub cache_capacity: usize,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_language: "hi".to_string(),
            cache_capacity: 256,
            timeout: Duration::from_secs(3),
        }
    }
}

/// Speech synthesis backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtsProvider {
    /// Public Google Translate TTS endpoint
    #[default]
    Google,
    /// `OpenAI` `/v1/audio/speech`
    OpenAi,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Voice announcement configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speak announcements (disabled on headless servers)
    pub enabled: bool,

    /// Speech synthesis backend
    pub provider: TtsProvider,

    /// Speech language code (Google TTS)
    pub language: String,

    /// Spoken phrase; `{label}` is replaced by the translated label
    pub phrase: String,

    /// `OpenAI` API key (from `OPENAI_API_KEY`)
    pub openai_api_key: Option<String>,

    /// `OpenAI` TTS model
    pub tts_model: String,

    /// `OpenAI` TTS voice
    pub tts_voice: String,

    /// `OpenAI` TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Concurrent announcement workers
    pub workers: usize,

    /// Pending announcements before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: TtsProvider::Google,
            language: "hi".to_string(),
            phrase: "Yaha hai {label}".to_string(),
            openai_api_key: None,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            workers: 1,
            queue_capacity: 8,
        }
    }
}

/// Frame rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Label font, tried before any system Devanagari font and the bundled one
    pub font_path: Option<PathBuf>,

    /// Label height in pixels
    pub font_size: f32,

    /// Box outline width in pixels
    pub box_thickness: u32,

    /// JPEG quality (1 to 100)
    pub jpeg_quality: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 18.0,
            box_thickness: 2,
            jpeg_quality: 80,
        }
    }
}

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path
    pub config_path: Option<PathBuf>,

    /// Port from `--port` / `PORT`
    pub port: Option<u16>,

    /// Force voice off
    pub disable_voice: bool,
}

impl Config {
    /// Load configuration from the default file location and environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(&LoadOptions::default())
    }

    /// Load configuration with command-line overrides
    ///
    /// Precedence: options > env > TOML > default.
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn load_with_options(options: &LoadOptions) -> Result<Self> {
        let fc = file::load_config_file(options.config_path.as_deref());
        Self::resolve(fc, &|key: &str| std::env::var(key).ok(), options)
    }

    /// Merge a parsed config file, an environment lookup, and overrides
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn resolve(
        fc: DrishtiConfigFile,
        env: &dyn Fn(&str) -> Option<String>,
        options: &LoadOptions,
    ) -> Result<Self> {
        let env_parse = |key: &str| -> Result<Option<u16>> {
            env(key)
                .map(|v| {
                    v.parse().map_err(|_| {
                        Error::Config(format!("{key} must be a port number, got {v:?}"))
                    })
                })
                .transpose()
        };

        let defaults = Self::default();

        let server = ServerConfig {
            port: options
                .port
                .or(env_parse("PORT")?)
                .or(fc.server.port)
                .unwrap_or(defaults.server.port),
            host: env("DRISHTI_HOST")
                .or(fc.server.host)
                .unwrap_or(defaults.server.host),
        };

        let camera = CameraConfig {
            device: env("DRISHTI_CAMERA")
                .or(fc.camera.device)
                .unwrap_or(defaults.camera.device),
            width: fc.camera.width.unwrap_or(defaults.camera.width),
            height: fc.camera.height.unwrap_or(defaults.camera.height),
            fps: fc.camera.fps.unwrap_or(defaults.camera.fps),
        };

        let detector = DetectorConfig {
            model_path: env("DRISHTI_MODEL").map(PathBuf::from).or(fc.detector.model),
            labels_path: env("DRISHTI_LABELS").map(PathBuf::from).or(fc.detector.labels),
            input_width: fc.detector.input_width.unwrap_or(defaults.detector.input_width),
            input_height: fc.detector.input_height.unwrap_or(defaults.detector.input_height),
        };

        let confidence_threshold = fc
            .stream
            .confidence_threshold
            .unwrap_or(defaults.stream.confidence_threshold);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold must be within 0..=1, got {confidence_threshold}"
            )));
        }
        let cooldown = match fc.stream.cooldown_secs {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|e| Error::Config(format!("invalid cooldown_secs {secs}: {e}")))?,
            None => defaults.stream.cooldown,
        };
        let stream = StreamConfig {
            confidence_threshold,
            cooldown,
        };

        let translation = TranslationConfig {
            enabled: fc.translation.enabled.unwrap_or(defaults.translation.enabled),
            target_language: env("DRISHTI_TARGET_LANG")
                .or(fc.translation.target_language)
                .unwrap_or(defaults.translation.target_language),
            cache_capacity: fc
                .translation
                .cache_capacity
                .unwrap_or(defaults.translation.cache_capacity),
            timeout: fc
                .translation
                .timeout_ms
                .map_or(defaults.translation.timeout, Duration::from_millis),
        };

        let provider = match env("DRISHTI_TTS_PROVIDER").or(fc.voice.provider) {
            Some(p) => p.parse()?,
            None => defaults.voice.provider,
        };
        let voice = VoiceConfig {
            enabled: !options.disable_voice
                && fc.voice.enabled.unwrap_or(defaults.voice.enabled),
            provider,
            language: fc
                .voice
                .language
                .unwrap_or_else(|| translation.target_language.clone()),
            phrase: fc.voice.phrase.unwrap_or(defaults.voice.phrase),
            openai_api_key: env("OPENAI_API_KEY"),
            tts_model: fc.voice.tts_model.unwrap_or(defaults.voice.tts_model),
            tts_voice: fc.voice.tts_voice.unwrap_or(defaults.voice.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed),
            workers: fc.voice.workers.unwrap_or(defaults.voice.workers).max(1),
            queue_capacity: fc
                .voice
                .queue_capacity
                .unwrap_or(defaults.voice.queue_capacity)
                .max(1),
        };

        if options.disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        let render = RenderConfig {
            font_path: env("DRISHTI_FONT").map(PathBuf::from).or(fc.render.font),
            font_size: fc.render.font_size.unwrap_or(defaults.render.font_size),
            box_thickness: fc.render.box_thickness.unwrap_or(defaults.render.box_thickness),
            jpeg_quality: fc.render.jpeg_quality.unwrap_or(defaults.render.jpeg_quality),
        };

        Ok(Self {
            server,
            camera,
            detector,
            stream,
            translation,
            voice,
            render,
        })
    }
}
