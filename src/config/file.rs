//! TOML configuration file loading
//!
//! Supports `~/.config/drishti/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DrishtiConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Camera configuration
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Detector configuration
    #[serde(default)]
    pub detector: DetectorFileConfig,

    /// Stream pipeline configuration
    #[serde(default)]
    pub stream: StreamFileConfig,

    /// Translation configuration
    #[serde(default)]
    pub translation: TranslationFileConfig,

    /// Voice announcement configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Frame rendering configuration
    #[serde(default)]
    pub render: RenderFileConfig,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP listener port
    pub port: Option<u16>,

    /// Bind address (e.g. "0.0.0.0")
    pub host: Option<String>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Device index, device node, or `stub://name`
    pub device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
}

/// Detector configuration
#[derive(Debug, Default, Deserialize)]
pub struct DetectorFileConfig {
    /// Path to a DETR ONNX export
    pub model: Option<PathBuf>,

    /// Path to a labels file (one label per line)
    pub labels: Option<PathBuf>,

    pub input_width: Option<u32>,
    pub input_height: Option<u32>,
}

/// Stream pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct StreamFileConfig {
    /// Minimum detection confidence (0.0 to 1.0)
    pub confidence_threshold: Option<f32>,

    /// Seconds before the same label may be announced again
    pub cooldown_secs: Option<f64>,
}

/// Translation configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranslationFileConfig {
    pub enabled: Option<bool>,

    /// Target language code (e.g. "hi")
    pub target_language: Option<String>,

    pub cache_capacity: Option<usize>,
    pub timeout_ms: Option<u64>,
}

/// Voice announcement configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub enabled: Option<bool>,

    /// "google" or "openai"
    pub provider: Option<String>,

    /// Speech language code for Google TTS
    pub language: Option<String>,

    /// Spoken phrase, `{label}` is replaced by the translated label
    pub phrase: Option<String>,

    /// `OpenAI` TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// `OpenAI` TTS voice (e.g. "alloy")
    pub tts_voice: Option<String>,

    pub tts_speed: Option<f32>,

    /// Concurrent announcement workers
    pub workers: Option<usize>,

    /// Pending announcements before new ones are dropped
    pub queue_capacity: Option<usize>,
}

/// Rendering configuration
#[derive(Debug, Default, Deserialize)]
pub struct RenderFileConfig {
    /// TrueType/OpenType font for labels
    pub font: Option<PathBuf>,
    pub font_size: Option<f32>,
    pub box_thickness: Option<u32>,
    pub jpeg_quality: Option<u8>,
}

/// Default config file location
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("drishti").join("config.toml"))
}

/// Load the config file from `path`, or the default location
///
/// Missing or unparsable files yield defaults.
#[must_use]
pub fn load_config_file(path: Option<&Path>) -> DrishtiConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return DrishtiConfigFile::default();
    };

    if !path.exists() {
        return DrishtiConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            DrishtiConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns `Io` if the file cannot be read and `Toml` if it does not parse
pub fn read_config_file(path: &Path) -> Result<DrishtiConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[voice]\nphrase = \"This is {{label}}\"\n"
        )
        .unwrap();

        let fc = load_config_file(Some(file.path()));
        assert_eq!(fc.server.port, Some(9000));
        assert_eq!(fc.voice.phrase.as_deref(), Some("This is {label}"));
        assert!(fc.camera.device.is_none());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let fc = load_config_file(Some(file.path()));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn read_errors_are_typed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[camera]\ndevice = ").unwrap();

        assert!(matches!(read_config_file(file.path()), Err(crate::Error::Toml(_))));
        assert!(matches!(
            read_config_file(Path::new("/nonexistent/drishti.toml")),
            Err(crate::Error::Io(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let fc = load_config_file(Some(Path::new("/nonexistent/drishti.toml")));
        assert!(fc.server.port.is_none());
    }
}
