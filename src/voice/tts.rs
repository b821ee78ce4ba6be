//! Text-to-speech (TTS) synthesis

use std::time::Duration;

use async_trait::async_trait;

use super::SpeechError;
use crate::config::{TtsProvider, VoiceConfig};

/// Google's unofficial TTS endpoint rejects longer queries
const GOOGLE_MAX_CHARS: usize = 200;

const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";
const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Turns a phrase into MP3 audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, returning MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

/// TTS backend selection
#[derive(Clone, Debug)]
enum Backend {
    Google {
        language: String,
    },
    OpenAi {
        api_key: String,
        model: String,
        voice: String,
        speed: f32,
    },
}

/// Synthesizes speech over HTTP
pub struct TextToSpeech {
    client: reqwest::Client,
    backend: Backend,
}

impl TextToSpeech {
    /// Google Translate speech in `language` (no key required)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_google(language: impl Into<String>) -> Result<Self, SpeechError> {
        Ok(Self {
            client: build_client()?,
            backend: Backend::Google {
                language: language.into(),
            },
        })
    }

    /// `OpenAI` speech API
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new_openai(
        api_key: String,
        model: String,
        voice: String,
        speed: f32,
    ) -> Result<Self, SpeechError> {
        if api_key.is_empty() {
            return Err(SpeechError::Config(
                "OpenAI API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: build_client()?,
            backend: Backend::OpenAi {
                api_key,
                model,
                voice,
                speed,
            },
        })
    }

    /// Build the synthesizer selected by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider is misconfigured
    pub fn from_config(config: &VoiceConfig) -> Result<Self, SpeechError> {
        match config.provider {
            TtsProvider::Google => Self::new_google(config.language.clone()),
            TtsProvider::OpenAi => Self::new_openai(
                config.openai_api_key.clone().unwrap_or_default(),
                config.tts_model.clone(),
                config.tts_voice.clone(),
                config.tts_speed,
            ),
        }
    }

    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>, SpeechError> {
        let text = truncate_chars(text, GOOGLE_MAX_CHARS);
        let url = google_tts_url(text, language);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SpeechError::Synthesis(format!("Google TTS error {status}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }

    async fn synthesize_openai(
        &self,
        text: &str,
        api_key: &str,
        model: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<u8>, SpeechError> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model,
            input: text,
            voice,
            speed,
        };

        let response = self
            .client
            .post(OPENAI_TTS_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis(format!(
                "OpenAI TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        match &self.backend {
            Backend::Google { language } => self.synthesize_google(text, language).await,
            Backend::OpenAi {
                api_key,
                model,
                voice,
                speed,
            } => {
                self.synthesize_openai(text, api_key, model, voice, *speed)
                    .await
            }
        }
    }
}

fn build_client() -> Result<reqwest::Client, SpeechError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SpeechError::Config(e.to_string()))
}

fn google_tts_url(text: &str, language: &str) -> String {
    format!(
        "{GOOGLE_TTS_URL}?ie=UTF-8&q={}&tl={}&client=tw-ob&total=1&idx=0&textlen={}",
        urlencoding::encode(text),
        urlencoding::encode(language),
        text.chars().count()
    )
}

/// Longest prefix of at most `max` characters
fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices().nth(max).map_or(text, |(i, _)| &text[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_url_encodes_phrase() {
        let url = google_tts_url("Yaha hai बिल्ली", "hi");
        assert!(url.starts_with(GOOGLE_TTS_URL));
        assert!(url.contains("q=Yaha%20hai%20"));
        assert!(url.contains("&tl=hi&client=tw-ob"));
        assert!(url.ends_with("textlen=15"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("बिल्ली", 2), "बि");
        assert_eq!(truncate_chars("cat", 10), "cat");
        assert_eq!(truncate_chars(&"a".repeat(300), GOOGLE_MAX_CHARS).len(), 200);
    }

    #[test]
    fn openai_requires_key() {
        let result = TextToSpeech::new_openai(
            String::new(),
            "tts-1".to_string(),
            "alloy".to_string(),
            1.0,
        );
        assert!(matches!(result, Err(SpeechError::Config(_))));
    }

    #[test]
    fn google_from_default_config() {
        assert!(TextToSpeech::from_config(&VoiceConfig::default()).is_ok());
    }
}
