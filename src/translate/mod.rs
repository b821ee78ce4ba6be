//! Label translation
//!
//! Translators are called synchronously from the frame loop. A failed
//! translation never aborts a frame: [`localize`] falls back to the source text.

mod cache;
mod google;

use thiserror::Error;

pub use cache::CachedTranslator;
pub use google::GoogleTranslator;

/// Translation errors
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Request to the translation service failed
    #[error("translation request failed: {0}")]
    Request(String),

    /// Service answered with something we could not read
    #[error("unexpected translation response: {0}")]
    Response(String),
}

/// Maps a label into the target language
pub trait Translator: Send + Sync {
    /// Translate `text`
    ///
    /// # Errors
    ///
    /// Returns error if the text cannot be translated
    fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

/// Passes text through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslationError> {
        Ok(text.to_string())
    }
}

/// Translate `text`, falling back to `text` itself on any failure
#[must_use]
pub fn localize(translator: &dyn Translator, text: &str) -> String {
    match translator.translate(text) {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => text.to_string(),
        Err(e) => {
            tracing::warn!(text, error = %e, "translation failed, using original label");
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Translator for Failing {
        fn translate(&self, _text: &str) -> Result<String, TranslationError> {
            Err(TranslationError::Request("quota exceeded".to_string()))
        }
    }

    struct Blank;

    impl Translator for Blank {
        fn translate(&self, _text: &str) -> Result<String, TranslationError> {
            Ok("  ".to_string())
        }
    }

    #[test]
    fn failure_falls_back_to_source() {
        assert_eq!(localize(&Failing, "dog"), "dog");
    }

    #[test]
    fn blank_translation_falls_back_to_source() {
        assert_eq!(localize(&Blank, "dog"), "dog");
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(localize(&IdentityTranslator, "cup"), "cup");
    }
}
