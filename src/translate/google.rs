//! Google Translate (public `gtx` endpoint)

use std::time::Duration;

use tokio::runtime::Handle;

use super::{TranslationError, Translator};

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Translates through the public Google Translate endpoint
///
/// The request runs on the async client and is driven to completion with
/// [`Handle::block_on`], so `translate` must be called from a blocking
/// thread (the frame loop), never from inside an async task.
pub struct GoogleTranslator {
    client: reqwest::Client,
    runtime: Handle,
    source: String,
    target: String,
}

impl GoogleTranslator {
    /// Create a translator from auto-detected source to `target`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(runtime: Handle, target: &str, timeout: Duration) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            source: "auto".to_string(),
            target: target.to_string(),
        })
    }

    async fn fetch(&self, text: &str) -> Result<String, TranslationError> {
        let url = format!(
            "{ENDPOINT}?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.source,
            self.target,
            urlencoding::encode(text)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TranslationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TranslationError::Request(format!(
                "translate returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranslationError::Response(e.to_string()))?;

        parse_response(&body)
    }
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.runtime.block_on(self.fetch(text))
    }
}

/// Join the translated sentence segments
///
/// The response looks like `[[["नमस्ते","hello",...], ...], null, "en", ...]`.
fn parse_response(body: &serde_json::Value) -> Result<String, TranslationError> {
    let segments = body
        .get(0)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| TranslationError::Response("missing sentence list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(serde_json::Value::as_str))
        .collect();

    if translated.is_empty() {
        Err(TranslationError::Response("no translated text".to_string()))
    } else {
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn segments_are_concatenated() {
        let body = json!([
            [["टेडी ", "teddy ", null, null, 10], ["भालू", "bear", null, null, 10]],
            null,
            "en"
        ]);
        assert_eq!(parse_response(&body).unwrap(), "टेडी भालू");
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_response(&json!({"error": "bad"})).is_err());
        assert!(parse_response(&json!([[]])).is_err());
    }
}
