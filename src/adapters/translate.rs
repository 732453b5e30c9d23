//! Filename translation through the public Google Translate endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{TranslateError, Translator};

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleTranslator {
    http: Client,
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        let body: Value = self
            .http
            .get(ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_translation(&body)
    }
}

/// Response shape: `[[["translated", "source", ...], ...], ...]`
fn parse_translation(body: &Value) -> Result<String, TranslateError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Decode(body.to_string()))?;

    let translated: String = sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(TranslateError::Decode(body.to_string()));
    }
    Ok(translated)
}
