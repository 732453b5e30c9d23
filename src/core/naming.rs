//! Output filenames and human-readable group labels.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::adapters::{TranslateError, Translator};

static ILLEGAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[?\\"%*:|<>]"#).unwrap());
static WITHOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"( [wW]\s?/\s?[oO0])").unwrap());
static WITH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"( [wW]\s?/)").unwrap());
static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s?/\s?(\d+)").unwrap());
static EITHER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+)\s?/\s?(\w+)").unwrap());
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());

/// Make a title safe to use as a filename stem.
///
/// Shell-hostile characters are dropped and slashes are spelled out
/// ("w/o" → "without", "1/2" → "1 of 2", "this/that" → "this or that").
pub fn name_normalize(name: &str) -> String {
    let name = ILLEGAL_RE.replace_all(name, "");
    let name = WITHOUT_RE.replace_all(&name, " without");
    let name = WITH_RE.replace_all(&name, " with");
    let name = FRACTION_RE.replace_all(&name, "${1} of ${2}");
    let name = EITHER_RE.replace_all(&name, "${1} or ${2}");
    name.replace('/', "")
}

/// `name_normalize` without leading dots or surrounding whitespace
fn safe_stem(name: &str) -> String {
    name_normalize(name)
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end()
        .to_string()
}

/// Title as stored in the ledger: word characters, whitespace and dashes
pub fn clean_title(title: &str) -> String {
    NON_WORD_RE.replace_all(title, "").into_owned()
}

/// "AskReddit" → "ask reddit"
pub fn camel_case_to_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for (i, c) in text.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            out.push(' ');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Builds `<normalized title>.mp4`, translating first when a target
/// language is configured
#[derive(Clone, Default)]
pub struct FilenameBuilder {
    translator: Option<Arc<dyn Translator>>,
    target_lang: Option<String>,
}

impl FilenameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translation(mut self, translator: Arc<dyn Translator>, lang: &str) -> Self {
        self.translator = Some(translator);
        self.target_lang = Some(lang.to_string());
        self
    }

    /// The stem never contains a path separator or starts with a dot, so
    /// the file stays inside the directory it is joined onto
    pub async fn filename(&self, title: &str) -> Result<String, TranslateError> {
        let mut stem = safe_stem(title);

        if let (Some(translator), Some(lang)) = (&self.translator, &self.target_lang) {
            let translated = translator.translate(&stem, lang).await?;
            debug!(lang = %lang, stem = %translated, "Translated filename");
            stem = safe_stem(&translated);
        }

        if stem.is_empty() {
            stem = "video".to_string();
        }
        Ok(format!("{}.mp4", stem))
    }
}

impl std::fmt::Debug for FilenameBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilenameBuilder")
            .field("target_lang", &self.target_lang)
            .finish()
    }
}
