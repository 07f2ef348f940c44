//! Render operation arguments into bounded, human readable diagnostic text.
//!
//! Documents render as relaxed extended JSON so dates show up as ISO strings
//! and numbers as plain JSON numbers.
//! Values that can't be rendered as JSON fall back to their debug representation.
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::options::UpdateModifications;
use serde_json::Value;

use crate::constants::BULK_MODELS_SHOWN_MAX;
use crate::constants::DEFAULT_FIELD_LEN_MAX;
use crate::operation::update_to_bson;
use crate::operation::WriteModel;

mod timestamp;

pub use self::timestamp::Timestamp;

/// Operation argument to render.
#[derive(Clone, Copy)]
pub enum Argument<'a> {
    Document(&'a Document),
    Documents(&'a [Document]),
    /// Filter selecting a document by its `_id`.
    Key(&'a Bson),
    Values(&'a [Bson]),
    Update(&'a UpdateModifications),
    Models(&'a [WriteModel]),
    Text(&'a str),
    Debug(&'a dyn std::fmt::Debug),
}

/// Function rendering an argument into text, before truncation.
pub type FormatFn = fn(&Argument<'_>) -> String;

/// Encode arguments into diagnostic strings no longer than a maximum length.
#[derive(Clone, Copy)]
pub struct Encoder {
    format: FormatFn,
    max_len: usize,
}

impl Encoder {
    /// Encoder with the default format and the given maximum length (in bytes).
    pub fn new(max_len: usize) -> Encoder {
        Encoder {
            format: render,
            max_len,
        }
    }

    /// Replace the function used to render arguments.
    pub fn with_format(mut self, format: FormatFn) -> Encoder {
        self.format = format;
        self
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Render and truncate the argument.
    pub fn encode(&self, argument: &Argument<'_>) -> String {
        truncate((self.format)(argument), self.max_len)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new(DEFAULT_FIELD_LEN_MAX)
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("max_len", &self.max_len)
            .finish()
    }
}

/// Default argument format.
pub fn render(argument: &Argument<'_>) -> String {
    match argument {
        Argument::Document(document) => json(Bson::Document((*document).clone())),
        Argument::Documents(documents) => json(Bson::Array(
            documents.iter().cloned().map(Bson::Document).collect(),
        )),
        Argument::Key(key) => {
            let mut filter = Document::new();
            filter.insert("_id", (*key).clone());
            json(Bson::Document(filter))
        }
        Argument::Values(values) => json(Bson::Array(values.to_vec())),
        Argument::Update(update) => json(update_to_bson(update)),
        Argument::Models(models) => models_summary(models),
        Argument::Text(text) => text.to_string(),
        Argument::Debug(value) => format!("{:?}", value),
    }
}

/// Summarise bulk write models, showing only the first few in full.
fn models_summary(models: &[WriteModel]) -> String {
    let shown: Vec<Value> = models
        .iter()
        .take(BULK_MODELS_SHOWN_MAX)
        .map(|model| Bson::Document(model.to_document()).into_relaxed_extjson())
        .collect();
    let info = if models.len() > BULK_MODELS_SHOWN_MAX {
        format!("only the first {} models are shown", BULK_MODELS_SHOWN_MAX)
    } else {
        String::new()
    };
    let summary = serde_json::json!({
        "count": models.len(),
        "data": shown,
        "info": info,
    });
    serde_json::to_string(&summary).unwrap_or_else(|_| format!("{:?}", models))
}

fn json(value: Bson) -> String {
    serde_json::to_string(&value.clone().into_relaxed_extjson())
        .unwrap_or_else(|_| format!("{:?}", value))
}

/// Truncate text to at most `max_len` bytes without splitting a character.
pub fn truncate(mut text: String, max_len: usize) -> String {
    if text.len() <= max_len {
        return text;
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
