use ollama_kit_macros::FromBytes;
use serde::{Deserialize, Serialize};

use super::options::resolve_options;
use super::Options;

/// Text to embed: a single string or a batch.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EmbedInput {
    Single(String),
    Batch(Vec<String>),
}

impl From<&str> for EmbedInput {
    fn from(value: &str) -> Self {
        EmbedInput::Single(value.to_string())
    }
}

impl From<String> for EmbedInput {
    fn from(value: String) -> Self {
        EmbedInput::Single(value)
    }
}

impl From<Vec<String>> for EmbedInput {
    fn from(value: Vec<String>) -> Self {
        EmbedInput::Batch(value)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct EmbedRequest {
    pub model: String,
    pub input: EmbedInput,
    /// Truncate inputs that exceed the context length instead of failing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

impl EmbedRequest {
    pub fn new(model: impl Into<String>, input: impl Into<EmbedInput>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            truncate: None,
            options: None,
            keep_alive: None,
        }
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = Some(truncate);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    pub(crate) fn prepare(mut self, defaults: &Options) -> Self {
        let (options, _) = resolve_options(defaults, self.options.take());
        self.options = options;
        self
    }
}

#[derive(Deserialize, Serialize, Default, FromBytes, Debug, Clone)]
pub struct EmbedResponse {
    #[serde(default)]
    pub model: String,
    /// One vector per input, in input order.
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
}
