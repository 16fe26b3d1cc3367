//! Contains all data structures that are particularly used for the Generate API

use ollama_kit_macros::{FromBytes, StreamRecord};
use serde::{Deserialize, Serialize};

use super::options::resolve_options;
use super::{GenerationMetrics, Options, ResponseFormat, Thinking, ThinkingLevel};

/// Represents a request to the Ollama API for text generation.
///
/// This struct allows specifying the model, prompt, system message,
/// and various generation options. Streaming is decided by the client method
/// the request is passed to.
#[derive(Serialize, Debug, Clone)]
pub struct GenerateRequest {
    /// The name of the model to use for generation (e.g., "llama3.2").
    pub model: String,
    /// The primary prompt for the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Text that comes after the generated text (fill-in-the-middle).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Optional base64-encoded images to include in the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// A system message overriding the one in the model's template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// The `context` returned by a previous call, to keep a short conversational memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<Thinking>,
    /// If `true`, the raw prompt will be used without any templating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    pub(crate) stream: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Some(prompt.into()),
            suffix: None,
            images: None,
            system: None,
            template: None,
            context: None,
            format: None,
            options: None,
            think: None,
            raw: None,
            keep_alive: None,
            stream: true,
        }
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sets the images for the request. An image should be a Base64-encoded string
    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn context(mut self, context: Vec<i64>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets `think` param in the API call to `true`.
    pub fn enable_thinking(mut self) -> Self {
        self.think = Some(Thinking::Boolean(true));
        self
    }

    /// Sets `think` param in the API call to specified level (`high`, `medium`, `low`).
    pub fn thinking_level(mut self, level: ThinkingLevel) -> Self {
        self.think = Some(Thinking::Level(level));
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    pub(crate) fn prepare(mut self, stream: bool, defaults: &Options) -> Self {
        let (options, format) = resolve_options(defaults, self.options.take());
        self.options = options;
        self.format = self.format.or(format);
        self.stream = stream;
        self
    }
}

/// Represents a response from the Ollama API for text generation, or one chunk of a
/// streamed one.
#[derive(Deserialize, Serialize, Default, FromBytes, StreamRecord, Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    /// The generated text (or the chunk of it, when streaming).
    #[serde(default)]
    pub response: String,
    /// The model's internal "thinking" process, if enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub done: bool,
    /// The reason why the generation finished (e.g., "stop", "length").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    /// An encoding of the conversation, to pass back in the next request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(flatten)]
    pub metrics: GenerationMetrics,
}
