use std::collections::BTreeMap;

use ollama_kit_macros::FromBytes;
use serde::{Deserialize, Serialize};

use super::Message;
use crate::parser::StreamRecord;

/// Represents the response from listing all locally available models.
#[derive(Deserialize, Serialize, Default, FromBytes, Debug, Clone)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelSummary>,
}

/// A single locally available model.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct ModelSummary {
    /// The name of the model (e.g., "llama3.2:latest").
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: String,
    /// When the model was last modified (ISO 8601).
    #[serde(default)]
    pub modified_at: String,
    /// The size of the model in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetails,
}

/// Provides detailed information about a model.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct ModelDetails {
    #[serde(default)]
    pub parent_model: String,
    #[serde(default)]
    pub format: String,
    /// The family of the model (e.g., "llama").
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub families: Option<Vec<String>>,
    /// The parameter size of the model (e.g., "7B").
    #[serde(default)]
    pub parameter_size: String,
    /// The quantization level of the model (e.g., "Q4_0").
    #[serde(default)]
    pub quantization_level: String,
}

/// Represents the response from listing models currently loaded in memory.
#[derive(Deserialize, Serialize, Default, FromBytes, Debug, Clone)]
pub struct ListRunningModelsResponse {
    #[serde(default)]
    pub models: Vec<RunningModel>,
}

/// A model currently loaded in memory.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct RunningModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetails,
    /// When the model will be unloaded (ISO 8601).
    #[serde(default)]
    pub expires_at: String,
    /// The VRAM usage of the model in bytes.
    #[serde(default)]
    pub size_vram: u64,
    #[serde(default)]
    pub context_length: Option<u32>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ShowModelRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl ShowModelRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            verbose: None,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }
}

/// Everything the server knows about a single model.
#[derive(Deserialize, Serialize, Default, FromBytes, Debug, Clone)]
pub struct ShowModelResponse {
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub modelfile: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub details: ModelDetails,
    #[serde(default)]
    pub model_info: Option<serde_json::Map<String, serde_json::Value>>,
    /// Features the model supports (e.g. "completion", "tools", "vision").
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub modified_at: String,
}

impl ShowModelResponse {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CopyModelRequest {
    pub source: String,
    pub destination: String,
}

impl CopyModelRequest {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DeleteModelRequest {
    pub model: String,
}

impl DeleteModelRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct PullModelRequest {
    pub model: String,
    /// Allow insecure connections to the registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    pub(crate) stream: bool,
}

impl PullModelRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            insecure: None,
            stream: true,
        }
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = Some(insecure);
        self
    }

    pub(crate) fn prepare(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct PushModelRequest {
    /// Fully qualified name, `<namespace>/<model>:<tag>`.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    /// Local directory holding the model files. Must exist and be a directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub(crate) stream: bool,
}

impl PushModelRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            insecure: None,
            path: None,
            stream: true,
        }
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = Some(insecure);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn prepare(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A typed model parameter value, e.g. `temperature = 0.7` or `stop = ["</s>"]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<String>),
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<Vec<String>> for ParameterValue {
    fn from(value: Vec<String>) -> Self {
        ParameterValue::List(value)
    }
}

/// Creates a new model, from an existing one or from local files.
#[derive(Serialize, Debug, Clone)]
pub struct CreateModelRequest {
    /// Name of the model to create.
    pub model: String,
    /// Existing model to derive from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Local directory holding the model files. Must exist and be a directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// File name to blob digest, for files already uploaded to the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapters: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, ParameterValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Quantization type to apply (e.g. "q4_K_M").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantize: Option<String>,
    pub(crate) stream: bool,
}

impl CreateModelRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            from: None,
            path: None,
            files: None,
            adapters: None,
            template: None,
            license: None,
            system: None,
            parameters: None,
            messages: None,
            quantize: None,
            stream: true,
        }
    }

    pub fn from_model(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn file(mut self, name: impl Into<String>, digest: impl Into<String>) -> Self {
        self.files
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), digest.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license.get_or_insert_with(Vec::new).push(license.into());
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn quantize(mut self, quantize: impl Into<String>) -> Self {
        self.quantize = Some(quantize.into());
        self
    }

    pub(crate) fn prepare(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A status update from a pull, push or create operation.
#[derive(Deserialize, Serialize, Default, FromBytes, Debug, Clone, PartialEq)]
pub struct ProgressResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Total bytes of the layer being transferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Bytes transferred so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    /// Completion ratio in `0.0..=1.0`, for servers that report it directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl ProgressResponse {
    /// Completion ratio, from `progress` or else from `completed / total`.
    pub fn fraction(&self) -> Option<f64> {
        self.progress.or(match (self.completed, self.total) {
            (Some(completed), Some(total)) if total > 0 => Some(completed as f64 / total as f64),
            _ => None,
        })
    }
}

impl StreamRecord for ProgressResponse {
    /// Progress streams end with a `success` (or `done`) status rather than a `done` flag.
    fn is_done(&self) -> bool {
        matches!(self.status.as_str(), "success" | "done")
    }
}

#[derive(Deserialize, Serialize, Default, FromBytes, Debug, Clone)]
pub struct VersionResponse {
    #[serde(default)]
    pub version: String,
}
