//! Contains all data structures that are particularly used for the Chat API

use ollama_kit_macros::{FromBytes, StreamRecord};
use serde::{Deserialize, Serialize};

use super::options::resolve_options;
use super::{GenerationMetrics, Options, ResponseFormat, Role, Thinking, ThinkingLevel};

/// Represents a chat request to the Ollama API.
///
/// Whether the answer is streamed is decided by the client method it is passed to
/// ([`chat`](crate::OllamaClient::chat) or
/// [`chat_stream`](crate::OllamaClient::chat_stream)), not by the caller.
#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    /// The name of the model to use for the chat completion (e.g., "llama3.2").
    pub model: String,
    /// The conversation so far, oldest message first.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<Thinking>,
    /// How long the model stays loaded after the call (e.g. "5m", "0").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    pub(crate) stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            tools: None,
            format: None,
            options: None,
            think: None,
            keep_alive: None,
            stream: true,
        }
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
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

    /// Sets `think` param in the API call to the given level.
    pub fn thinking_level(mut self, level: ThinkingLevel) -> Self {
        self.think = Some(Thinking::Level(level));
        self
    }

    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    /// `true` when the request will be sent with streaming enabled.
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

/// A single message of a conversation, either sent or received.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// The model's reasoning, when thinking is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Base64-encoded images attached to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Name of the tool whose result this message carries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A message carrying the result of a tool call back to the model.
    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn add_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.push(tool_call);
        self
    }
}

/// Specifies a tool that the model can use.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolSpec {
    /// A functional tool definition.
    Function { function: FunctionalTool },
}

/// Represents a functional tool that the model can call.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FunctionalTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The JSON schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// Represents a tool call made by the model.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub function: FunctionInvocation,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FunctionInvocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A chat completion, or one chunk of a streamed one.
///
/// The final chunk of a stream has `done == true` and carries `done_reason` and
/// the [`GenerationMetrics`].
#[derive(Deserialize, Serialize, Default, FromBytes, StreamRecord, Debug, Clone, PartialEq)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped (e.g. "stop", "length").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(flatten)]
    pub metrics: GenerationMetrics,
}
