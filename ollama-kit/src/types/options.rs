use serde::{Deserialize, Serialize, Serializer};

/// The shape the model is asked to answer in.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    /// Any valid JSON document (`"format": "json"`).
    Json,
    /// A JSON schema the answer must conform to.
    Schema(serde_json::Value),
}

impl Serialize for ResponseFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResponseFormat::Json => serializer.serialize_str("json"),
            ResponseFormat::Schema(schema) => schema.serialize(serializer),
        }
    }
}

/// Sampling and decoding parameters. Every field is optional; absent fields are left
/// to the server's (or the model's) defaults.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Options {
    /// The random seed for reproducible output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Higher values make the output more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
    /// Generation stops as soon as one of these sequences is produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Size of the context window, in tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    /// Maximum number of tokens to generate. `-1` means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i32>,
    /// Response-format hint. Sent as the request's top-level `format` field,
    /// never inside `options`.
    #[serde(skip)]
    pub format: Option<ResponseFormat>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn min_p(mut self, min_p: f32) -> Self {
        self.min_p = Some(min_p);
        self
    }

    pub fn stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = Some(stop.into_iter().map(Into::into).collect());
        self
    }

    pub fn num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    pub fn num_predict(mut self, num_predict: i32) -> Self {
        self.num_predict = Some(num_predict);
        self
    }

    pub fn repeat_penalty(mut self, repeat_penalty: f32) -> Self {
        self.repeat_penalty = Some(repeat_penalty);
        self
    }

    pub fn repeat_last_n(mut self, repeat_last_n: i32) -> Self {
        self.repeat_last_n = Some(repeat_last_n);
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layers `overrides` on top of `self`: each field of `overrides` wins when present,
    /// otherwise the field of `self` is kept.
    pub fn merge(&self, overrides: &Options) -> Options {
        Options {
            seed: overrides.seed.or(self.seed),
            temperature: overrides.temperature.or(self.temperature),
            top_k: overrides.top_k.or(self.top_k),
            top_p: overrides.top_p.or(self.top_p),
            min_p: overrides.min_p.or(self.min_p),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
            num_ctx: overrides.num_ctx.or(self.num_ctx),
            num_predict: overrides.num_predict.or(self.num_predict),
            repeat_penalty: overrides.repeat_penalty.or(self.repeat_penalty),
            repeat_last_n: overrides.repeat_last_n.or(self.repeat_last_n),
            format: overrides.format.clone().or_else(|| self.format.clone()),
        }
    }
}

/// Merges a request's own options over the client defaults and splits off the
/// format hint. Returns `None` for the options when nothing is set.
pub(crate) fn resolve_options(
    defaults: &Options,
    request: Option<Options>,
) -> (Option<Options>, Option<ResponseFormat>) {
    let mut merged = match request {
        Some(request) => defaults.merge(&request),
        None => defaults.clone(),
    };
    let format = merged.format.take();
    let options = (!merged.is_empty()).then_some(merged);
    (options, format)
}
