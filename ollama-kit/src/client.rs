use std::path::Path;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::builder::OllamaClientBuilder;
use crate::parser::StreamRecord;
use crate::retry::retry;
use crate::stream::{ChatStream, GenerateStream, ProgressStream, ResponseStream};
use crate::types::chat::{ChatRequest, ChatResponse};
use crate::types::embed::{EmbedRequest, EmbedResponse};
use crate::types::generate::{GenerateRequest, GenerateResponse};
use crate::types::{
    CopyModelRequest, CreateModelRequest, DeleteModelRequest, HttpRequest, HttpResponse,
    ListModelsResponse, ListRunningModelsResponse, ProgressResponse, PullModelRequest,
    PushModelRequest, ShowModelRequest, ShowModelResponse, VersionResponse,
};
use crate::OllamaClient;
use crate::{Error, Result, RetryPolicy};

impl OllamaClient {
    pub fn builder() -> OllamaClientBuilder {
        OllamaClientBuilder::new()
    }

    /// A client sharing this one's transport but retrying with `policy`.
    pub fn with_retry_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            retry_policy: policy,
            ..self.clone()
        }
    }

    /// A client sharing this one's transport but bounding every request by `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self.clone()
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    fn policy(&self, retried: bool) -> RetryPolicy {
        if retried {
            self.retry_policy.clone()
        } else {
            RetryPolicy::none()
        }
    }

    /// Sends a unary request; a non-success status comes back classified.
    async fn send(&self, request: HttpRequest, retried: bool) -> Result<HttpResponse> {
        #[cfg(feature = "metrics")]
        counter!("ollama_client.requests_total", "endpoint" => request.url.clone(), "type" => "unary")
            .increment(1);

        let timeout = self.timeout.or(request.timeout);
        let request = request.timeout(timeout);
        retry(&self.policy(retried), || {
            let request = request.clone();
            async move {
                self.transport
                    .send_http_request(request)
                    .await?
                    .into_success()
            }
        })
        .await
    }

    /// Connects a streaming request. Only this connection phase is retried.
    async fn open_stream<T: StreamRecord>(
        &self,
        request: HttpRequest,
        retried: bool,
    ) -> Result<ResponseStream<T>> {
        #[cfg(feature = "metrics")]
        counter!("ollama_client.requests_total", "endpoint" => request.url.clone(), "type" => "streaming")
            .increment(1);

        let timeout = self.timeout.or(request.timeout);
        let request = request.timeout(timeout);
        let body = retry(&self.policy(retried), || {
            let request = request.clone();
            async move {
                self.transport
                    .send_http_stream_request(request)
                    .await?
                    .into_success()
                    .await
            }
        })
        .await?;

        Ok(ResponseStream::from_bytes_stream(body))
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let request = request.prepare(false, &self.default_options);
        let request = HttpRequest::new("/api/chat").post().body(request)?;

        let response = self.send(request, true).await?;
        ChatResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let request = request.prepare(true, &self.default_options);
        let request = HttpRequest::new("/api/chat").post().body(request)?;

        self.open_stream(request, true).await
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let request = request.prepare(false, &self.default_options);
        let request = HttpRequest::new("/api/generate").post().body(request)?;

        let response = self.send(request, true).await?;
        GenerateResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn generate_stream(&self, request: GenerateRequest) -> Result<GenerateStream> {
        let request = request.prepare(true, &self.default_options);
        let request = HttpRequest::new("/api/generate").post().body(request)?;

        self.open_stream(request, true).await
    }

    /// Downloads a model and returns the final status once the server is done.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn pull_model(&self, request: PullModelRequest) -> Result<ProgressResponse> {
        let request = HttpRequest::new("/api/pull")
            .post()
            .body(request.prepare(false))?;

        let response = self.send(request, true).await?;
        ProgressResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn pull_model_stream(&self, request: PullModelRequest) -> Result<ProgressStream> {
        let request = HttpRequest::new("/api/pull")
            .post()
            .body(request.prepare(true))?;

        self.open_stream(request, true).await
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn push_model(&self, request: PushModelRequest) -> Result<ProgressResponse> {
        if let Some(path) = &request.path {
            ensure_local_directory(path).await?;
        }
        let request = HttpRequest::new("/api/push")
            .post()
            .body(request.prepare(false))?;

        let response = self.send(request, true).await?;
        ProgressResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn push_model_stream(&self, request: PushModelRequest) -> Result<ProgressStream> {
        if let Some(path) = &request.path {
            ensure_local_directory(path).await?;
        }
        let request = HttpRequest::new("/api/push")
            .post()
            .body(request.prepare(true))?;

        self.open_stream(request, true).await
    }

    /// Creates a model. Never retried: a repeated create is not a no-op.
    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn create_model(&self, request: CreateModelRequest) -> Result<ProgressResponse> {
        if let Some(path) = &request.path {
            ensure_local_directory(path).await?;
        }
        let request = HttpRequest::new("/api/create")
            .post()
            .body(request.prepare(false))?;

        let response = self.send(request, false).await?;
        ProgressResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn create_model_stream(&self, request: CreateModelRequest) -> Result<ProgressStream> {
        if let Some(path) = &request.path {
            ensure_local_directory(path).await?;
        }
        let request = HttpRequest::new("/api/create")
            .post()
            .body(request.prepare(true))?;

        self.open_stream(request, false).await
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn list_models(&self) -> Result<ListModelsResponse> {
        let request = HttpRequest::new("/api/tags").get();

        let response = self.send(request, true).await?;
        ListModelsResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn list_running_models(&self) -> Result<ListRunningModelsResponse> {
        let request = HttpRequest::new("/api/ps").get();

        let response = self.send(request, true).await?;
        ListRunningModelsResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn show_model(&self, request: ShowModelRequest) -> Result<ShowModelResponse> {
        let request = HttpRequest::new("/api/show").post().body(request)?;

        let response = self.send(request, true).await?;
        ShowModelResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn copy_model(&self, request: CopyModelRequest) -> Result<()> {
        let request = HttpRequest::new("/api/copy").post().body(request)?;

        self.send(request, false).await?;
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn delete_model(&self, request: DeleteModelRequest) -> Result<()> {
        let request = HttpRequest::new("/api/delete").delete().body(request)?;

        self.send(request, false).await?;
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, request), fields(model = %request.model)))]
    pub async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        let request = request.prepare(&self.default_options);
        let request = HttpRequest::new("/api/embed").post().body(request)?;

        let response = self.send(request, true).await?;
        EmbedResponse::from_bytes(response.into_body()?)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn version(&self) -> Result<VersionResponse> {
        let request = HttpRequest::new("/api/version").get();

        let response = self.send(request, true).await?;
        VersionResponse::from_bytes(response.into_body()?)
    }
}

/// Local precondition for operations that point at model files on disk.
async fn ensure_local_directory(path: &str) -> Result<()> {
    match tokio::fs::metadata(Path::new(path)).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::invalid_request(format!(
            "path is not a directory: {path}"
        ))),
        Err(err) => {
            Err(Error::invalid_request(format!("path does not exist: {path}")).with_source(err))
        }
    }
}
