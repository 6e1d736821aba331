use super::pipeline::{Recovery, RequestDecorator, ResponseHandler};
use super::request::{ApiRequest, ApiResponse};
use super::transport::{Transport, TransportError};
use crate::redact::redact_secrets;
use crate::session::SessionError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A request is re-issued at most this many times, whatever the handlers say.
const MAX_RETRIES: usize = 1;
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    pub(crate) fn from_response(response: &ApiResponse) -> Self {
        let text = response.text();
        let body = redact_secrets(&text);
        let cut = body.char_indices().nth(ERROR_BODY_LIMIT).map(|(idx, _)| idx);
        let body = match cut {
            Some(idx) => format!("{}...", &body[..idx]),
            None => body.into_owned(),
        };
        Self::Status {
            status: response.status,
            body,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The session ended and the user has to log in again.
    pub fn is_session_terminal(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Network(msg) => Self::Network(msg),
        }
    }
}

pub(crate) async fn send_with_timeout(
    transport: &dyn Transport,
    request: &ApiRequest,
    default_timeout: Duration,
) -> Result<ApiResponse, TransportError> {
    let timeout = request.timeout.unwrap_or(default_timeout);
    match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

/// Shared HTTP client. Runs every request through the decorator and handler
/// pipeline, enforces timeouts, and re-issues requests a handler asks for.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    decorators: Vec<Arc<dyn RequestDecorator>>,
    handlers: Vec<Arc<dyn ResponseHandler>>,
    default_timeout: Duration,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            decorators: Vec::new(),
            handlers: Vec::new(),
            default_timeout,
        }
    }

    pub fn with_decorator(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut request = request;
        let mut retries = 0;
        loop {
            for decorator in &self.decorators {
                decorator.decorate(&mut request);
            }

            let response =
                send_with_timeout(self.transport.as_ref(), &request, self.default_timeout).await?;
            debug!(
                method = %request.method,
                path = %request.path,
                status = response.status.as_u16(),
                retried = request.retried,
                "api response"
            );
            if response.is_success() {
                return Ok(response);
            }

            match self.recover(&request, &response).await {
                Recovery::Continue => return Err(ApiError::from_response(&response)),
                Recovery::Fail(err) => return Err(err),
                Recovery::Retry(next) => {
                    if retries >= MAX_RETRIES {
                        warn!(path = %request.path, "retry limit reached");
                        return Err(ApiError::from_response(&response));
                    }
                    retries += 1;
                    request = next;
                }
            }
        }
    }

    /// Like [`execute`](Self::execute), but gives up as soon as `cancel`
    /// completes.
    pub async fn execute_until<C>(&self, request: ApiRequest, cancel: C) -> Result<ApiResponse, ApiError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => Err(ApiError::Cancelled),
            result = self.execute(request) => result,
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        Ok(response.json()?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    async fn recover(&self, request: &ApiRequest, response: &ApiResponse) -> Recovery {
        for handler in &self.handlers {
            match handler.handle(request, response).await {
                Recovery::Continue => continue,
                other => return other,
            }
        }
        Recovery::Continue
    }
}
