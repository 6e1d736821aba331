//! Request decorators and response handlers run by [`HttpClient`].
//!
//! Decorators run in order before every send, including retries. Handlers run
//! in order on every non-2xx response until one of them returns something
//! other than [`Recovery::Continue`].
//!
//! [`HttpClient`]: super::client::HttpClient

use super::client::ApiError;
use super::request::{ApiRequest, ApiResponse};
use async_trait::async_trait;

pub trait RequestDecorator: Send + Sync {
    fn decorate(&self, request: &mut ApiRequest);
}

#[derive(Debug)]
pub enum Recovery {
    /// Not handled here; ask the next handler.
    Continue,
    /// Send this request instead.
    Retry(ApiRequest),
    /// Stop with this error.
    Fail(ApiError),
}

#[async_trait]
pub trait ResponseHandler: Send + Sync {
    async fn handle(&self, request: &ApiRequest, response: &ApiResponse) -> Recovery;
}
