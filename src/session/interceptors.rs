use super::manager::{SessionError, SessionManager};
use crate::http::{ApiError, ApiRequest, ApiResponse, Recovery, RequestDecorator, ResponseHandler};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Attaches the session's bearer token unless the caller set an
/// `Authorization` header already.
pub struct BearerAuth {
    session: SessionManager,
}

impl BearerAuth {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }
}

impl RequestDecorator for BearerAuth {
    fn decorate(&self, request: &mut ApiRequest) {
        if request.has_authorization() {
            return;
        }
        if let Some(token) = self.session.access_token() {
            request.set_bearer(&token);
        }
    }
}

/// Turns a 401 into one refresh-and-retry. Auth endpoints and requests
/// carrying a non-bearer `Authorization` are exempt, and a second 401 after
/// the retry ends the session.
pub struct UnauthorizedRecovery {
    session: SessionManager,
}

impl UnauthorizedRecovery {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ResponseHandler for UnauthorizedRecovery {
    async fn handle(&self, request: &ApiRequest, response: &ApiResponse) -> Recovery {
        if response.status != StatusCode::UNAUTHORIZED {
            return Recovery::Continue;
        }
        if request.is_auth_endpoint() {
            debug!(path = %request.path, "401 from auth endpoint, not refreshing");
            return Recovery::Continue;
        }
        if request.retried {
            warn!(path = %request.path, "still unauthorized after refresh, ending session");
            self.session.clear();
            return Recovery::Fail(ApiError::Session(SessionError::Expired));
        }
        if !self.session.has_refresh_token() {
            return Recovery::Continue;
        }
        if request.has_authorization() && request.bearer_token().is_none() {
            // Sent with a credential the session does not own.
            debug!(path = %request.path, "401 for a foreign authorization scheme, not refreshing");
            return Recovery::Continue;
        }

        match self.session.refresh_after_unauthorized(request.bearer_token()).await {
            Ok(access) => {
                let mut retry = request.clone();
                retry.retried = true;
                retry.set_bearer(&access);
                Recovery::Retry(retry)
            }
            Err(err) => Recovery::Fail(ApiError::Session(err)),
        }
    }
}
