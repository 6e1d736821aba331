//! Test utilities
//!
//! An in-process transport that records every request, and a fake backend
//! that speaks the auth endpoints on top of it.

#![cfg(test)]

use crate::http::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::session::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fake transport
// ============================================================================

type Responder = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync>;

pub struct FakeTransport {
    responder: Responder,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delays: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with 200 and `body`.
    pub fn ok(body: Value) -> Self {
        Self::new(move |_| Ok(ApiResponse::json_value(StatusCode::OK, &body)))
    }

    pub fn with_delay(self, path: &str, delay: Duration) -> Self {
        self.set_delay(path, delay);
        self
    }

    pub fn set_delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let delay = self.delays.lock().unwrap().get(&request.path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(request)
    }
}

// ============================================================================
// Fake backend
// ============================================================================

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

struct BackendState {
    valid_access: HashSet<String>,
    valid_refresh: HashSet<String>,
    issued: usize,
    refresh_status: Option<StatusCode>,
    routes: HashMap<String, Value>,
}

/// Mimics the backend's JWT endpoints. Starts out with `a1`/`r1` already
/// issued; every successful refresh mints `a2`, `a3`, ...
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
    transport: Arc<FakeTransport>,
}

fn unauthorized() -> ApiResponse {
    ApiResponse::json_value(
        StatusCode::UNAUTHORIZED,
        &json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"}),
    )
}

fn handle(state: &Mutex<BackendState>, request: &ApiRequest) -> ApiResponse {
    let mut state = state.lock().unwrap();
    let body = request.body.clone().unwrap_or(Value::Null);

    match request.path.as_str() {
        LOGIN_PATH => {
            if body["username"] == ADMIN_USERNAME && body["password"] == ADMIN_PASSWORD {
                state.valid_access.insert("a1".to_string());
                state.valid_refresh.insert("r1".to_string());
                ApiResponse::json_value(StatusCode::OK, &json!({"access": "a1", "refresh": "r1"}))
            } else {
                ApiResponse::json_value(
                    StatusCode::UNAUTHORIZED,
                    &json!({"detail": "No active account found with the given credentials"}),
                )
            }
        }
        REFRESH_PATH => {
            if let Some(status) = state.refresh_status {
                return ApiResponse::json_value(status, &json!({"detail": "refresh rejected"}));
            }
            let token = body["refresh"].as_str().unwrap_or_default();
            if !state.valid_refresh.contains(token) {
                return unauthorized();
            }
            state.issued += 1;
            let access = format!("a{}", state.issued);
            state.valid_access.insert(access.clone());
            ApiResponse::json_value(StatusCode::OK, &json!({ "access": access }))
        }
        LOGOUT_PATH => {
            if let Some(token) = body["refresh"].as_str() {
                state.valid_refresh.remove(token);
            }
            ApiResponse::json_value(StatusCode::OK, &json!({}))
        }
        path => {
            let Some(bearer) = request.bearer_token() else {
                return unauthorized();
            };
            if !state.valid_access.contains(bearer) {
                return unauthorized();
            }
            if path == "/users/me/" {
                return ApiResponse::json_value(
                    StatusCode::OK,
                    &json!({"id": 1, "username": ADMIN_USERNAME, "email": "admin@archiflow.local", "is_staff": true}),
                );
            }
            let body = state.routes.get(path).cloned().unwrap_or_else(|| {
                json!({
                    "method": request.method.as_str(),
                    "path": request.path_and_query(),
                    "token": bearer,
                    "body": request.body,
                })
            });
            ApiResponse::json_value(StatusCode::OK, &body)
        }
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let state = Arc::new(Mutex::new(BackendState {
            valid_access: HashSet::from(["a1".to_string()]),
            valid_refresh: HashSet::from(["r1".to_string()]),
            issued: 1,
            refresh_status: None,
            routes: HashMap::new(),
        }));
        let transport = Arc::new(FakeTransport::new({
            let state = state.clone();
            move |request| Ok(handle(&state, request))
        }));
        Arc::new(Self { state, transport })
    }

    pub fn transport(&self) -> Arc<FakeTransport> {
        self.transport.clone()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.transport.requests()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.transport.calls_to(path)
    }

    /// Makes `token` fail authentication from now on.
    pub fn expire(&self, token: &str) {
        self.state.lock().unwrap().valid_access.remove(token);
    }

    pub fn reject_refresh(&self, status: StatusCode) {
        self.state.lock().unwrap().refresh_status = Some(status);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.transport.set_delay(REFRESH_PATH, delay);
    }

    /// Serves `body` for authorized requests to `path`.
    pub fn respond(&self, path: &str, body: Value) {
        self.state.lock().unwrap().routes.insert(path.to_string(), body);
    }
}
