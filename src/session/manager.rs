use crate::config::ClientConfig;
use crate::http::{bearer_header, send_with_timeout, ApiRequest, Transport};
use crate::state::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::types::{Credentials, RefreshResponse, SessionInfo, SessionState, TokenPair};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::HeaderValue;
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/auth/login/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const REFRESH_PATH: &str = "/auth/refresh/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("session expired, please log in again (refresh rejected with status {status})")]
    RefreshRejected { status: u16 },
    #[error("session expired, please log in again ({0})")]
    RefreshFailed(String),
    #[error("session expired, please log in again")]
    Expired,
}

fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

type PendingRefresh = Shared<BoxFuture<'static, Result<String, SessionError>>>;

#[derive(Debug, Clone, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
    last_refreshed_at: Option<String>,
    /// Bumped by every login and clear. A refresh only lands on the
    /// generation it started from.
    generation: u64,
}

enum RefreshTrigger<'a> {
    Explicit,
    /// A request sent with this bearer (or none) came back 401.
    Unauthorized { sent_with: Option<&'a str> },
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    timeout: Duration,
    tokens: RwLock<Tokens>,
    pending: Mutex<Option<PendingRefresh>>,
    state: watch::Sender<SessionState>,
}

/// Owns the access/refresh token pair. Cloning is cheap and every clone
/// shares the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Restores whatever token pair `store` holds. A stored access token is
    /// trusted until a request proves otherwise.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        let access = read_stored(store.as_ref(), ACCESS_TOKEN_KEY);
        let refresh = read_stored(store.as_ref(), REFRESH_TOKEN_KEY);
        let initial = if access.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        debug!(state = ?initial, has_refresh = refresh.is_some(), "session restored");

        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                timeout: config.request_timeout,
                tokens: RwLock::new(Tokens {
                    access,
                    refresh,
                    ..Tokens::default()
                }),
                pending: Mutex::new(None),
                state,
            }),
        }
    }

    fn tokens(&self) -> Tokens {
        self.inner
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `update`, then mirrors the result to storage and subscribers
    /// while still holding the write lock. With `expected` set, nothing
    /// happens unless the session is still on that generation.
    fn commit(&self, expected: Option<u64>, state: SessionState, update: impl FnOnce(&mut Tokens)) -> bool {
        let mut tokens = self
            .inner
            .tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if expected.is_some_and(|generation| generation != tokens.generation) {
            return false;
        }
        update(&mut tokens);
        self.persist(ACCESS_TOKEN_KEY, tokens.access.as_deref());
        self.persist(REFRESH_TOKEN_KEY, tokens.refresh.as_deref());
        self.publish(state);
        true
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens().access
    }

    pub fn has_refresh_token(&self) -> bool {
        self.tokens().refresh.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().access.is_some()
    }

    /// The `Authorization` value every request gets while the session lasts.
    pub fn authorization_header(&self) -> Option<HeaderValue> {
        self.access_token().as_deref().and_then(bearer_header)
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn info(&self) -> SessionInfo {
        let tokens = self.tokens();
        SessionInfo {
            state: self.state(),
            has_refresh_token: tokens.refresh.is_some(),
            last_refreshed_at: tokens.last_refreshed_at,
        }
    }

    fn publish(&self, state: SessionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "session state changed");
        }
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.inner.store.set(key, value),
            None => self.inner.store.remove(key),
        };
        if let Err(err) = result {
            warn!(key, error = %err, "token storage update failed");
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, SessionError> {
        let request = ApiRequest::post(LOGIN_PATH, json!(credentials));
        let response = match send_with_timeout(self.inner.transport.as_ref(), &request, self.inner.timeout).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "login request failed");
                return Err(SessionError::InvalidCredentials);
            }
        };
        if !response.is_success() {
            info!(status = response.status.as_u16(), username = %credentials.username, "login rejected");
            return Err(SessionError::InvalidCredentials);
        }
        let pair: TokenPair = response.json().map_err(|err| {
            warn!(error = %err, "login response missing tokens");
            SessionError::InvalidCredentials
        })?;

        self.commit(None, SessionState::Authenticated, |tokens| {
            *tokens = Tokens {
                access: Some(pair.access.clone()),
                refresh: Some(pair.refresh.clone()),
                last_refreshed_at: None,
                generation: tokens.generation + 1,
            };
        });
        info!(username = %credentials.username, "logged in");
        Ok(pair)
    }

    /// Tells the backend to drop the refresh token, then ends the local
    /// session whatever the backend answered.
    pub async fn logout(&self) {
        if let Some(refresh) = self.tokens().refresh {
            let request = ApiRequest::post(LOGOUT_PATH, json!({ "refresh": refresh }));
            match send_with_timeout(self.inner.transport.as_ref(), &request, self.inner.timeout).await {
                Ok(response) if !response.is_success() => {
                    debug!(status = response.status.as_u16(), "logout rejected by backend");
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "logout request failed"),
            }
        }
        self.clear();
        info!("logged out");
    }

    /// Drops both tokens from memory and storage.
    pub fn clear(&self) {
        self.commit(None, SessionState::Anonymous, end_session);
    }

    /// Exchanges the refresh token for a new access token. Joins a refresh
    /// that is already running instead of starting another one. Any failure
    /// ends the session.
    pub async fn refresh_access_token(&self) -> Result<String, SessionError> {
        self.coordinate_refresh(RefreshTrigger::Explicit).await
    }

    /// Recovery path for a 401. `sent_with` is the bearer the failing request
    /// carried; if the session has moved past it already, the current token is
    /// returned without another refresh.
    pub async fn refresh_after_unauthorized(&self, sent_with: Option<&str>) -> Result<String, SessionError> {
        self.coordinate_refresh(RefreshTrigger::Unauthorized { sent_with }).await
    }

    async fn coordinate_refresh(&self, trigger: RefreshTrigger<'_>) -> Result<String, SessionError> {
        let pending = {
            let mut slot = self.inner.pending.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    if let RefreshTrigger::Unauthorized { sent_with } = trigger {
                        // The wave this 401 belongs to has already been resolved.
                        match self.access_token() {
                            None => return Err(SessionError::Expired),
                            Some(current) if sent_with != Some(current.as_str()) => return Ok(current),
                            Some(_) => {}
                        }
                    }
                    let generation = self.begin_refresh();
                    let pending = self.clone().run_refresh(generation).boxed().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn begin_refresh(&self) -> u64 {
        let tokens = self
            .inner
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.publish(SessionState::Refreshing);
        tokens.generation
    }

    async fn run_refresh(self, generation: u64) -> Result<String, SessionError> {
        let exchanged = self.exchange_refresh_token().await;

        // The outcome is committed before the slot is released, so a 401
        // handler that gets the lock next already sees the new tokens.
        let mut slot = self.inner.pending.lock().await;
        let result = match exchanged {
            Ok(parsed) => {
                let access = parsed.access.clone();
                let applied = self.commit(Some(generation), SessionState::Authenticated, |tokens| {
                    tokens.access = Some(parsed.access);
                    if let Some(rotated) = parsed.refresh {
                        tokens.refresh = Some(rotated);
                    }
                    tokens.last_refreshed_at = Some(now_iso());
                });
                if applied {
                    info!("access token refreshed");
                    Ok(access)
                } else {
                    self.superseded()
                }
            }
            Err(err) => {
                if self.commit(Some(generation), SessionState::Anonymous, end_session) {
                    warn!(error = %err, "token refresh failed, ending session");
                    Err(err)
                } else {
                    self.superseded()
                }
            }
        };
        slot.take();
        result
    }

    /// Outcome for a refresh whose session was replaced by a login or ended
    /// by a logout while it was in flight.
    fn superseded(&self) -> Result<String, SessionError> {
        debug!("session changed during token refresh, discarding result");
        self.access_token().ok_or(SessionError::Expired)
    }

    async fn exchange_refresh_token(&self) -> Result<RefreshResponse, SessionError> {
        let refresh = self.tokens().refresh.ok_or(SessionError::NoRefreshToken)?;

        let request = ApiRequest::post(REFRESH_PATH, json!({ "refresh": refresh }));
        let response = send_with_timeout(self.inner.transport.as_ref(), &request, self.inner.timeout)
            .await
            .map_err(|err| SessionError::RefreshFailed(err.to_string()))?;
        if !response.is_success() {
            return Err(SessionError::RefreshRejected {
                status: response.status.as_u16(),
            });
        }
        response
            .json()
            .map_err(|err| SessionError::RefreshFailed(format!("invalid refresh response: {err}")))
    }
}

fn end_session(tokens: &mut Tokens) {
    *tokens = Tokens {
        generation: tokens.generation + 1,
        ..Tokens::default()
    };
}

fn read_stored(store: &dyn TokenStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(err) => {
            warn!(key, error = %err, "token storage read failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryTokenStore;
    use crate::test_utils::{FakeBackend, FakeTransport};
    use crate::http::{ApiResponse, TransportError};
    use reqwest::StatusCode;

    fn manager(backend: &Arc<FakeBackend>, store: Arc<MemoryTokenStore>) -> SessionManager {
        SessionManager::new(&ClientConfig::default(), backend.transport(), store)
    }

    #[tokio::test]
    async fn fresh_store_starts_anonymous() {
        let backend = FakeBackend::new();
        let session = manager(&backend, Arc::new(MemoryTokenStore::new()));
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.authorization_header().is_none());
    }

    #[tokio::test]
    async fn stored_tokens_restore_an_authenticated_session_without_a_round_trip() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryTokenStore::with_tokens("a0", "r0"));
        let session = manager(&backend, store);
        assert!(session.is_authenticated());
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.authorization_header().unwrap(), "Bearer a0");
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn login_stores_pair_and_sets_header() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryTokenStore::new());
        let session = manager(&backend, store.clone());

        let pair = session.login(&Credentials::new("admin", "admin123")).await.unwrap();
        assert_eq!(pair.access, "a1");
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
        assert_eq!(session.authorization_header().unwrap(), "Bearer a1");
        assert_eq!(session.state(), SessionState::Authenticated);

        let login = &backend.requests()[0];
        assert!(!login.has_authorization());
    }

    #[tokio::test]
    async fn rejected_login_is_reported_as_invalid_credentials() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryTokenStore::new());
        let session = manager(&backend, store.clone());

        let err = session.login(&Credentials::new("admin", "wrong")).await.unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
        assert_eq!(err.to_string(), "invalid username or password");
        assert!(!session.is_authenticated());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(backend.calls_to(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn unreachable_backend_on_login_is_still_invalid_credentials() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Err(TransportError::Network("connection refused".to_string()))
        }));
        let session = SessionManager::new(&ClientConfig::default(), transport, Arc::new(MemoryTokenStore::new()));
        let err = session.login(&Credentials::new("admin", "admin123")).await.unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
    }

    #[tokio::test]
    async fn logout_notifies_backend_and_clears_everything() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryTokenStore::new());
        let session = manager(&backend, store.clone());
        session.login(&Credentials::new("admin", "admin123")).await.unwrap();

        session.logout().await;
        assert_eq!(backend.calls_to(LOGOUT_PATH), 1);
        let sent = backend.requests().into_iter().find(|r| r.path == LOGOUT_PATH).unwrap();
        assert_eq!(sent.body.unwrap()["refresh"], "r1");
        assert!(!session.is_authenticated());
        assert!(session.authorization_header().is_none());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn logout_clears_locally_when_backend_is_unreachable() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Err(TransportError::Network("connection refused".to_string()))
        }));
        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        let session = SessionManager::new(&ClientConfig::default(), transport.clone(), store.clone());

        session.logout().await;
        assert_eq!(transport.calls_to(LOGOUT_PATH), 1);
        assert!(!session.is_authenticated());
        assert!(session.authorization_header().is_none());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn logout_without_refresh_token_skips_backend() {
        let backend = FakeBackend::new();
        let session = manager(&backend, Arc::new(MemoryTokenStore::new()));
        session.logout().await;
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_access_token_only() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        let session = manager(&backend, store.clone());

        let access = session.refresh_access_token().await.unwrap();
        assert_eq!(access, "a2");
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a2"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.info().last_refreshed_at.is_some());

        let sent = backend.requests().into_iter().find(|r| r.path == REFRESH_PATH).unwrap();
        assert!(!sent.has_authorization());
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_stored() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(ApiResponse::json_value(StatusCode::OK, &json!({"access": "a2", "refresh": "r2"})))
        }));
        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        let session = SessionManager::new(&ClientConfig::default(), transport, store.clone());

        session.refresh_access_token().await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn refresh_without_token_is_terminal() {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryTokenStore::new());
        store.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        let session = manager(&backend, store.clone());

        let err = session.refresh_access_token().await.unwrap_err();
        assert_eq!(err, SessionError::NoRefreshToken);
        assert!(!session.is_authenticated());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(backend.calls_to(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session() {
        let backend = FakeBackend::new();
        backend.reject_refresh(StatusCode::BAD_REQUEST);
        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        let session = manager(&backend, store.clone());
        let mut states = session.subscribe();

        let err = session.refresh_access_token().await.unwrap_err();
        assert_eq!(err, SessionError::RefreshRejected { status: 400 });
        assert!(!session.is_authenticated());
        assert!(session.authorization_header().is_none());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn network_failure_during_refresh_is_terminal() {
        let transport = Arc::new(FakeTransport::new(|_| Err(TransportError::Timeout)));
        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        let session = SessionManager::new(&ClientConfig::default(), transport, store.clone());

        let err = session.refresh_access_token().await.unwrap_err();
        assert!(matches!(err, SessionError::RefreshFailed(_)));
        assert!(!session.is_authenticated());
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_call() {
        let backend = FakeBackend::new();
        backend.set_refresh_delay(Duration::from_millis(200));
        let session = manager(&backend, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));

        let results = futures::future::join_all((0..5).map(|_| {
            let session = session.clone();
            async move { session.refresh_access_token().await }
        }))
        .await;

        assert_eq!(backend.calls_to(REFRESH_PATH), 1);
        for result in results {
            assert_eq!(result.unwrap(), "a2");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn state_is_refreshing_while_refresh_is_in_flight() {
        let backend = FakeBackend::new();
        backend.set_refresh_delay(Duration::from_millis(200));
        let session = manager(&backend, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.refresh_access_token().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.state(), SessionState::Refreshing);
        assert!(session.is_authenticated());

        task.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_refresh_stays_logged_out() {
        let transport = Arc::new(
            FakeTransport::ok(json!({"access": "a2"})).with_delay(REFRESH_PATH, Duration::from_millis(200)),
        );
        let store = Arc::new(MemoryTokenStore::with_tokens("a1", "r1"));
        let session = SessionManager::new(&ClientConfig::default(), transport, store.clone());

        let refresh = tokio::spawn({
            let session = session.clone();
            async move { session.refresh_access_token().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.logout().await;
        assert_eq!(session.state(), SessionState::Anonymous);

        // The backend still answers with a fresh token, which must not land.
        assert_eq!(refresh.await.unwrap(), Err(SessionError::Expired));
        assert!(!session.is_authenticated());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.authorization_header().is_none());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_from_previous_session_leaves_new_login_alone() {
        let backend = FakeBackend::new();
        backend.set_refresh_delay(Duration::from_millis(200));
        let store = Arc::new(MemoryTokenStore::with_tokens("a0", "r0"));
        let session = manager(&backend, store.clone());

        let refresh = tokio::spawn({
            let session = session.clone();
            async move { session.refresh_access_token().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.login(&Credentials::new("admin", "admin123")).await.unwrap();

        // r0 is unknown to the backend, but the login replaced that session.
        assert_eq!(refresh.await.unwrap().unwrap(), "a1");
        assert_eq!(session.access_token().as_deref(), Some("a1"));
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn unauthorized_after_failed_refresh_does_not_exchange_again() {
        let backend = FakeBackend::new();
        backend.reject_refresh(StatusCode::BAD_REQUEST);
        let session = manager(&backend, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));

        let first = session.refresh_after_unauthorized(Some("a1")).await;
        assert_eq!(first, Err(SessionError::RefreshRejected { status: 400 }));
        // Same wave, handled after the failure was committed.
        let late = session.refresh_after_unauthorized(Some("a1")).await;
        assert_eq!(late, Err(SessionError::Expired));
        assert_eq!(backend.calls_to(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn unauthorized_after_wave_reuses_current_token() {
        let backend = FakeBackend::new();
        let session = manager(&backend, Arc::new(MemoryTokenStore::with_tokens("a1", "r1")));

        assert_eq!(session.refresh_after_unauthorized(Some("a1")).await.unwrap(), "a2");
        // A late 401 for a request still carrying the old token.
        assert_eq!(session.refresh_after_unauthorized(Some("a1")).await.unwrap(), "a2");
        assert_eq!(backend.calls_to(REFRESH_PATH), 1);
    }
}
