mod resources;

pub use resources::{Download, Page, Resource, ResourceClient, UnknownResource};

use crate::config::{ClientConfig, TokenStoreKind};
use crate::http::{HttpClient, ReqwestTransport, Transport, TransportError};
use crate::session::{BearerAuth, SessionError, SessionManager, UnauthorizedRecovery};
use crate::state::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
use crate::types::{Credentials, SessionInfo, User};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const CURRENT_USER_PATH: &str = "/users/me/";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("could not build http client: {0}")]
    Transport(#[from] TransportError),
}

/// Entry point for talking to the backend: one session, one shared client.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        let session = SessionManager::new(config, transport.clone(), store);
        let http = HttpClient::new(transport, config.request_timeout)
            .with_decorator(Arc::new(BearerAuth::new(session.clone())))
            .with_handler(Arc::new(UnauthorizedRecovery::new(session.clone())));
        Self { http, session }
    }

    /// Builds the reqwest transport and the configured token store.
    pub fn from_config(config: &ClientConfig) -> Result<Self, SetupError> {
        let transport = Arc::new(ReqwestTransport::new(config.clone())?);
        Ok(Self::new(config, transport, token_store_for(config)))
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn resource(&self, resource: Resource) -> ResourceClient<'_> {
        ResourceClient::new(&self.http, resource)
    }

    /// Logs in and fetches the profile. A failed profile fetch does not undo
    /// the login.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>, SessionError> {
        let credentials = Credentials::new(username, password);
        self.session.login(&credentials).await?;
        Ok(self.get_current_user().await)
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub async fn refresh_access_token(&self) -> Result<String, SessionError> {
        self.session.refresh_access_token().await
    }

    /// Current profile, or `None` when logged out or the fetch fails.
    pub async fn get_current_user(&self) -> Option<User> {
        if !self.session.is_authenticated() {
            return None;
        }
        match self.http.get_json::<User>(CURRENT_USER_PATH).await {
            Ok(user) => Some(user),
            Err(err) => {
                debug!(error = %err, "current user unavailable");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn session_info(&self) -> SessionInfo {
        self.session.info()
    }
}

fn token_store_for(config: &ClientConfig) -> Arc<dyn TokenStore> {
    match &config.token_store {
        TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        TokenStoreKind::File(path) => Arc::new(FileTokenStore::new(path)),
        TokenStoreKind::Keyring => {
            let keyring = KeyringTokenStore::new(&config.keyring_service);
            if keyring.is_available() {
                Arc::new(keyring)
            } else {
                warn!("keyring unavailable, tokens will not survive a restart");
                Arc::new(MemoryTokenStore::new())
            }
        }
    }
}
