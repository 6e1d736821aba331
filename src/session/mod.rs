mod interceptors;
mod manager;

pub use interceptors::{BearerAuth, UnauthorizedRecovery};
pub use manager::{SessionError, SessionManager, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
