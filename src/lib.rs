pub mod api;
mod app;
pub mod config;
pub mod http;
mod redact;
pub mod session;
pub mod state;
mod test_utils;
pub mod types;

pub use api::ApiClient;
pub use redact::redact_secrets;

pub fn run() -> std::process::ExitCode {
    app::run()
}
