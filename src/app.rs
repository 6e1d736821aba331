use crate::api::{ApiClient, Resource, SetupError};
use crate::config::ClientConfig;
use crate::http::{ApiError, Upload};
use crate::redact::redact_secrets;
use crate::session::SessionError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const PASSWORD_ENV: &str = "ARCHIFLOW_PASSWORD";
const LOG_ENV: &str = "ARCHIFLOW_LOG";

#[derive(Debug, Parser)]
#[command(name = "archiflow", version, about = "ArchiFlow network management API client")]
struct Cli {
    /// API base URL (overrides ARCHIFLOW_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        username: String,
        /// Falls back to ARCHIFLOW_PASSWORD
        #[arg(short, long)]
        password: Option<String>,
    },
    /// End the session here and on the server
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show local session state
    Status,
    /// Exchange the refresh token for a new access token
    Refresh,
    /// List a resource collection
    List {
        resource: Resource,
        /// Query filter, repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Show one item of a resource collection
    Show { resource: Resource, id: String },
    /// GET an arbitrary API path
    Get { path: String },
    /// Download a collection export (CSV by default)
    Export {
        resource: Resource,
        #[arg(long, default_value = "csv")]
        format: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a file to a collection's import route
    Import { resource: Resource, file: PathBuf },
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("password required: pass --password or set {PASSWORD_ENV}")]
    MissingPassword,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("could not render output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn execute(cli: Cli) -> Result<(), AppError> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    let api = ApiClient::from_config(&config)?;

    match cli.command {
        Command::Login { username, password } => {
            let password = password
                .or_else(|| std::env::var(PASSWORD_ENV).ok())
                .filter(|p| !p.is_empty())
                .ok_or(AppError::MissingPassword)?;
            match api.login(&username, &password).await? {
                Some(user) => println!("Logged in as {}", user.display_name()),
                None => println!("Logged in as {username}"),
            }
        }
        Command::Logout => {
            api.logout().await;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = api.get_current_user().await.ok_or(AppError::NotLoggedIn)?;
            print_json(&user)?;
        }
        Command::Status => print_json(&api.session_info())?,
        Command::Refresh => {
            api.refresh_access_token().await?;
            println!("Access token refreshed");
        }
        Command::List { resource, filters } => {
            let items = api.resource(resource).list(&filters).await?;
            print_json(&items)?;
        }
        Command::Show { resource, id } => {
            let item = api.resource(resource).get(&id).await?;
            print_json(&item)?;
        }
        Command::Get { path } => {
            let value: serde_json::Value = api.http().get_json(&path).await?;
            print_json(&value)?;
        }
        Command::Export {
            resource,
            format,
            output,
        } => {
            let filters = [("format".to_string(), format)];
            let download = api.resource(resource).collection_download("export", &filters).await?;
            match output {
                Some(path) => std::fs::write(path, &download.bytes)?,
                None => std::io::stdout().write_all(&download.bytes)?,
            }
        }
        Command::Import { resource, file } => {
            let bytes = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let result = api
                .resource(resource)
                .collection_upload("import", Upload::file(file_name, bytes))
                .await?;
            print_json(&result)?;
        }
    }
    Ok(())
}

pub fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: could not start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", redact_secrets(&err.to_string()));
            if let AppError::Api(api_err) = &err {
                if api_err.is_session_terminal() {
                    eprintln!("Run `archiflow login` to start a new session.");
                }
            }
            ExitCode::FAILURE
        }
    }
}
