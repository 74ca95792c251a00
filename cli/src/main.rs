use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use client::config::{ClientConfig, ConfigError};
use client::net::api::{DEFAULT_NOTIFICATION_LIMIT, DEFAULT_PAGE_LIMIT};
use client::net::request::ApiRequest;
use client::net::transport::ReqwestTransport;
use client::net::types::RegisterFields;
use client::state::tokens::FileBackend;
use client::util::redirect::MemoryNavigator;
use client::{Api, ApiError, AuthPipeline, SessionController, SessionError, StoreError, TokenStore, UnreadCounter};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const TOKEN_FILE_NAME: &str = "tokens.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not logged in; run `photofeed login` first")]
    NotLoggedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("waiting for shutdown signal failed: {0}")]
    Signal(std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "photofeed", about = "photofeed session and feed CLI")]
struct Cli {
    /// REST API root; overrides `PHOTOFEED_API_BASE_URL`.
    #[arg(long, env = "PHOTOFEED_API_BASE_URL")]
    base_url: Option<String>,

    /// Where the access/refresh token pair is persisted.
    #[arg(long, env = "PHOTOFEED_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "PHOTOFEED_PASSWORD")]
        password: String,
    },
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PHOTOFEED_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
    Whoami,
    Logout,
    Feed {
        /// Only posts from followed users.
        #[arg(long, default_value_t = false)]
        following: bool,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },
    Notifications {
        #[arg(long, default_value_t = false)]
        unread: bool,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = DEFAULT_NOTIFICATION_LIMIT)]
        limit: u32,
    },
    UnreadCount {
        /// Keep polling and print every change until interrupted.
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
    /// GET an arbitrary API path through the authenticated pipeline.
    Get { path: String },
}

struct CliContext {
    config: ClientConfig,
    controller: Arc<SessionController>,
}

impl CliContext {
    fn api(&self) -> Result<Api, CliError> {
        match self.controller.authorized() {
            Ok(api) => Ok(api),
            Err(SessionError::SessionExpired) => Err(CliError::NotLoggedIn),
            Err(e) => Err(e.into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = connect(resolve_config(ClientConfig::from_env()?, cli.base_url), cli.token_file)?;

    match cli.command {
        Command::Login { username, password } => {
            let session = ctx.controller.login(&username, &password).await?;
            print_user(session.user.as_ref().map(client::UserRecord::as_json))
        }
        Command::Register { username, email, password, full_name } => {
            let fields = RegisterFields { username, email, password, full_name, ..RegisterFields::default() };
            let session = ctx.controller.register(&fields).await?;
            print_user(session.user.as_ref().map(client::UserRecord::as_json))
        }
        Command::Whoami => {
            let session = ctx.controller.start().await;
            print_user(session.user.as_ref().map(client::UserRecord::as_json))
        }
        Command::Logout => {
            ctx.controller.logout()?;
            println!("logged out");
            Ok(())
        }
        Command::Feed { following, skip, limit } => {
            ctx.controller.start().await;
            let api = ctx.api()?;
            let posts = if following { api.following_posts(skip, limit).await? } else { api.posts(skip, limit).await? };
            print_json(&posts)
        }
        Command::Notifications { unread, skip, limit } => {
            ctx.controller.start().await;
            let api = ctx.api()?;
            let list = if unread { api.unread_notifications().await? } else { api.notifications(skip, limit).await? };
            print_json(&list)
        }
        Command::UnreadCount { watch } => run_unread_count(&ctx, watch).await,
        Command::Get { path } => {
            ctx.controller.start().await;
            let response = ctx.api()?.send(ApiRequest::get(path)).await?;
            print_json(&response.json::<Value>()?)
        }
    }
}

fn resolve_config(mut config: ClientConfig, base_url: Option<String>) -> ClientConfig {
    if let Some(url) = base_url.map(|u| u.trim().trim_end_matches('/').to_owned()).filter(|u| !u.is_empty()) {
        config.api_base_url = url;
    }
    config
}

fn default_token_file() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from(".photofeed").join(TOKEN_FILE_NAME),
        |dir| dir.join("photofeed").join(TOKEN_FILE_NAME),
    )
}

fn connect(config: ClientConfig, token_file: Option<PathBuf>) -> Result<CliContext, CliError> {
    let path = token_file.unwrap_or_else(default_token_file);
    tracing::debug!(path = %path.display(), base_url = %config.api_base_url, "using token file");

    let tokens = TokenStore::new(Arc::new(FileBackend::new(path)));
    let transport = Arc::new(ReqwestTransport::new(config.clone())?);
    let navigator = Arc::new(MemoryNavigator::default());
    let pipeline = Arc::new(AuthPipeline::new(transport, tokens, navigator, config.login_path.clone()));
    let controller = Arc::new(SessionController::new(Api::new(pipeline)));
    Ok(CliContext { config, controller })
}

async fn run_unread_count(ctx: &CliContext, watch: bool) -> Result<(), CliError> {
    let session = ctx.controller.start().await;
    if session.user.is_none() {
        return Err(CliError::NotLoggedIn);
    }
    let counter = Arc::new(UnreadCounter::new(ctx.api()?));
    if !watch {
        println!("{}", counter.refresh(&session).await);
        return Ok(());
    }

    let mut badge = counter.subscribe();
    let period = Duration::from_secs(ctx.config.unread_poll_secs);
    let poller = Arc::clone(&counter).spawn_poller(&ctx.controller, period);
    loop {
        tokio::select! {
            changed = badge.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *badge.borrow_and_update());
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(CliError::Signal)?;
                break;
            }
        }
    }
    poller.abort();
    Ok(())
}

fn print_user(user: Option<&Value>) -> Result<(), CliError> {
    match user {
        Some(user) => print_json(user),
        None => Err(CliError::NotLoggedIn),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
