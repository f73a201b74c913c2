//! mlp-api - Mountain Legacy Project asset manager service
//!
//! Startup order:
//! 1. Tracing, then build identification
//! 2. Configuration (CLI > environment > TOML > defaults)
//! 3. Database pool, idempotent initialization, schema verification
//! 4. Permission table, router, HTTP server with graceful shutdown

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mlp_common::auth::Role;
use mlp_common::config::{default_config_path, resolve_library_root, TomlConfig};
use mlp_common::db::{self, users, Permissions, SchemaSync};
use mlp_common::schema::CATALOG;
use mlp_api::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mlp-api
#[derive(Parser, Debug)]
#[command(name = "mlp-api")]
#[command(about = "Mountain Legacy Project asset manager API")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MLP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "MLP_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MLP_PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL
    #[arg(long, env = "MLP_DATABASE_URL")]
    database_url: Option<String>,

    /// Connection pool size
    #[arg(long, env = "MLP_MAX_CONNECTIONS")]
    max_connections: Option<u32>,

    /// Directory that stored file paths are relative to
    #[arg(long, env = "MLP_LIBRARY_ROOT")]
    library_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MLP_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and exit
    AddUser {
        #[arg(long)]
        email: String,

        #[arg(long, env = "MLP_ADD_USER_PASSWORD")]
        password: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "administrator")]
        role: String,
    },
}

/// Filter directives for the workspace crates at `level`
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "mlp_api={level},mlp_common={level},tower_http={level}",
        level = level
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise --log-level, then the TOML level once loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = env_filter.is_some() || args.log_level.is_some();
    let initial = env_filter
        .unwrap_or_else(|| filter_for(args.log_level.as_deref().unwrap_or("info")));
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting MLP API (mlp-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    if !pinned {
        filter_handle
            .reload(filter_for(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }
    if let Some(max) = args.max_connections {
        config.database.max_connections = max;
    }
    let session_ttl = config.session.ttl().context("Invalid session configuration")?;
    let library_root = resolve_library_root(args.library_root.as_deref(), &config.storage);
    info!("Library root: {}", library_root.display());

    let pool = db::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    db::init_database(&pool, &CATALOG)
        .await
        .context("Failed to initialize database")?;
    SchemaSync::verify_catalog(&pool, &CATALOG)
        .await
        .context("Database schema does not match the model catalog")?;

    if let Some(Command::AddUser {
        email,
        password,
        name,
        role,
    }) = args.command
    {
        let role = Role::from_str(&role)?;
        let user = users::create_user(&pool, &email, name.as_deref(), &password, role)
            .await
            .context("Failed to create user")?;
        info!("Created user {} <{}> as {}", user.id, user.email, user.role);
        return Ok(());
    }

    let permissions = Permissions::load(&pool)
        .await
        .context("Failed to load permissions")?;

    let state = AppState::new(pool, permissions, library_root)
        .with_sessions(session_ttl, config.session.secure_cookie);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| {
            format!("Invalid bind address {}:{}", config.server.bind, config.server.port)
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("mlp-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
