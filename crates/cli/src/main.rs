use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc};

use {
    clap::Parser,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    switchboard_bus::MessageBus,
    switchboard_gateway::{FanOut, build_app, serve},
    switchboard_router::MessageService,
    switchboard_store::Store,
};

#[derive(Parser)]
#[command(name = "switchboard", about = "Switchboard message routing server")]
struct Cli {
    /// Address to bind to.
    #[arg(long, env = "SWITCHBOARD_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on.
    #[arg(long, env = "SWITCHBOARD_PORT", default_value_t = 3210)]
    port: u16,

    /// Path to the SQLite database file (created if missing).
    #[arg(long, env = "SWITCHBOARD_DB", default_value = "switchboard.db")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let options = SqliteConnectOptions::new()
        .filename(&cli.db)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Store::init(&pool).await?;
    let store = Store::new(pool);
    info!(db = %cli.db.display(), "store ready");

    let fanout = Arc::new(FanOut::new());
    let bus = Arc::new(MessageBus::new());
    let service = Arc::new(MessageService::new(store, bus, fanout.clone()));

    let app = build_app(service, fanout);
    let addr = SocketAddr::from_str(&format!("{}:{}", cli.bind, cli.port))?;
    serve(app, addr).await?;
    Ok(())
}
