//! Gapwatch — forex gap and order-block bot
//!
//! Usage:
//!   gapwatch serve --port 8080   — Launch the trigger server (GET /run runs a sweep)
//!   gapwatch run                 — Run one sweep from CLI (cron)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::{
    run_sweep, BotConfig, Credentials, SqliteDetectionLog, SweepContext, SweepError, SweepReport,
    TelegramNotifier, TwelveDataClient,
};
use persistence::repository::DetectionRepository;
use persistence::Database;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Parser)]
#[command(name = "gapwatch")]
#[command(about = "Forex gap and order-block detector with Telegram alerts", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the trigger web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one sweep and exit (for cron)
    Run,
}

/// Long-lived collaborators, built once at startup
struct Bot {
    config: BotConfig,
    db: Database,
    market: TwelveDataClient,
    notifier: TelegramNotifier,
    log: SqliteDetectionLog,
}

impl Bot {
    async fn from_env() -> anyhow::Result<Self> {
        let config = BotConfig::from_env()?;
        let credentials = Credentials::from_env()?;

        let db = Database::new(&config.db_path).await.map_err(|e| {
            error!("Failed to initialize database: {}", e);
            anyhow::anyhow!("Database initialization failed: {}", e)
        })?;
        info!("Database initialized: {}", config.db_path.display());

        let market = TwelveDataClient::new(credentials.market_data_api_key, config.http_timeout)?;
        let notifier = TelegramNotifier::new(credentials.telegram, config.http_timeout)?;
        let log = SqliteDetectionLog::new(db.pool_clone());

        Ok(Self {
            config,
            db,
            market,
            notifier,
            log,
        })
    }

    async fn sweep(&self) -> Result<SweepReport, SweepError> {
        let ctx = SweepContext {
            config: &self.config,
            market: &self.market,
            notifier: &self.notifier,
            log: &self.log,
        };
        run_sweep(&ctx, Utc::now()).await
    }
}

#[derive(Clone)]
struct AppState {
    bot: Arc<Bot>,
    /// Held for the duration of a sweep; a second trigger is rejected
    sweep_lock: Arc<Mutex<()>>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,gapwatch=debug,tower_http=debug")
    } else {
        EnvFilter::new("info,engine=info,gapwatch=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Run => {
            cmd_run().await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum trigger server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Gapwatch v{} starting...", APP_VERSION);

    let bot = Bot::from_env().await?;
    let state = AppState {
        bot: Arc::new(bot),
        sweep_lock: Arc::new(Mutex::new(())),
    };

    let app = Router::new()
        .route("/", get(api_alive))
        .route("/health", get(api_health))
        .route("/run", get(api_run))
        .route("/detections", get(api_detections))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Gapwatch v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /             - Liveness");
    println!("  GET  /health       - Health check");
    println!("  GET  /run          - Run one sweep");
    println!("  GET  /detections   - Detection log (?outcome=pending&limit=50)");
    println!("\n  Pairs: {}", state.bot.config.pairs.join(", "));
    println!("  Database: {}", state.bot.config.db_path.display());
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Run command — one sweep from CLI
// ============================================================================

async fn cmd_run() -> anyhow::Result<()> {
    info!("Gapwatch v{} single run", APP_VERSION);

    let bot = Bot::from_env().await?;
    let report = bot.sweep().await.map_err(|e| {
        error!(error = %e, "Sweep failed");
        anyhow::anyhow!("Sweep failed: {}", e)
    })?;

    println!("{}", report);
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / — liveness
async fn api_alive() -> &'static str {
    "Gapwatch is alive ✅"
}

/// GET /health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "gapwatch",
        "version": APP_VERSION,
    }))
}

/// GET /run — one synchronous sweep
async fn api_run(State(state): State<AppState>) -> (StatusCode, String) {
    guarded_sweep(&state.sweep_lock, state.bot.sweep()).await
}

/// Run `sweep` unless another holds `lock`: 200 with the report, 500 on a
/// run-level failure, 409 when busy
async fn guarded_sweep<F>(lock: &Mutex<()>, sweep: F) -> (StatusCode, String)
where
    F: Future<Output = Result<SweepReport, SweepError>>,
{
    let Ok(_guard) = lock.try_lock() else {
        warn!("Sweep requested while another is running");
        return (
            StatusCode::CONFLICT,
            "Sweep already in progress".to_string(),
        );
    };

    match sweep.await {
        Ok(report) => (StatusCode::OK, format!("Sweep complete 👌 {}", report)),
        Err(e) => {
            error!(error = %e, "Sweep failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Sweep error: {}", e),
            )
        }
    }
}

#[derive(Deserialize)]
struct DetectionsQuery {
    outcome: Option<String>,
    limit: Option<i64>,
}

/// GET /detections — most recent log rows first
async fn api_detections(
    State(state): State<AppState>,
    Query(params): Query<DetectionsQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let repo = DetectionRepository::new(state.bot.db.pool());
    match repo.list_recent(params.outcome.as_deref(), limit).await {
        Ok(records) => Ok(Json(serde_json::json!({
            "success": true,
            "count": records.len(),
            "data": records,
        }))),
        Err(e) => {
            error!(error = %e, "Failed to list detections");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
