//! Dress market HTTP server.
//!
//! Serves the order and escrow API over PostgreSQL (or an in-memory store
//! for local runs) and ticks active rentals on a fixed interval.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use chrono::Duration as TokenTtl;
use dm_server::{
    api::{self, AppState},
    config::ServerConfig,
    jwt::JwtIdentity,
    logging, metrics,
};
use dress_market::{
    Database, MarketStore, MemoryStore, OrderManager, PgMarketStore, seed::seed_demo,
};
use pico_args::Arguments;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const HELP: &str = "\
Run the dress market order and escrow server

USAGE:
  dm_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --in-memory              Keep all state in memory instead of PostgreSQL (implies --seed)
  --seed                   Create the demo seller, buyer and listings if missing
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               HS256 secret shared with the identity service
  SUPPORT_API_KEY          Key expected in x-support-key on support endpoints
  RENTAL_DAYS              Length of a rental in days [default: 4]
  RENTAL_TICK_SECS         Seconds between rental ticks [default: 86400]
  (See .env file for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    in_memory: bool,
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let in_memory = pargs.contains("--in-memory");
    let args = Args {
        bind: pargs
            .opt_value_from_str("--bind")
            .context("Invalid --bind address")?,
        database_url: pargs
            .opt_value_from_str("--db-url")
            .context("Invalid --db-url")?,
        seed: pargs.contains("--seed") || in_memory,
        in_memory,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;

    let metrics_handle = match metrics::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let (store, database): (Arc<dyn MarketStore>, Option<Database>) = if args.in_memory {
        info!("Using in-memory store; all data is lost on shutdown");
        (Arc::new(MemoryStore::new()), None)
    } else {
        info!("Connecting to database...");
        let db = Database::new(&config.database)
            .await
            .context("Failed to connect to database")?;
        db.migrate().await.context("Failed to run migrations")?;
        info!("Database ready");
        (
            Arc::new(PgMarketStore::new(Arc::new(db.pool().clone()))),
            Some(db),
        )
    };

    let identity = Arc::new(JwtIdentity::new(&config.security.jwt_secret));
    let state = AppState::new(
        store,
        config.market,
        identity.clone(),
        &config.security.support_api_key,
        metrics_handle,
    );

    if args.seed {
        match seed_demo(&state.accounts, &state.inventory, &state.ledger).await? {
            Some(demo) => {
                info!(
                    "Seeded demo seller {} and buyer {} with {} listing(s)",
                    demo.seller.id,
                    demo.buyer.id,
                    demo.items.len()
                );
                for user in [&demo.seller, &demo.buyer] {
                    let token =
                        identity.issue_token(user.id, Some(user.email.clone()), TokenTtl::days(1))?;
                    info!("Demo token for {} ({}): {}", user.name, user.id, token);
                }
            }
            None => info!("Demo data already present"),
        }
    }

    let ticker = spawn_rental_ticker(state.orders.clone(), config.rental_tick);

    let app = api::create_router(state);

    info!("Starting HTTP server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    ticker.abort();
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Tick active rentals every `period`, starting one period after launch
fn spawn_rental_ticker(orders: Arc<OrderManager>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            match orders.tick_rentals().await {
                Ok(report) => {
                    metrics::rentals_overdue(report.overdue.len());
                    logging::log_rental_tick(&report);
                }
                Err(e) => error!("Rental tick failed: {}", e),
            }
        }
    })
}

/// Graceful shutdown signal (Ctrl+C, or SIGTERM on unix)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
