use std::{error::Error, fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use commission_ledger::{
    AppState, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, RetryPolicy, SweeperConfig,
    build_http_client, build_router, graceful_shutdown, logging_middleware, run_sweeper,
    run_webhook_worker, webhook_channel,
};

/// The transaction ledger server with its expiry sweeper and webhook worker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API and admin pages from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone used for the admin pages, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    local_timezone: String,

    /// Seconds between sweeps for stale pending transactions.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_secs: u64,

    /// Seconds a transaction may stay pending before the sweeper expires it.
    #[arg(long, default_value_t = 900)]
    pending_ttl_secs: u64,

    /// Seconds to wait for a webhook receiver to respond.
    #[arg(
        long,
        default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    webhook_timeout_secs: u64,

    /// The number of times to attempt each webhook delivery.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    webhook_max_attempts: u32,

    /// Seconds to wait between webhook delivery attempts.
    #[arg(long, default_value_t = 2)]
    webhook_backoff_secs: u64,

    /// The most notifications that may wait for delivery at once.
    #[arg(
        long,
        default_value_t = DEFAULT_QUEUE_CAPACITY as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    webhook_queue_capacity: u64,

    /// File path for the debug log.
    #[arg(long, default_value = "debug.log")]
    log_path: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_logging(&args.log_path)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let (webhook_queue, webhook_receiver) = webhook_channel(args.webhook_queue_capacity as usize);
    let conn = Connection::open(&args.db_path)?;
    let state = AppState::new(conn, &args.local_timezone, webhook_queue)?;

    let http_client = build_http_client(Duration::from_secs(args.webhook_timeout_secs))?;
    let retry_policy = RetryPolicy {
        max_attempts: args.webhook_max_attempts,
        backoff: Duration::from_secs(args.webhook_backoff_secs),
    };
    let worker = tokio::spawn(run_webhook_worker(
        http_client,
        webhook_receiver,
        retry_policy,
    ));

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let sweeper_config = SweeperConfig {
        interval: Duration::from_secs(args.sweep_interval_secs),
        pending_ttl: Duration::from_secs(args.pending_ttl_secs),
    };
    let sweeper = tokio::spawn(run_sweeper(
        state.clone(),
        sweeper_config,
        shutdown_receiver,
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    let serve_result = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await;

    // The worker drains the queue once the router and the sweeper have dropped their handles.
    let _ = shutdown_sender.send(true);
    if let Err(error) = sweeper.await {
        tracing::error!("The sweeper task failed: {error}");
    }

    match worker.await {
        Ok(summary) => tracing::info!(
            "Webhook worker finished: {} delivered, {} failed",
            summary.delivered,
            summary.failed
        ),
        Err(error) => tracing::error!("The webhook worker task failed: {error}"),
    }

    serve_result?;

    Ok(())
}

fn setup_logging(log_path: &str) -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router
        .layer(middleware::from_fn(logging_middleware))
        .layer(tracing_layer)
}
