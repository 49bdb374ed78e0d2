//! News ingestion service — Binary Entrypoint
//! Boots the Axum HTTP server and the background ingestion scheduler.

use news_intel_ingest::ingest::config::load_config_default;
use news_intel_ingest::metrics::Metrics;
use news_intel_ingest::{router, IngestRuntime};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
/// `try_init` keeps this a no-op when the host already installed a subscriber.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables INGEST_* and NEWSAPI_KEY from .env.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = load_config_default()?;
    let metrics = Metrics::init(config.interval_secs)?;
    let runtime = IngestRuntime::bootstrap(config).await?;

    // Startup run + periodic ticks, all behind the single-flight gate.
    runtime.start();

    let app = router(runtime.app_state()).merge(metrics.router());
    Ok(app.into())
}
