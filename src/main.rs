//! # Awful News Rewriter
//!
//! A keyword-driven content pipeline exposed over HTTP. A caller posts a
//! keyword, a task id and a callback address; the service finds several
//! distinct news articles for the keyword, extracts their text, rewrites each
//! one through an OpenAI-compatible LLM and posts a single report back.
//!
//! ## Usage
//!
//! ```sh
//! awful_news_rewriter -c ./config.yaml
//! curl -X POST localhost:8090/process \
//!   -H 'content-type: application/json' \
//!   -d '{"keyword":"giá vàng","taskId":"42","callbackAddress":"http://localhost:3000/cb"}'
//! ```
//!
//! ## Architecture
//!
//! Each accepted task runs in the background:
//! 1. **Discovery**: search backends produce candidate URLs (bing, duckduckgo, searxng)
//! 2. **Extraction**: domain rules, then density, structural and longest-block heuristics
//! 3. **Rewriting**: LLM call with retry on transient errors
//! 4. **Callback**: one POST with every slot's outcome
//!
//! Slots within a task run one after another; tasks run concurrently up to
//! `server.max_concurrent_tasks`.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use reqwest::Client;
use tracing::{info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod callback;
mod cli;
mod config;
mod discovery;
mod error;
mod extract;
mod fetch;
mod models;
mod orchestrator;
mod registry;
mod rewrite;
mod server;
mod slot;
mod utils;

use callback::CallbackReporter;
use cli::Cli;
use config::Config;
use discovery::DiscoveryCascade;
use extract::ExtractionCascade;
use fetch::HttpFetcher;
use orchestrator::TaskRunner;
use registry::TaskRegistry;
use server::AppState;
use slot::SlotProcessor;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "awful_news_rewriter starting up");

    // Parse CLI
    let args = Cli::parse();

    // ---- Load config ----
    let config = Config::load(args.config.as_deref().map(Path::new))?.apply_cli(&args);
    config.validate()?;
    info!(
        provider = %config.provider.name,
        model = %config.provider.model,
        slots = config.pipeline.slots,
        max_attempts = config.pipeline.max_attempts,
        max_concurrent_tasks = config.server.max_concurrent_tasks,
        rewrite_timeout = ?config.rewrite_timeout(),
        "Configuration loaded"
    );
    let config = Arc::new(config);

    // ---- Build pipeline ----
    let runner = Arc::new(build_runner(&config)?);
    let state = AppState::new(config.clone(), runner);
    let registry = state.registry.clone();

    server::serve(state).await?;

    // Accepted tasks still owe their callbacks.
    drain_tasks(&registry).await;

    info!(
        uptime_secs = start_time.elapsed().as_secs(),
        "awful_news_rewriter shut down"
    );
    Ok(())
}

fn build_runner(config: &Config) -> Result<TaskRunner, Box<dyn Error + Send + Sync>> {
    let web = Client::builder()
        .user_agent(config.extraction.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let api = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let discovery = Arc::new(DiscoveryCascade::from_config(config, web.clone()));
    let fetcher = Arc::new(HttpFetcher::from_config(config, web));
    let extractor = Arc::new(ExtractionCascade::from_config(&config.extraction));
    let rewriter = Arc::new(rewrite::from_config(api.clone(), &config.provider));
    let slots = SlotProcessor::new(
        discovery,
        fetcher,
        extractor,
        rewriter,
        config.pipeline.max_attempts,
    );

    let registry = Arc::new(TaskRegistry::new(config.registry_retention()));
    let reporter = CallbackReporter::from_config(config, api);
    Ok(TaskRunner::new(slots, registry, reporter))
}

/// Wait for running tasks to deliver their callbacks. A second Ctrl+C skips the wait.
async fn drain_tasks(registry: &TaskRegistry) {
    let mut last_logged = None;
    loop {
        let active = registry.active_count();
        if active == 0 {
            return;
        }
        if last_logged != Some(active) {
            info!(active, "Waiting for running tasks to finish");
            last_logged = Some(active);
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!(active, "Second interrupt; abandoning running tasks");
                return;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }
}
