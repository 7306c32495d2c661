//! Pagewing site server.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                       PAGEWING                         │
//!                    │                                                        │
//!   Client Request   │  ┌─────────┐    ┌──────────┐    ┌──────────────────┐  │
//!   ─────────────────┼─▶│  http   │───▶│   app    │───▶│     routing      │  │
//!                    │  │ server  │    │ dispatch │    │ static/api/page  │  │
//!                    │  └─────────┘    └──────────┘    └────────┬─────────┘  │
//!                    │                                          │            │
//!                    │                                          ▼            │
//!   Client Response  │  ┌─────────┐                    ┌──────────────────┐  │
//!   ◀────────────────┼──│response │◀───────────────────│  engine (render) │  │
//!                    │  └─────────┘                    │ ssg/render cache │  │
//!                    │                                 └────────▲─────────┘  │
//!                    │                                          │ generation │
//!   Source tree ─────┼─▶ lifecycle (watch/signal) ─▶ pipeline ──┘            │
//!                    │                                                        │
//!                    │  config · errors · observability · admin               │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use pagewing::app::Site;
use pagewing::config::{load_config, SiteConfig};
use pagewing::http::HttpServer;
use pagewing::http::response::json_success;
use pagewing::lifecycle::signals::spawn_signal_handler;
use pagewing::lifecycle::watcher::SourceWatcher;
use pagewing::lifecycle::{spawn_reload_loop, Shutdown};
use pagewing::observability;
use pagewing::routing::{api_fn, ApiError};

#[derive(Parser)]
#[command(name = "pagewing")]
#[command(about = "File-tree driven page server", long_about = None)]
struct Cli {
    /// Path to the site configuration file.
    #[arg(short, long, default_value = "pagewing.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the site and serve it (default)
    Serve,
    /// Compile the site once, print the error summary and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(&cli.config)?;

    observability::logging::init(&config.observability);
    tracing::info!(
        app = %config.site.app_name,
        version = %config.site.version,
        "pagewing v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Check => check(config).await,
        Commands::Serve => {
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// A missing file means defaults rooted at the working directory.
fn read_config(path: &Path) -> Result<SiteConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(load_config(path)?)
    } else {
        eprintln!("{} not found, using defaults", path.display());
        Ok(SiteConfig::default())
    }
}

fn build_site(config: SiteConfig) -> Arc<Site> {
    Site::builder(config)
        .api(
            "/health",
            Method::GET,
            api_fn(|ctx| async move {
                Ok::<_, ApiError>(json_success(json!({
                    "status": "ok",
                    "app": ctx.config.site.app_name,
                    "version": ctx.config.site.version,
                })))
            }),
        )
        .build()
}

async fn check(config: SiteConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let site = build_site(config);
    let report = site.reload().await?;
    let summary = site.errors().summary();

    println!(
        "generation {}: {} pages, {} failed, {} static, {} components ({} ms)",
        report.generation, report.pages, report.failed, report.static_pages, report.components, report.elapsed_ms
    );
    for record in summary.compile.iter().chain(&summary.runtime) {
        println!("  [{:?}] {} - {}", record.kind, record.key, record.detail);
    }

    if summary.compile.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn serve(config: SiteConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let site = build_site(config);

    // The first build is foundational; later failures keep the last good generation.
    site.reload().await?;

    let shutdown = Arc::new(Shutdown::new());
    let (reload_tx, reload_rx) = mpsc::channel(8);

    spawn_signal_handler(Arc::clone(&shutdown), reload_tx.clone());

    let config = Arc::clone(site.config());
    let _watcher = if config.dev.dev_mode && config.dev.live_reload {
        let watcher = SourceWatcher::new(
            vec![config.paths.app_dir.clone(), config.paths.static_dir.clone()],
            vec![
                config.paths.ssg_cache_dir.clone(),
                config.paths.static_dir.join("bundle.css"),
                config.paths.static_dir.join("bundle.js"),
            ],
            Duration::from_millis(config.dev.watch_debounce_ms),
        );
        match watcher.run(reload_tx.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start source watcher, live reload disabled");
                None
            }
        }
    } else {
        None
    };
    drop(reload_tx);

    let reload_loop = spawn_reload_loop(Arc::clone(&site), reload_rx, shutdown.subscribe());

    let server = HttpServer::new(Arc::clone(&site));
    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    let _ = reload_loop.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
