//! Binary entrypoint for sat-loop.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use sat_loop::catalog::HttpCatalog;
use sat_loop::config::Configuration;
use sat_loop::sink::{FrameSink, GifExporter, SnapshotRenderer};
use sat_loop::store;
use sat_loop::tasks::{poller, viewer};
use sat_loop::{SyncOptions, WindowSynchronizer};

#[derive(Debug, Parser)]
#[command(name = "sat-loop", version, about = "Rolling satellite image loop")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll for new images, prune old ones and keep the exported GIF current
    Run,
    /// Run a single poll cycle and exit
    Once,
    /// Loop over the window, writing each frame to the snapshot file
    View,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("sat_loop={level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn catalog_from(cfg: &Configuration) -> Result<HttpCatalog> {
    let url = cfg
        .downloader
        .data_url
        .clone()
        .context("downloader.data-url is required to fetch images")?;
    HttpCatalog::new(url, cfg.link_match_suffix(), cfg.downloader.request_timeout)
        .context("building HTTP client")
}

fn exporter_from(cfg: &Configuration) -> Result<Option<GifExporter>> {
    let Some(path) = cfg.export.output_path() else {
        return Ok(None);
    };
    if let Some(dir) = &cfg.export.directory {
        ensure!(
            store::ensure_dir(dir),
            "export directory unavailable: {}",
            dir.display()
        );
    }
    Ok(Some(GifExporter::new(path, cfg.export.frame_delay)))
}

fn shutdown_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let Ok(mut term) = signal(SignalKind::terminate()) else {
                let _ = tokio::signal::ctrl_c().await;
                cancel.cancel();
                return;
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("shutdown requested");
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("validating configuration")?;
    info!(
        store = %cfg.image_data_location.display(),
        window_mins = cfg.display_window_mins,
        "loaded configuration"
    );

    let sync = WindowSynchronizer::new(SyncOptions::from(&cfg));
    let cancel = CancellationToken::new();
    shutdown_on_signal(cancel.clone());

    match cli.command {
        Command::Run => {
            let source = catalog_from(&cfg)?;
            let mut exporter = exporter_from(&cfg)?;
            let sink = exporter.as_mut().map(|e| e as &mut dyn FrameSink);
            poller::run(sync, &source, sink, cfg.downloader.poll_interval, cancel).await?;
        }
        Command::Once => {
            let source = catalog_from(&cfg)?;
            let mut exporter = exporter_from(&cfg)?;
            let sink = exporter.as_mut().map(|e| e as &mut dyn FrameSink);
            let mut sync = sync;
            let report = poller::run_once(&mut sync, &source, sink).await?;
            info!(
                downloaded = report.ingest.downloaded.len(),
                evicted = report.evicted.len(),
                window = sync.window().len(),
                exported = report.exported,
                "cycle complete"
            );
        }
        Command::View => {
            let source = match cfg.downloader.data_url {
                Some(_) => Some(catalog_from(&cfg)?),
                None => None,
            };
            let renderer = SnapshotRenderer::new(&cfg.display.snapshot_path);
            viewer::run(
                sync,
                source.as_ref(),
                renderer,
                cfg.display.frame_interval,
                cancel,
            )
            .await?;
        }
    }
    Ok(())
}
