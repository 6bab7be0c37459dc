use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::catalog::RemoteSource;
use crate::sink::FrameSink;
use crate::sync::WindowSynchronizer;

/// Poll the catalog forever: ingest, evict, reload, export, sleep.
///
/// Steady-state failures are logged inside the cycle; only an unusable store
/// at startup ends the task with an error.
#[instrument(skip_all, fields(store = %sync.options().store.display()))]
pub async fn run<S: RemoteSource>(
    mut sync: WindowSynchronizer,
    source: &S,
    mut sink: Option<&mut dyn FrameSink>,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<WindowSynchronizer> {
    sync.prime(Utc::now()).context("image store unavailable")?;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        sync.run_cycle(source, sink.as_deref_mut(), Utc::now()).await;

        info!(
            window = sync.window().len(),
            "sleeping for {}",
            humantime::format_duration(poll_interval)
        );
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting poller");
                break;
            }
            _ = sleep(poll_interval) => {}
        }
    }
    Ok(sync)
}

/// Prime and run exactly one cycle.
pub async fn run_once<S: RemoteSource>(
    sync: &mut WindowSynchronizer,
    source: &S,
    sink: Option<&mut dyn FrameSink>,
) -> Result<crate::events::CycleReport> {
    sync.prime(Utc::now()).context("image store unavailable")?;
    Ok(sync.run_cycle(source, sink, Utc::now()).await)
}
