use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::select;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::RemoteSource;
use crate::error::Error;
use crate::sink::FrameRenderer;
use crate::sync::WindowSynchronizer;

/// Loops over the window one frame per tick, refreshing it each time the
/// sequence wraps back to the first frame.
#[derive(Debug, Default)]
pub struct LiveView {
    next: usize,
    shown: usize,
}

impl LiveView {
    /// Initial load.
    ///
    /// # Errors
    /// Returns [`Error::NoImagesFound`] if nothing inside the window decodes,
    /// or [`Error::StoreUnavailable`] if the store cannot be read.
    pub fn start(sync: &mut WindowSynchronizer, now: DateTime<Utc>) -> Result<Self, Error> {
        sync.prime(now)?;
        sync.reload(now)?;
        if sync.window().is_empty() {
            let store = sync.options().store.clone();
            error!(store = %store.display(), "no images were found");
            return Err(Error::NoImagesFound(store));
        }
        info!(count = sync.window().len(), "found images on initial load");
        Ok(Self::default())
    }

    /// Show the next frame. Returns the path shown, if any.
    pub async fn advance<S: RemoteSource, R: FrameRenderer>(
        &mut self,
        sync: &mut WindowSynchronizer,
        source: Option<&S>,
        renderer: &mut R,
        now: DateTime<Utc>,
    ) -> Option<PathBuf> {
        if self.next >= sync.window().len() {
            self.next = 0;
        }
        if self.next == 0 && self.shown > 0 {
            debug!(
                count = sync.window().len(),
                "checking for new imagery"
            );
            sync.refresh(source, now).await;
        }
        let Some(frame) = sync.window().get(self.next) else {
            warn!("window is empty; nothing to show");
            return None;
        };
        if let Err(err) = renderer.show(frame) {
            warn!(path = %frame.path.display(), "render failed: {err}");
        }
        let shown = frame.path.clone();
        self.next += 1;
        self.shown += 1;
        Some(shown)
    }
}

/// Live-view driver: initial load, then one frame per `frame_interval` until cancelled.
#[instrument(skip_all, fields(store = %sync.options().store.display()))]
pub async fn run<S: RemoteSource, R: FrameRenderer>(
    mut sync: WindowSynchronizer,
    source: Option<&S>,
    mut renderer: R,
    frame_interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut view = LiveView::start(&mut sync, Utc::now())?;
    let mut ticker = interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting live view");
                break;
            }
            _ = ticker.tick() => {
                view.advance(&mut sync, source, &mut renderer, Utc::now()).await;
            }
        }
    }
    Ok(())
}
