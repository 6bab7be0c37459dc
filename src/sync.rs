//! The windowed image set: which remote files to fetch, which stored files to
//! drop, and the ordered in-memory view handed to sinks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::catalog::RemoteSource;
use crate::config::{Configuration, CorruptImagePolicy, ImageDimensions};
use crate::error::Error;
use crate::events::{CycleReport, IngestReport, ReloadReport, WindowEvent};
use crate::record::{FileStamp, ImageRecord};
use crate::sink::FrameSink;
use crate::store;
use crate::timestamp::{self, Timestamp};

/// Settings the synchronizer needs, lifted out of [`Configuration`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub store: PathBuf,
    pub format: String,
    pub dimensions: ImageDimensions,
    pub window_minutes: u32,
    pub delete_old_data: bool,
    pub keep_most_recent: bool,
    pub on_corrupt: CorruptImagePolicy,
}

impl From<&Configuration> for SyncOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            store: cfg.image_data_location.clone(),
            format: cfg.image_format.clone(),
            dimensions: cfg.image_size,
            window_minutes: cfg.display_window_mins,
            delete_old_data: cfg.downloader.delete_old_data,
            keep_most_recent: cfg.downloader.keep_most_recent,
            on_corrupt: cfg.on_corrupt_image,
        }
    }
}

/// Owns the window, the download watermark and the export dirty flag.
///
/// Every method takes `now` explicitly; the drivers pass `Utc::now()`.
#[derive(Debug)]
pub struct WindowSynchronizer {
    opts: SyncOptions,
    /// Candidates at or below this are never fetched.
    baseline: Option<Timestamp>,
    /// Timestamps downloaded by this process that are still inside the window.
    admitted: BTreeSet<Timestamp>,
    last_seen: Option<Timestamp>,
    window: Vec<ImageRecord>,
    dirty: bool,
}

impl WindowSynchronizer {
    #[must_use]
    pub fn new(opts: SyncOptions) -> Self {
        Self {
            opts,
            baseline: None,
            admitted: BTreeSet::new(),
            last_seen: None,
            window: Vec::new(),
            // No artifact exists yet.
            dirty: true,
        }
    }

    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.opts
    }

    /// Current window, ascending by timestamp.
    #[must_use]
    pub fn window(&self) -> &[ImageRecord] {
        &self.window
    }

    /// Highest timestamp ever admitted, including the startup baseline.
    #[must_use]
    pub fn last_seen(&self) -> Option<Timestamp> {
        self.last_seen
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn floor(&self, now: DateTime<Utc>) -> Timestamp {
        timestamp::encode_at(now, self.opts.window_minutes)
    }

    /// Check the store and set the download baseline.
    ///
    /// The baseline is the window floor, or the newest stored file if that is
    /// later, so a restart does not fetch what is already on disk.
    ///
    /// # Errors
    /// Returns [`Error::StoreUnavailable`] if the store cannot be created.
    pub fn prime(&mut self, now: DateTime<Utc>) -> Result<Timestamp, Error> {
        store::require_dir(&self.opts.store)?;
        let mut baseline = self.floor(now);
        match store::newest(&self.opts.store, &self.opts.format)? {
            Some((path, ts)) => {
                debug!(path = %path.display(), "newest stored image");
                baseline = baseline.max(ts);
            }
            None => warn!(store = %self.opts.store.display(), "no stored images were found"),
        }
        self.baseline = Some(baseline);
        self.last_seen = self.last_seen.max(Some(baseline));
        debug!(%baseline, "initial data timestamp");
        Ok(baseline)
    }

    fn is_eligible(&self, ts: Timestamp, floor: Timestamp) -> bool {
        self.baseline.is_none_or(|b| ts > b) && ts >= floor && !self.admitted.contains(&ts)
    }

    /// Download every listed image that is new and inside the window.
    ///
    /// When several candidates carry the same minute only the last one listed
    /// is fetched. A failed download leaves that timestamp eligible for the next cycle even
    /// when a later candidate succeeds. Catalog failures yield an empty report.
    pub async fn ingest<S: RemoteSource>(&mut self, source: &S, now: DateTime<Utc>) -> IngestReport {
        let mut report = IngestReport::default();
        let floor = self.floor(now);
        self.admitted = self.admitted.split_off(&floor);

        let urls = match source.candidates().await {
            Ok(urls) => urls,
            Err(err) => {
                warn!("data query failed: {err}");
                report.catalog_unavailable = true;
                return report;
            }
        };

        // One candidate per minute; the later listing entry wins.
        let mut candidates: BTreeMap<Timestamp, String> = BTreeMap::new();
        for url in urls {
            match source.timestamp_of(&url) {
                Ok(ts) => {
                    if let Some(prev) = candidates.insert(ts, url) {
                        debug!(%ts, superseded = %prev, "duplicate candidate for the same minute");
                    }
                }
                Err(err) => {
                    warn!(url = %url, "skipping candidate: {err}");
                    report.malformed.push(url);
                }
            }
        }

        for (ts, url) in candidates {
            if !self.is_eligible(ts, floor) {
                continue;
            }
            let dest = store::canonical_path(&self.opts.store, ts, &self.opts.format);
            info!(url = %url, "downloading");
            match source.download(&url, &dest).await {
                Ok(()) => {
                    self.admitted.insert(ts);
                    self.last_seen = self.last_seen.max(Some(ts));
                    self.dirty = true;
                    report.downloaded.push(ts);
                }
                Err(err) => {
                    warn!(url = %url, "download failed: {err}");
                    report.failed.push(url);
                }
            }
        }
        report
    }

    /// Delete stored files older than the window floor.
    ///
    /// With `keep_most_recent` the newest stored file survives regardless of age.
    /// Does nothing unless `delete_old_data` is set.
    ///
    /// # Errors
    /// Returns [`Error::StoreUnavailable`] if the store cannot be listed.
    pub fn evict(&mut self, now: DateTime<Utc>) -> Result<Vec<PathBuf>, Error> {
        if !self.opts.delete_old_data {
            return Ok(Vec::new());
        }
        let floor = self.floor(now);
        let mut stored = store::list_decoded(&self.opts.store, &self.opts.format)?;
        if self.opts.keep_most_recent {
            stored.pop();
        }
        let mut deleted = Vec::new();
        for (path, ts) in stored {
            if ts >= floor {
                break;
            }
            match store::delete_if_exists(&path) {
                Ok(()) => deleted.push(path),
                Err(err) => warn!(path = %path.display(), "failed to delete: {err}"),
            }
        }
        Ok(deleted)
    }

    /// Reconcile the window with the stored files inside the floor.
    ///
    /// Records for files no longer listed are dropped; new files are decoded and
    /// inserted in order. Loaded files are decoded again only when their size or
    /// modification time changed.
    ///
    /// # Errors
    /// Returns [`Error::StoreUnavailable`] if the store cannot be listed.
    pub fn reload(&mut self, now: DateTime<Utc>) -> Result<ReloadReport, Error> {
        let listed = store::list_within_window_at(
            &self.opts.store,
            &self.opts.format,
            self.opts.window_minutes,
            now,
        )?;
        let mut report = ReloadReport::default();

        let on_disk: HashMap<&Path, Option<FileStamp>> = listed
            .iter()
            .map(|(p, _)| (p.as_path(), FileStamp::of(p)))
            .collect();
        let mut removed = Vec::new();
        let mut stale = HashSet::new();
        self.window.retain(|rec| match on_disk.get(rec.path.as_path()) {
            None => {
                removed.push(rec.path.clone());
                false
            }
            Some(Some(stamp)) if *stamp != rec.stamp => {
                stale.insert(rec.path.clone());
                false
            }
            Some(_) => true,
        });
        for path in removed {
            debug!(path = %path.display(), "unloading old image");
            report.events.push(WindowEvent::ImageRemoved(path));
        }

        let loaded: HashSet<PathBuf> = self.window.iter().map(|r| r.path.clone()).collect();
        let fresh: Vec<&(PathBuf, Timestamp)> =
            listed.iter().filter(|(p, _)| !loaded.contains(p)).collect();
        if !fresh.is_empty() {
            debug!(count = fresh.len(), "new images were found");
        }
        for (path, ts) in fresh {
            let replaced = stale.remove(path);
            match ImageRecord::load(path, self.opts.dimensions) {
                Ok(rec) => {
                    let at = self.window.partition_point(|r| r.timestamp < rec.timestamp);
                    self.window.insert(at, rec);
                    report.events.push(if replaced {
                        debug!(path = %path.display(), "image rewritten on disk");
                        WindowEvent::ImageReplaced(path.clone())
                    } else {
                        WindowEvent::ImageAdded(path.clone())
                    });
                }
                Err(err) => {
                    warn!(path = %path.display(), "unable to read image: {err}");
                    report.rejected = Some(path.clone());
                    if replaced {
                        report.events.push(WindowEvent::ImageRemoved(path.clone()));
                    }
                    if self.opts.on_corrupt == CorruptImagePolicy::Truncate {
                        let cut = *ts;
                        let mut dropped = Vec::new();
                        self.window.retain(|r| {
                            let stays = r.timestamp < cut;
                            if !stays {
                                dropped.push(r.path.clone());
                            }
                            stays
                        });
                        report
                            .events
                            .extend(dropped.into_iter().map(WindowEvent::ImageRemoved));
                        break;
                    }
                }
            }
        }
        // Rewritten files past a truncation point are gone from the window too.
        let mut leftover: Vec<PathBuf> = stale.into_iter().collect();
        leftover.sort();
        report
            .events
            .extend(leftover.into_iter().map(WindowEvent::ImageRemoved));

        if report.changed() {
            self.dirty = true;
        }
        Ok(report)
    }

    /// Hand the window to `sink` if it changed since the last successful export.
    pub fn export<K: FrameSink + ?Sized>(&mut self, sink: &mut K) -> bool {
        if !self.dirty || self.window.is_empty() {
            return false;
        }
        match sink.export(&self.window) {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(err) => {
                warn!("export failed; will retry next cycle: {err}");
                false
            }
        }
    }

    /// Ingest (when a source is given), evict, then reload.
    pub async fn refresh<S: RemoteSource>(
        &mut self,
        source: Option<&S>,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        if let Some(source) = source {
            report.ingest = self.ingest(source, now).await;
        }
        match self.evict(now) {
            Ok(deleted) => report.evicted = deleted,
            Err(err) => error!("cleanup failed: {err}"),
        }
        match self.reload(now) {
            Ok(reload) => report.reload = reload,
            Err(err) => error!("reload failed: {err}"),
        }
        report
    }

    /// One full poll cycle: ingest, evict, reload and export.
    pub async fn run_cycle<S: RemoteSource, K: FrameSink + ?Sized>(
        &mut self,
        source: &S,
        sink: Option<&mut K>,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let mut report = self.refresh(Some(source), now).await;
        if let Some(sink) = sink {
            report.exported = self.export(sink);
        }
        debug!(
            downloaded = report.ingest.downloaded.len(),
            evicted = report.evicted.len(),
            window = self.window.len(),
            exported = report.exported,
            "cycle complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, SinkError};
    use chrono::TimeZone;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    const DIMS: ImageDimensions = ImageDimensions {
        width: 10,
        height: 10,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 12, 20, 45, 0).unwrap()
    }

    fn opts(store: &Path) -> SyncOptions {
        SyncOptions {
            store: store.to_path_buf(),
            format: ".png".into(),
            dimensions: DIMS,
            window_minutes: 60,
            delete_old_data: true,
            keep_most_recent: true,
            on_corrupt: CorruptImagePolicy::Truncate,
        }
    }

    fn write_rgb(store: &Path, minutes_ago: u32) -> PathBuf {
        let ts = timestamp::encode_at(now(), minutes_ago);
        let path = store::canonical_path(store, ts, ".png");
        RgbImage::from_pixel(10, 10, Rgb([minutes_ago as u8, 0, 0]))
            .save(&path)
            .unwrap();
        path
    }

    fn write_rgba(store: &Path, minutes_ago: u32) -> PathBuf {
        let ts = timestamp::encode_at(now(), minutes_ago);
        let path = store::canonical_path(store, ts, ".png");
        RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }

    /// Serves fixed URLs; each download writes a valid image unless listed in `broken`.
    /// The red channel of a download is its URL's position in the listing plus one.
    struct FakeSource {
        urls: Vec<String>,
        broken: Mutex<Vec<String>>,
        downloads: Mutex<Vec<String>>,
    }

    const BASE: &str = "http://sat/";
    const SUFFIX: &str = "_geo-10x10.png";

    impl FakeSource {
        fn new(minutes_ago: &[u32]) -> Self {
            Self {
                urls: minutes_ago
                    .iter()
                    .map(|m| format!("{BASE}{}{SUFFIX}", timestamp::encode_at(now(), *m)))
                    .collect(),
                broken: Mutex::new(Vec::new()),
                downloads: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteSource for FakeSource {
        async fn candidates(&self) -> Result<Vec<String>, CatalogError> {
            Ok(self.urls.clone())
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<(), CatalogError> {
            self.downloads.lock().unwrap().push(url.to_string());
            if self.broken.lock().unwrap().iter().any(|b| b == url) {
                return Err(CatalogError::Io(std::io::Error::other("connection reset")));
            }
            let shade = self.urls.iter().position(|u| u == url).map_or(0, |i| i as u8 + 1);
            RgbImage::from_pixel(10, 10, Rgb([shade, 0, 0])).save(dest).map_err(|e| {
                CatalogError::Io(std::io::Error::other(e.to_string()))
            })?;
            Ok(())
        }

        fn timestamp_of(&self, url: &str) -> Result<Timestamp, Error> {
            crate::catalog::timestamp_of(url, BASE, SUFFIX)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        exports: Vec<usize>,
        fail: bool,
    }

    impl FrameSink for RecordingSink {
        fn export(&mut self, frames: &[ImageRecord]) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Empty);
            }
            self.exports.push(frames.len());
            Ok(())
        }
    }

    fn primed(dir: &TempDir) -> WindowSynchronizer {
        let mut sync = WindowSynchronizer::new(opts(dir.path()));
        sync.prime(now()).unwrap();
        sync
    }

    #[test]
    fn baseline_is_newest_stored_file_when_inside_window() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 10);
        let mut sync = WindowSynchronizer::new(opts(dir.path()));
        let baseline = sync.prime(now()).unwrap();
        assert_eq!(baseline, timestamp::encode_at(now(), 10));
        assert_eq!(sync.last_seen(), Some(baseline));
    }

    #[test]
    fn baseline_falls_back_to_window_floor() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 120);
        let mut sync = WindowSynchronizer::new(opts(dir.path()));
        assert_eq!(sync.prime(now()).unwrap(), timestamp::encode_at(now(), 60));
    }

    #[tokio::test]
    async fn repeated_ingest_downloads_once() {
        let dir = tempdir().unwrap();
        let mut sync = primed(&dir);
        let source = FakeSource::new(&[20, 10]);

        let first = sync.ingest(&source, now()).await;
        assert_eq!(first.downloaded.len(), 2);
        let watermark = sync.last_seen();
        assert_eq!(watermark, Some(timestamp::encode_at(now(), 10)));

        let second = sync.ingest(&source, now()).await;
        assert!(second.downloaded.is_empty());
        assert_eq!(sync.last_seen(), watermark);
        assert_eq!(source.downloads.lock().unwrap().len(), 2);

        sync.reload(now()).unwrap();
        sync.reload(now()).unwrap();
        assert_eq!(sync.window().len(), 2);
    }

    #[tokio::test]
    async fn candidates_outside_window_or_below_baseline_are_ignored() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 15);
        let mut sync = primed(&dir);
        let source = FakeSource::new(&[90, 30, 15, 5]);

        let report = sync.ingest(&source, now()).await;
        assert_eq!(report.downloaded, vec![timestamp::encode_at(now(), 5)]);
    }

    #[tokio::test]
    async fn same_minute_candidates_keep_the_later_listing() {
        let dir = tempdir().unwrap();
        let mut sync = primed(&dir);
        let mut source = FakeSource::new(&[10]);
        let ts = timestamp::encode_at(now(), 10);
        let mirror = format!("http://mirror/{ts}{SUFFIX}");
        source.urls.push(mirror.clone());

        let report = sync.ingest(&source, now()).await;
        assert_eq!(report.downloaded, vec![ts]);
        assert_eq!(*source.downloads.lock().unwrap(), vec![mirror]);

        sync.reload(now()).unwrap();
        assert_eq!(sync.window()[0].pixels.get_pixel(0, 0), &Rgb([2, 0, 0]));
    }

    #[tokio::test]
    async fn malformed_candidate_is_skipped() {
        let dir = tempdir().unwrap();
        let mut sync = primed(&dir);
        let mut source = FakeSource::new(&[20, 10]);
        source.urls.insert(1, format!("{BASE}latest{SUFFIX}"));

        let report = sync.ingest(&source, now()).await;
        assert_eq!(report.downloaded.len(), 2);
        assert_eq!(report.malformed, vec![format!("{BASE}latest{SUFFIX}")]);
    }

    #[tokio::test]
    async fn failed_download_is_retried_after_later_success() {
        let dir = tempdir().unwrap();
        let mut sync = primed(&dir);
        let source = FakeSource::new(&[20, 10]);
        let older = source.urls[0].clone();
        source.broken.lock().unwrap().push(older.clone());

        let first = sync.ingest(&source, now()).await;
        assert_eq!(first.failed, vec![older.clone()]);
        assert_eq!(first.downloaded, vec![timestamp::encode_at(now(), 10)]);

        source.broken.lock().unwrap().clear();
        let second = sync.ingest(&source, now()).await;
        assert_eq!(second.downloaded, vec![timestamp::encode_at(now(), 20)]);
        assert_eq!(sync.last_seen(), Some(timestamp::encode_at(now(), 10)));
    }

    #[test]
    fn evict_keeps_newest_when_configured() {
        let dir = tempdir().unwrap();
        let old = write_rgb(dir.path(), 120);
        let newest = write_rgb(dir.path(), 90);
        let mut sync = primed(&dir);

        let deleted = sync.evict(now()).unwrap();
        assert_eq!(deleted, vec![old.clone()]);
        assert!(newest.exists());
        assert!(!old.exists());
    }

    #[test]
    fn evict_removes_newest_when_not_kept() {
        let dir = tempdir().unwrap();
        let old = write_rgb(dir.path(), 120);
        let newest = write_rgb(dir.path(), 90);
        let fresh = write_rgb(dir.path(), 59);
        let mut o = opts(dir.path());
        o.keep_most_recent = false;
        let mut sync = WindowSynchronizer::new(o);

        let deleted = sync.evict(now()).unwrap();
        assert_eq!(deleted, vec![old, newest]);
        assert!(fresh.exists());

        fs::remove_file(&fresh).unwrap();
        let lone = write_rgb(dir.path(), 61);
        assert_eq!(sync.evict(now()).unwrap(), vec![lone]);
    }

    #[test]
    fn evict_is_disabled_without_delete_old_data() {
        let dir = tempdir().unwrap();
        let old = write_rgb(dir.path(), 120);
        write_rgb(dir.path(), 1);
        let mut o = opts(dir.path());
        o.delete_old_data = false;
        let mut sync = WindowSynchronizer::new(o);
        assert!(sync.evict(now()).unwrap().is_empty());
        assert!(old.exists());
    }

    #[test]
    fn reload_diffs_by_path() {
        let dir = tempdir().unwrap();
        let a = write_rgb(dir.path(), 30);
        let b = write_rgb(dir.path(), 20);
        let mut sync = primed(&dir);

        let first = sync.reload(now()).unwrap();
        assert_eq!(
            first.events,
            vec![WindowEvent::ImageAdded(a.clone()), WindowEvent::ImageAdded(b.clone())]
        );

        fs::remove_file(&a).unwrap();
        let c = write_rgb(dir.path(), 10);
        let second = sync.reload(now()).unwrap();
        assert_eq!(
            second.events,
            vec![WindowEvent::ImageRemoved(a), WindowEvent::ImageAdded(c.clone())]
        );
        let paths: Vec<&Path> = sync.window().iter().map(|r| r.path.as_path()).collect();
        assert_eq!(paths, vec![b.as_path(), c.as_path()]);
    }

    #[test]
    fn reload_decodes_rewritten_file_again() {
        let dir = tempdir().unwrap();
        let path = write_rgb(dir.path(), 10);
        let mut sync = primed(&dir);
        sync.reload(now()).unwrap();
        sync.export(&mut RecordingSink::default());
        assert!(!sync.is_dirty());

        RgbImage::from_pixel(10, 10, Rgb([200, 100, 50])).save(&path).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
            .unwrap();

        let report = sync.reload(now()).unwrap();
        assert_eq!(report.events, vec![WindowEvent::ImageReplaced(path)]);
        assert_eq!(sync.window().len(), 1);
        assert_eq!(sync.window()[0].pixels.get_pixel(0, 0), &Rgb([200, 100, 50]));
        assert!(sync.is_dirty());

        assert!(sync.reload(now()).unwrap().events.is_empty());
    }

    #[test]
    fn reload_ages_records_out() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 50);
        let kept = write_rgb(dir.path(), 5);
        let mut sync = primed(&dir);
        sync.reload(now()).unwrap();
        assert_eq!(sync.window().len(), 2);

        let later = now() + chrono::Duration::minutes(20);
        sync.reload(later).unwrap();
        assert_eq!(sync.window().len(), 1);
        assert_eq!(sync.window()[0].path, kept);
    }

    #[test]
    fn reload_truncates_at_bad_shape() {
        let dir = tempdir().unwrap();
        let a = write_rgb(dir.path(), 40);
        write_rgba(dir.path(), 30);
        write_rgb(dir.path(), 20);
        let mut sync = primed(&dir);

        let report = sync.reload(now()).unwrap();
        assert!(report.rejected.is_some());
        assert_eq!(sync.window().len(), 1);
        assert_eq!(sync.window()[0].path, a);
    }

    #[test]
    fn truncation_drops_records_loaded_after_the_bad_file() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 40);
        write_rgb(dir.path(), 20);
        let mut sync = primed(&dir);
        sync.reload(now()).unwrap();
        assert_eq!(sync.window().len(), 2);

        let bad = write_rgba(dir.path(), 30);
        let report = sync.reload(now()).unwrap();
        assert_eq!(report.rejected, Some(bad));
        assert_eq!(sync.window().len(), 1);
    }

    #[test]
    fn skip_policy_loads_past_bad_file() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 40);
        write_rgba(dir.path(), 30);
        write_rgb(dir.path(), 20);
        let mut o = opts(dir.path());
        o.on_corrupt = CorruptImagePolicy::Skip;
        let mut sync = WindowSynchronizer::new(o);

        sync.reload(now()).unwrap();
        assert_eq!(sync.window().len(), 2);
    }

    #[tokio::test]
    async fn export_clears_dirty_and_retries_on_failure() {
        let dir = tempdir().unwrap();
        write_rgb(dir.path(), 10);
        let mut sync = primed(&dir);
        let source = FakeSource::new(&[]);

        let mut failing = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let report = sync.run_cycle(&source, Some(&mut failing), now()).await;
        assert!(!report.exported);
        assert!(sync.is_dirty());

        let mut sink = RecordingSink::default();
        let report = sync.run_cycle(&source, Some(&mut sink), now()).await;
        assert!(report.exported);
        assert!(!sync.is_dirty());
        assert_eq!(sink.exports, vec![1]);

        let report = sync.run_cycle(&source, Some(&mut sink), now()).await;
        assert!(!report.exported);
        assert_eq!(sink.exports.len(), 1);
    }

    #[tokio::test]
    async fn empty_window_is_never_exported() {
        let dir = tempdir().unwrap();
        let mut sync = primed(&dir);
        let mut sink = RecordingSink::default();
        let report = sync
            .run_cycle(&FakeSource::new(&[]), Some(&mut sink), now())
            .await;
        assert!(!report.exported);
        assert!(sink.exports.is_empty());
    }
}
