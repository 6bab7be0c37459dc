//! Local image store: a flat directory of `<timestamp><format>` files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Error;
use crate::timestamp::{self, Timestamp};

/// Create `path` if absent. Returns whether the directory exists afterwards.
pub fn ensure_dir(path: &Path) -> bool {
    match require_dir(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path.display(), "{err}");
            false
        }
    }
}

/// Like [`ensure_dir`] but reports why the directory is unusable.
///
/// # Errors
/// Returns [`Error::StoreUnavailable`] if the directory is missing and cannot be created.
pub fn require_dir(path: &Path) -> Result<(), Error> {
    if path.is_dir() {
        return Ok(());
    }
    debug!(path = %path.display(), "creating directory");
    fs::create_dir_all(path).map_err(|source| Error::StoreUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

/// All files directly under `store` whose name ends with `suffix`, ascending by name.
///
/// Unreadable entries inside the store are logged and skipped.
///
/// # Errors
/// Returns [`Error::StoreUnavailable`] if the store is missing and cannot be
/// created, or if the directory itself cannot be read.
pub fn list(store: &Path, suffix: &str) -> Result<Vec<PathBuf>, Error> {
    require_dir(store)?;
    let mut out = Vec::new();
    for entry in WalkDir::new(store).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("store walk failed"));
                return Err(Error::StoreUnavailable {
                    path: store.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                warn!(store = %store.display(), "skipping unreadable entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_file()
            && entry.file_name().to_str().is_some_and(|n| n.ends_with(suffix))
        {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

/// [`list`] with each file's timestamp. Names that do not decode are skipped.
pub fn list_decoded(store: &Path, suffix: &str) -> Result<Vec<(PathBuf, Timestamp)>, Error> {
    Ok(list(store, suffix)?
        .into_iter()
        .filter_map(|path| match timestamp::decode(&path) {
            Ok(ts) => Some((path, ts)),
            Err(err) => {
                warn!(path = %path.display(), "skipping stored file: {err}");
                None
            }
        })
        .collect())
}

/// Stored files whose timestamp is at or above `floor`, ascending.
pub fn list_at_or_above(
    store: &Path,
    suffix: &str,
    floor: Timestamp,
) -> Result<Vec<(PathBuf, Timestamp)>, Error> {
    Ok(list_decoded(store, suffix)?
        .into_iter()
        .filter(|(_, ts)| *ts >= floor)
        .collect())
}

/// Stored files no older than `window_minutes` before now, ascending.
pub fn list_within_window(
    store: &Path,
    suffix: &str,
    window_minutes: u32,
) -> Result<Vec<(PathBuf, Timestamp)>, Error> {
    list_within_window_at(store, suffix, window_minutes, Utc::now())
}

/// [`list_within_window`] against a caller-supplied `now`.
pub fn list_within_window_at(
    store: &Path,
    suffix: &str,
    window_minutes: u32,
    now: DateTime<Utc>,
) -> Result<Vec<(PathBuf, Timestamp)>, Error> {
    list_at_or_above(store, suffix, timestamp::encode_at(now, window_minutes))
}

/// Newest stored file and its timestamp, if any.
pub fn newest(store: &Path, suffix: &str) -> Result<Option<(PathBuf, Timestamp)>, Error> {
    Ok(list_decoded(store, suffix)?.pop())
}

/// Canonical location for an image with timestamp `ts`.
#[must_use]
pub fn canonical_path(store: &Path, ts: Timestamp, format: &str) -> PathBuf {
    store.join(ts.file_name(format))
}

pub(crate) fn delete_if_exists(p: &Path) -> std::io::Result<()> {
    match fs::remove_file(p) {
        Ok(()) => {
            info!(path = %p.display(), "deleted");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %p.display(), "delete: file vanished; skipping");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
