use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::{DynamicImage, ImageReader, RgbImage};
use tracing::debug;

use crate::config::ImageDimensions;
use crate::error::Error;
use crate::timestamp::{self, Timestamp};

/// Size and modification time of a stored file, used to notice rewrites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    /// Stamp of `path` as it is on disk now, or `None` if it cannot be read.
    #[must_use]
    pub fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// A decoded image admitted into the window.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub timestamp: Timestamp,
    pub pixels: RgbImage,
    /// On-disk stamp at the time of decoding.
    pub stamp: FileStamp,
}

impl ImageRecord {
    /// Decode `path` and check it is 8-bit RGB of exactly `dims`.
    ///
    /// Images with an alpha channel, grayscale, 16-bit samples or other
    /// dimensions are rejected rather than converted.
    pub fn load(path: &Path, dims: ImageDimensions) -> Result<Self, Error> {
        let timestamp = timestamp::decode(path)?;
        let stamp = FileStamp::of(path).unwrap_or_default();
        let decode_failure = |source| Error::DecodeFailure {
            path: path.to_path_buf(),
            source,
        };
        let img = ImageReader::open(path)
            .map_err(|e| decode_failure(image::ImageError::IoError(e)))?
            .with_guessed_format()
            .map_err(|e| decode_failure(image::ImageError::IoError(e)))?
            .decode()
            .map_err(decode_failure)?;

        let mismatch = |img: &DynamicImage| Error::ShapeMismatch {
            path: path.to_path_buf(),
            width: img.width(),
            height: img.height(),
            channels: img.color().channel_count(),
            expected_width: dims.width,
            expected_height: dims.height,
        };
        let pixels = match img {
            DynamicImage::ImageRgb8(rgb)
                if rgb.width() == dims.width && rgb.height() == dims.height =>
            {
                rgb
            }
            other => return Err(mismatch(&other)),
        };
        debug!(path = %path.display(), "decoded image");
        Ok(Self {
            path: path.to_path_buf(),
            timestamp,
            pixels,
            stamp,
        })
    }
}
