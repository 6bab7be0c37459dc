use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde::de::{self, Deserializer};

/// Pixel dimensions written as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl FromStr for ImageDimensions {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .with_context(|| format!("image size {s:?} is not WIDTHxHEIGHT"))?;
        let width = w
            .trim()
            .parse()
            .with_context(|| format!("invalid width in image size {s:?}"))?;
        let height = h
            .trim()
            .parse()
            .with_context(|| format!("invalid height in image size {s:?}"))?;
        Ok(Self { width, height })
    }
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl<'de> Deserialize<'de> for ImageDimensions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: anyhow::Error| de::Error::custom(e))
    }
}

/// What a reload does when a file in the window fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptImagePolicy {
    /// Stop the reload and drop every record after the bad file.
    #[default]
    Truncate,
    /// Leave the bad file out and keep loading.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DownloaderOptions {
    /// Directory listing to poll for new images.
    pub data_url: Option<String>,
    /// Link text preceding the size tag, e.g. `GOES16-ABI-FD-GEOCOLOR-`.
    pub data_file_link_prefix: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Delete stored files that fall out of the window.
    pub delete_old_data: bool,
    /// Never delete the newest stored file, however old.
    pub keep_most_recent: bool,
}

impl Default for DownloaderOptions {
    fn default() -> Self {
        Self {
            data_url: None,
            data_file_link_prefix: String::new(),
            poll_interval: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
            delete_old_data: true,
            keep_most_recent: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExportOptions {
    /// Directory the animated GIF is written to. Export is off when unset.
    pub directory: Option<PathBuf>,
    pub file_name: String,
    #[serde(with = "humantime_serde")]
    pub frame_delay: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: "loop.gif".into(),
            frame_delay: Duration::from_millis(100),
        }
    }
}

impl ExportOptions {
    #[must_use]
    pub fn output_path(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|d| d.join(&self.file_name))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DisplayOptions {
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,
    /// Where the live view writes the current frame.
    pub snapshot_path: PathBuf,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(100),
            snapshot_path: PathBuf::from("current.png"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Dot-prefixed extension of stored images.
    pub image_format: String,
    /// Expected dimensions of every image.
    pub image_size: ImageDimensions,
    /// Flat directory holding `<timestamp><image-format>` files.
    pub image_data_location: PathBuf,
    /// Width of the retention/display window in minutes.
    pub display_window_mins: u32,
    pub on_corrupt_image: CorruptImagePolicy,
    pub downloader: DownloaderOptions,
    pub export: ExportOptions,
    pub display: DisplayOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.image_format.starts_with('.') && self.image_format.len() > 1,
            "image-format must be a dot-prefixed extension, got {:?}",
            self.image_format
        );
        ensure!(
            self.image_size.width > 0 && self.image_size.height > 0,
            "image-size must be non-zero"
        );
        ensure!(
            self.display_window_mins > 0,
            "display-window-mins must be greater than zero"
        );
        ensure!(
            !self.downloader.poll_interval.is_zero(),
            "downloader.poll-interval must be greater than zero"
        );
        ensure!(
            !self.display.frame_interval.is_zero(),
            "display.frame-interval must be greater than zero"
        );
        ensure!(
            !self.export.file_name.is_empty(),
            "export.file-name must not be empty"
        );
        Ok(self)
    }

    /// Suffix every matching remote link ends with: prefix + size tag + format.
    #[must_use]
    pub fn link_match_suffix(&self) -> String {
        format!(
            "{}{}{}",
            self.downloader.data_file_link_prefix, self.image_size, self.image_format
        )
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            image_format: ".jpg".into(),
            image_size: ImageDimensions {
                width: 1808,
                height: 1808,
            },
            image_data_location: PathBuf::from("data"),
            display_window_mins: 180,
            on_corrupt_image: CorruptImagePolicy::default(),
            downloader: DownloaderOptions::default(),
            export: ExportOptions::default(),
            display: DisplayOptions::default(),
        }
    }
}
