//! Consumers of the ordered window: GIF export and live frame rendering.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, ImageFormat};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::record::ImageRecord;

/// Receives the whole window whenever it changes.
pub trait FrameSink {
    fn export(&mut self, frames: &[ImageRecord]) -> Result<(), SinkError>;
}

/// Receives one frame at a time from the live view.
pub trait FrameRenderer {
    fn show(&mut self, frame: &ImageRecord) -> Result<(), SinkError>;
}

/// Writes the window as a looping animated GIF.
#[derive(Debug, Clone)]
pub struct GifExporter {
    path: PathBuf,
    frame_delay: Duration,
}

impl GifExporter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, frame_delay: Duration) -> Self {
        Self {
            path: path.into(),
            frame_delay,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for GifExporter {
    fn export(&mut self, frames: &[ImageRecord]) -> Result<(), SinkError> {
        if frames.is_empty() {
            return Err(SinkError::Empty);
        }
        let part = self.path.with_extension("gif.part");
        {
            let file = BufWriter::new(File::create(&part)?);
            let mut encoder = GifEncoder::new(file);
            encoder.set_repeat(Repeat::Infinite)?;
            let delay = Delay::from_saturating_duration(self.frame_delay);
            for rec in frames {
                let rgba = DynamicImage::ImageRgb8(rec.pixels.clone()).into_rgba8();
                encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
            }
        }
        fs::rename(&part, &self.path)?;
        info!(path = %self.path.display(), frames = frames.len(), "exported animation");
        Ok(())
    }
}

/// Writes the current live-view frame to a PNG for an external viewer.
#[derive(Debug, Clone)]
pub struct SnapshotRenderer {
    path: PathBuf,
    last: Option<PathBuf>,
}

impl SnapshotRenderer {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: None,
        }
    }
}

impl FrameRenderer for SnapshotRenderer {
    fn show(&mut self, frame: &ImageRecord) -> Result<(), SinkError> {
        if self.last.as_ref() == Some(&frame.path) {
            return Ok(());
        }
        let part = self.path.with_extension("png.part");
        frame.pixels.save_with_format(&part, ImageFormat::Png)?;
        fs::rename(&part, &self.path)?;
        debug!(frame = %frame.path.display(), "snapshot updated");
        self.last = Some(frame.path.clone());
        Ok(())
    }
}
