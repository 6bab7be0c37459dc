use std::path::PathBuf;

use thiserror::Error;

/// Library error type for store, codec and record operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The local image store is missing and could not be created.
    #[error("image store unavailable: {}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file name or URL does not carry a `YYYYDDDHHMM` timestamp.
    #[error("malformed timestamp name: {0:?}")]
    MalformedName(String),

    /// The file could not be read or decoded as an image.
    #[error("failed to decode {}", .path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image does not have the configured shape.
    #[error(
        "unexpected image shape for {}: got {}x{}x{}, expected {}x{}x3",
        .path.display(), .width, .height, .channels, .expected_width, .expected_height
    )]
    ShapeMismatch {
        path: PathBuf,
        width: u32,
        height: u32,
        channels: u8,
        expected_width: u32,
        expected_height: u32,
    },

    /// The live view found nothing to show on its initial load.
    #[error("no images were found in {}", .0.display())]
    NoImagesFound(PathBuf),
}

/// Failure reading the remote directory listing.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("download of {url} failed")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to store download: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure handing frames to a render or export sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("nothing to write: frame sequence is empty")]
    Empty,

    #[error("failed to encode frames: {0}")]
    Encode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
