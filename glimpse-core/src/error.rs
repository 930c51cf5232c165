use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Please enter your username")]
    EmptyUsername,

    #[error("Username '{0}' must be a single directory name")]
    InvalidUsername(String),

    #[error("An enrollment is already in progress")]
    Busy,

    #[error("Cannot open camera {device_index}: {reason}")]
    CameraUnavailable { device_index: i32, reason: String },

    #[error("Frame buffer does not match {width}x{height}")]
    MalformedFrame { width: u32, height: u32 },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to start worker thread: {0}")]
    Thread(#[source] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),
}
