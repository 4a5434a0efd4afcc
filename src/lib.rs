pub mod canvas;
pub mod clock;
pub mod command;
pub mod compositor;
pub mod config;
pub mod decoder;
pub mod frame;
pub mod queue;
pub mod source;
pub mod wall;

#[cfg(feature = "gstreamer")]
pub mod gst_backend;

// Re-export commonly used types
pub use config::Config;
pub use frame::{Frame, Slot};
pub use wall::VideoWall;

// Common error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WallError {
    #[error("Cannot open source {url}: {reason}")]
    SourceOpen { url: String, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Display initialization failed: {0}")]
    DisplayInit(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Stream number must be between 1 and 4, got {0}")]
    InvalidSlot(u32),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WallError>;
