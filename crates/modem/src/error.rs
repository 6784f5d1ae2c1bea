//! Error types for Mercury Modem

use thiserror::Error;

/// Modem error types
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Unsupported modulation: {name}")]
    UnsupportedModulation { name: String },

    #[error("Modulation failed: {msg}")]
    ModulationFailed { msg: String },

    #[error("Demodulation failed: {msg}")]
    DemodulationFailed { msg: String },

    #[error("Invalid modulation parameters: {msg}")]
    InvalidParameters { msg: String },

    #[error("Synchronization failed: {msg}")]
    SynchronizationFailed { msg: String },

    #[error("Core error: {0}")]
    Core(#[from] mercury_core::CoreError),

    #[error("Frame error: {0}")]
    Frame(#[from] mercury_frame::FrameError),
}

/// Result type for Mercury Modem operations
pub type Result<T> = std::result::Result<T, ModemError>;