//! Error types for Mercury ARQ

use thiserror::Error;

/// ARQ controller error types
#[derive(Error, Debug)]
pub enum ArqError {
    #[error("Invalid message: {msg}")]
    InvalidMessage { msg: String },

    #[error("Message id {id} out of range (nMessages={n_messages})")]
    IdOutOfRange { id: u8, n_messages: usize },

    #[error("Unknown config preset index: {index}")]
    UnknownPreset { index: u8 },

    #[error("Call sign {call} exceeds the maximum on-air length")]
    CallSignTooLong { call: String },

    #[error("Invalid state transition from {from:?} on {event}")]
    InvalidTransition { from: String, event: &'static str },

    #[error("Modem error: {0}")]
    Modem(#[from] mercury_modem::ModemError),

    #[error("Frame error: {0}")]
    Frame(#[from] mercury_frame::FrameError),

    #[error("Core error: {0}")]
    Core(#[from] mercury_core::CoreError),
}

/// Result type for Mercury ARQ operations
pub type Result<T> = std::result::Result<T, ArqError>;
