//! Error types for Mercury Tools

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("config error: {msg}")]
    Config { msg: String },

    #[error("unknown preset index {index}")]
    UnknownPreset { index: u8 },

    #[error("audio backend error: {msg}")]
    Audio { msg: String },

    #[error("control protocol error: {msg}")]
    Control { msg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arq(#[from] mercury_arq::ArqError),

    #[error(transparent)]
    Modem(#[from] mercury_modem::ModemError),

    #[error(transparent)]
    Frame(#[from] mercury_frame::FrameError),

    #[error(transparent)]
    Core(#[from] mercury_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ToolsError>;
