//! Mercury Tools - CLI, config loading, audio backend and TCP bridge for
//! the `mercury` binary.
//!
//! `config` loads the key=value/`[section]` config file and builds an
//! `ArqConfig` from it; `cli` defines the `-c/-m/-l` command line; `audio`
//! is the audio backend capability trait plus the WAV-file and null
//! backends; `tcp` is the control/data socket bridge.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod tcp;

pub use error::{Result, ToolsError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        audio::{AudioBackend, NullBackend, WavFileBackend},
        cli::{Cli, Mode},
        config::ConfigFile,
        error::{Result, ToolsError},
        tcp::{ControlCommand, format_connected, format_disconnected, parse_control_line},
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
