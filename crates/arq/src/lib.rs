//! Mercury ARQ - selective-repeat data-link controller.
//!
//! `message` defines the on-air message types and the control sub-protocol
//! opcodes; `timer` provides the poll-based timers the controller loop
//! checks instead of scheduling callbacks; `connection` tracks per-link
//! role/lifecycle state; `preset` is the immutable PHY/ARQ parameter table
//! switched between via `SET_CONFIG` and gear-shift; `controller` ties all
//! of the above into the commander/responder state machine.

pub mod connection;
pub mod controller;
pub mod error;
pub mod message;
pub mod preset;
pub mod timer;

pub use error::{ArqError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        connection::{Connection, ConnectionStatus, LinkStatus, Role},
        controller::{ArqConfig, ArqController, ArqStats},
        error::{ArqError, Result},
        message::{ControlOpcode, Message, MessageStatus, MessageType},
        preset::{default_presets, Preset, PresetTable},
        timer::{ArqTimers, PollTimer},
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
