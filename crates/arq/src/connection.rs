//! ARQ connection lifecycle: role, link status, and per-connection state.

use crate::{ArqError, Result};

/// Which side of the half-duplex link this instance currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Commander,
    Responder,
}

/// Connection-level handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Listening,
    ConnectionReceived,
    Connected,
    Disconnected,
}

/// What the controller is doing right now within an established (or
/// establishing) connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Receiving,
    TransmittingData,
    TransmittingControl,
    AcknowledgingData,
    AcknowledgingControl,
}

/// Maximum on-air call sign length, matching the single-byte length prefix
/// used in the `START_CONNECTION` control payload.
pub const MAX_CALL_SIGN_LEN: usize = 16;

/// Per-connection state: role, lifecycle, negotiated preset, call signs,
/// and the measured link SNR in both directions.
#[derive(Debug, Clone)]
pub struct Connection {
    pub role: Role,
    pub link_status: LinkStatus,
    pub connection_status: ConnectionStatus,
    pub current_preset: u8,
    pub my_call_sign: String,
    pub peer_call_sign: String,
    pub assigned_connection_id: u8,
    pub snr_uplink_db: f64,
    pub snr_downlink_db: f64,
}

impl Connection {
    pub fn new(my_call_sign: impl Into<String>, initial_preset: u8) -> Result<Self> {
        let my_call_sign = my_call_sign.into();
        if my_call_sign.len() > MAX_CALL_SIGN_LEN {
            return Err(ArqError::CallSignTooLong { call: my_call_sign });
        }
        Ok(Self {
            role: Role::Responder,
            link_status: LinkStatus::Listening,
            connection_status: ConnectionStatus::Receiving,
            current_preset: initial_preset,
            my_call_sign,
            peer_call_sign: String::new(),
            assigned_connection_id: 0,
            snr_uplink_db: 0.0,
            snr_downlink_db: 0.0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.link_status == LinkStatus::Connected
    }

    /// Tears the connection down to a fresh listening state, as done on
    /// `CLOSE_CONNECTION` or link-timer expiry.
    pub fn disconnect_to_listening(&mut self, idle_preset: u8) {
        self.assigned_connection_id = 0;
        self.link_status = LinkStatus::Listening;
        self.connection_status = ConnectionStatus::Receiving;
        self.current_preset = idle_preset;
        self.peer_call_sign.clear();
    }

    /// Switches roles after `SWITCH_ROLE`, matching the responder becoming
    /// a commander (and vice versa) without tearing down the link.
    pub fn switch_role(&mut self) {
        self.role = match self.role {
            Role::Commander => Role::Responder,
            Role::Responder => Role::Commander,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_call_signs_over_the_wire_limit() {
        let long_call = "X".repeat(MAX_CALL_SIGN_LEN + 1);
        assert!(Connection::new(long_call, 0).is_err());
    }

    #[test]
    fn disconnect_resets_link_and_connection_status() {
        let mut conn = Connection::new("CALL1", 5).unwrap();
        conn.link_status = LinkStatus::Connected;
        conn.connection_status = ConnectionStatus::TransmittingData;
        conn.assigned_connection_id = 77;
        conn.disconnect_to_listening(0);
        assert_eq!(conn.link_status, LinkStatus::Listening);
        assert_eq!(conn.connection_status, ConnectionStatus::Receiving);
        assert_eq!(conn.assigned_connection_id, 0);
        assert_eq!(conn.current_preset, 0);
    }

    #[test]
    fn switch_role_toggles_between_commander_and_responder() {
        let mut conn = Connection::new("CALL1", 0).unwrap();
        assert_eq!(conn.role, Role::Responder);
        conn.switch_role();
        assert_eq!(conn.role, Role::Commander);
        conn.switch_role();
        assert_eq!(conn.role, Role::Responder);
    }
}
