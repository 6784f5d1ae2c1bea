//! ARQ message types, wire encoding, and the control sub-protocol opcodes.
//!
//! Wire layout (within the payload cells of one OFDM frame):
//! `[type:1][id:1][sequence_number:1][length:1][connection_id:1][payload:length][padding]`.

use crate::{ArqError, Result};

/// Fixed on-air header size in bytes, before the payload.
pub const HEADER_LEN: usize = 5;

/// Message type, carried in wire byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    None,
    Control,
    DataShort,
    DataLong,
    AckMulti,
    AckRange,
    AckControl,
}

impl MessageType {
    pub fn to_u8(self) -> u8 {
        match self {
            MessageType::None => 0,
            MessageType::Control => 1,
            MessageType::DataShort => 2,
            MessageType::DataLong => 3,
            MessageType::AckMulti => 4,
            MessageType::AckRange => 5,
            MessageType::AckControl => 6,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => MessageType::None,
            1 => MessageType::Control,
            2 => MessageType::DataShort,
            3 => MessageType::DataLong,
            4 => MessageType::AckMulti,
            5 => MessageType::AckRange,
            6 => MessageType::AckControl,
            other => {
                return Err(ArqError::InvalidMessage {
                    msg: format!("unknown message type byte {other}"),
                })
            }
        })
    }

    pub fn is_data(self) -> bool {
        matches!(self, MessageType::DataShort | MessageType::DataLong)
    }
}

/// Message slot lifecycle, per the commander/responder side that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Free,
    Pending,
    Sent,
    Received,
    Acked,
}

/// Control sub-protocol opcode, carried in `payload[0]` of a `Control` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOpcode {
    StartConnection,
    TestConnection,
    CloseConnection,
    SetConfig,
    BlockEnd,
    FileEnd,
    SwitchRole,
    RepeatLastAck,
}

impl ControlOpcode {
    pub fn to_u8(self) -> u8 {
        match self {
            ControlOpcode::StartConnection => 0,
            ControlOpcode::TestConnection => 1,
            ControlOpcode::CloseConnection => 2,
            ControlOpcode::SetConfig => 3,
            ControlOpcode::BlockEnd => 4,
            ControlOpcode::FileEnd => 5,
            ControlOpcode::SwitchRole => 6,
            ControlOpcode::RepeatLastAck => 7,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => ControlOpcode::StartConnection,
            1 => ControlOpcode::TestConnection,
            2 => ControlOpcode::CloseConnection,
            3 => ControlOpcode::SetConfig,
            4 => ControlOpcode::BlockEnd,
            5 => ControlOpcode::FileEnd,
            6 => ControlOpcode::SwitchRole,
            7 => ControlOpcode::RepeatLastAck,
            other => {
                return Err(ArqError::InvalidMessage {
                    msg: format!("unknown control opcode byte {other}"),
                })
            }
        })
    }
}

/// One ARQ message slot: header fields plus payload bytes.
#[derive(Debug, Clone)]
pub struct Message {
    pub msg_type: MessageType,
    pub id: u8,
    pub sequence_number: u8,
    pub connection_id: u8,
    pub payload: Vec<u8>,
    pub status: MessageStatus,
}

impl Message {
    pub fn free() -> Self {
        Self {
            msg_type: MessageType::None,
            id: 0,
            sequence_number: 0,
            connection_id: 0,
            payload: Vec::new(),
            status: MessageStatus::Free,
        }
    }

    pub fn control(opcode: ControlOpcode, extra: &[u8], connection_id: u8) -> Self {
        let mut payload = Vec::with_capacity(1 + extra.len());
        payload.push(opcode.to_u8());
        payload.extend_from_slice(extra);
        Self {
            msg_type: MessageType::Control,
            id: 0,
            sequence_number: 0,
            connection_id,
            payload,
            status: MessageStatus::Pending,
        }
    }

    pub fn opcode(&self) -> Result<ControlOpcode> {
        if self.msg_type != MessageType::Control {
            return Err(ArqError::InvalidMessage {
                msg: "opcode() called on a non-control message".to_string(),
            });
        }
        let byte = *self
            .payload
            .first()
            .ok_or_else(|| ArqError::InvalidMessage { msg: "empty control payload".to_string() })?;
        ControlOpcode::from_u8(byte)
    }

    /// Encode to a fixed-size on-air buffer of `max_data_length` bytes
    /// (header + payload + zero padding).
    pub fn encode(&self, max_data_length: usize) -> Result<Vec<u8>> {
        if self.payload.len() > max_data_length {
            return Err(ArqError::InvalidMessage {
                msg: format!(
                    "payload length {} exceeds max_data_length {max_data_length}",
                    self.payload.len()
                ),
            });
        }
        let mut out = vec![0u8; HEADER_LEN + max_data_length];
        out[0] = self.msg_type.to_u8();
        out[1] = self.id;
        out[2] = self.sequence_number;
        out[3] = self.payload.len() as u8;
        out[4] = self.connection_id;
        out[HEADER_LEN..HEADER_LEN + self.payload.len()].copy_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode from an on-air buffer produced by [`Message::encode`].
    pub fn decode(bytes: &[u8], n_messages: usize) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ArqError::InvalidMessage { msg: "buffer shorter than header".to_string() });
        }
        let msg_type = MessageType::from_u8(bytes[0])?;
        let id = bytes[1];
        if msg_type.is_data() && id as usize >= n_messages {
            return Err(ArqError::IdOutOfRange { id, n_messages });
        }
        let sequence_number = bytes[2];
        let length = bytes[3] as usize;
        let connection_id = bytes[4];
        if HEADER_LEN + length > bytes.len() {
            return Err(ArqError::InvalidMessage { msg: "length field exceeds buffer".to_string() });
        }
        let payload = bytes[HEADER_LEN..HEADER_LEN + length].to_vec();
        Ok(Self {
            msg_type,
            id,
            sequence_number,
            connection_id,
            payload,
            status: MessageStatus::Received,
        })
    }
}

/// Builds an `ACK_MULTI` payload: byte 0 is the count, followed by one byte
/// per acknowledged slot id.
pub fn ack_multi_payload(acked_ids: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + acked_ids.len());
    payload.push(acked_ids.len() as u8);
    payload.extend_from_slice(acked_ids);
    payload
}

/// Parses an `ACK_MULTI` payload back into the acknowledged slot ids.
pub fn parse_ack_multi(payload: &[u8]) -> Result<Vec<u8>> {
    let count = *payload
        .first()
        .ok_or_else(|| ArqError::InvalidMessage { msg: "empty ACK_MULTI payload".to_string() })?
        as usize;
    let ids = payload.get(1..1 + count).ok_or_else(|| ArqError::InvalidMessage {
        msg: "ACK_MULTI count exceeds payload length".to_string(),
    })?;
    Ok(ids.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrips_through_wire_encoding() {
        let msg = Message {
            msg_type: MessageType::DataShort,
            id: 7,
            sequence_number: 2,
            connection_id: 42,
            payload: vec![1, 2, 3, 4],
            status: MessageStatus::Pending,
        };
        let wire = msg.encode(64).unwrap();
        let decoded = Message::decode(&wire, 256).unwrap();
        assert_eq!(decoded.msg_type, MessageType::DataShort);
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.sequence_number, 2);
        assert_eq!(decoded.connection_id, 42);
        assert_eq!(decoded.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn control_message_carries_opcode_in_first_payload_byte() {
        let msg = Message::control(ControlOpcode::SetConfig, &[5], 9);
        assert_eq!(msg.opcode().unwrap(), ControlOpcode::SetConfig);
        assert_eq!(msg.payload[1], 5);
    }

    #[test]
    fn ack_multi_payload_roundtrips() {
        let ids = vec![0, 3, 7, 255];
        let payload = ack_multi_payload(&ids);
        assert_eq!(parse_ack_multi(&payload).unwrap(), ids);
    }

    #[test]
    fn decode_rejects_data_id_beyond_table_size() {
        let msg = Message {
            msg_type: MessageType::DataShort,
            id: 10,
            sequence_number: 0,
            connection_id: 0,
            payload: vec![],
            status: MessageStatus::Pending,
        };
        let wire = msg.encode(16).unwrap();
        assert!(Message::decode(&wire, 4).is_err());
    }

    /// `encode`/`decode` is a bijection on the header fields and payload
    /// bytes, for any payload that fits the wire slot.
    #[quickcheck_macros::quickcheck]
    fn encode_decode_roundtrips_arbitrary_messages(
        id: u8,
        sequence_number: u8,
        connection_id: u8,
        payload: Vec<u8>,
    ) -> bool {
        let max_data_length = 255;
        let payload = if payload.len() > max_data_length {
            payload[..max_data_length].to_vec()
        } else {
            payload
        };
        let msg = Message {
            msg_type: MessageType::DataLong,
            id,
            sequence_number,
            connection_id,
            payload: payload.clone(),
            status: MessageStatus::Pending,
        };
        let Ok(wire) = msg.encode(max_data_length) else {
            return false;
        };
        let Ok(decoded) = Message::decode(&wire, 256) else {
            return false;
        };
        decoded.id == id
            && decoded.sequence_number == sequence_number
            && decoded.connection_id == connection_id
            && decoded.payload == payload
    }
}
