//! Commander/responder ARQ state machine: batched selective-repeat data
//! transfer, the control sub-protocol, and gear-shift rate adaptation.
//!
//! Grounded in `examples/original_source/source/datalink_layer/arq_responder.cc`
//! for the responder's receive/acknowledge flow and control-opcode handling;
//! the commander side (build batch, retransmit un-acked slots, probe on
//! timeout) follows the state diagram in spec.md §4.8, since the original
//! commander source was not part of the retrieved pack.

use crate::connection::{Connection, ConnectionStatus, LinkStatus, Role};
use crate::message::{ack_multi_payload, parse_ack_multi, ControlOpcode, Message, MessageStatus, MessageType};
use crate::preset::PresetTable;
use crate::timer::{remaining_batch_timeout_ms, ArqTimers};
use crate::{ArqError, Result};
use std::collections::VecDeque;

/// Static protocol parameters for one connection. Distinct from [`crate::preset::Preset`],
/// which describes the PHY shape; this is the ARQ timing/batching policy.
#[derive(Debug, Clone)]
pub struct ArqConfig {
    pub n_messages: usize,
    pub data_batch_size: usize,
    pub ack_batch_size: usize,
    pub control_batch_size: usize,
    pub message_transmission_time_ms: f64,
    pub link_timeout_ms: f64,
    pub connection_timeout_ms: f64,
    pub max_retries: u32,
    pub max_data_length: usize,
    pub gear_shift_enabled: bool,
    /// Consecutive good/bad windows required before shifting gear.
    pub gear_shift_threshold: u32,
    pub gear_shift_snr_up_db: f64,
    pub gear_shift_snr_down_db: f64,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            n_messages: 256,
            data_batch_size: 8,
            ack_batch_size: 8,
            control_batch_size: 1,
            message_transmission_time_ms: 200.0,
            link_timeout_ms: 30_000.0,
            connection_timeout_ms: 5_000.0,
            max_retries: 5,
            max_data_length: 128,
            gear_shift_enabled: true,
            gear_shift_threshold: 3,
            gear_shift_snr_up_db: 18.0,
            gear_shift_snr_down_db: 6.0,
        }
    }
}

/// Recoverable/observable counters, never fatal (per spec.md §7).
#[derive(Debug, Clone, Default)]
pub struct ArqStats {
    pub n_received_data: u64,
    pub n_received_control: u64,
    pub n_acks_sent_data: u64,
    pub n_acks_sent_control: u64,
    pub n_invalid_messages: u64,
    pub n_retransmissions: u64,
}

struct PendingTx {
    message: Message,
    retries: u32,
}

struct RxSlot {
    message: Option<Message>,
    /// Set once this slot's payload has been copied into `rx_output`, so a
    /// retransmitted duplicate (commander resending before seeing our ACK)
    /// is re-acknowledged without being delivered to the application twice.
    delivered: bool,
}

impl RxSlot {
    fn empty() -> Self {
        Self { message: None, delivered: false }
    }
}

/// The ARQ commander/responder controller.
pub struct ArqController {
    pub connection: Connection,
    pub config: ArqConfig,
    pub timers: ArqTimers,
    pub stats: ArqStats,

    messages_tx: Vec<Option<PendingTx>>,
    messages_rx: Vec<RxSlot>,
    messages_control: Option<Message>,

    outgoing_app_queue: VecDeque<u8>,
    rx_output: VecDeque<u8>,

    last_ack_backup: Option<Message>,
    repeating_last_ack: bool,

    consecutive_good_windows: u32,
    consecutive_bad_windows: u32,

    /// How long the caller should wait before calling
    /// `on_receive_window_elapsed`, refreshed each time a message arrives.
    pub receive_timeout_ms: f64,
}

impl ArqController {
    pub fn new(connection: Connection, config: ArqConfig) -> Self {
        let n_messages = config.n_messages;
        Self {
            connection,
            config,
            timers: ArqTimers::new(),
            stats: ArqStats::default(),
            messages_tx: (0..n_messages).map(|_| None).collect(),
            messages_rx: (0..n_messages).map(|_| RxSlot::empty()).collect(),
            messages_control: None,
            outgoing_app_queue: VecDeque::new(),
            rx_output: VecDeque::new(),
            last_ack_backup: None,
            repeating_last_ack: false,
            consecutive_good_windows: 0,
            consecutive_bad_windows: 0,
            receive_timeout_ms: 0.0,
        }
    }

    /// Bytes the application has delivered to us, ready to be chunked into
    /// DATA messages on the next `fill_batch`.
    pub fn enqueue_app_bytes(&mut self, data: &[u8]) {
        self.outgoing_app_queue.extend(data.iter().copied());
    }

    /// Bytes recovered from the peer, ready for the application to drain.
    pub fn drain_app_bytes(&mut self) -> Vec<u8> {
        self.rx_output.drain(..).collect()
    }

    // ---- Commander side ----------------------------------------------

    /// Builds a `START_CONNECTION` control message. Payload layout:
    /// `[dest_len][dest_call][src_len][src_call]`.
    pub fn connect(&mut self, peer_call: &str) -> Result<Message> {
        if self.connection.role != Role::Commander {
            return Err(ArqError::InvalidTransition {
                from: format!("{:?}", self.connection.role),
                event: "connect",
            });
        }
        let mut payload = Vec::new();
        payload.push(peer_call.len() as u8);
        payload.extend_from_slice(peer_call.as_bytes());
        payload.push(self.connection.my_call_sign.len() as u8);
        payload.extend_from_slice(self.connection.my_call_sign.as_bytes());

        self.connection.peer_call_sign = peer_call.to_string();
        self.connection.connection_status = ConnectionStatus::TransmittingControl;
        self.timers.connection.start();

        Ok(Message {
            msg_type: MessageType::Control,
            id: 0,
            sequence_number: 0,
            connection_id: 0,
            payload: {
                let mut p = vec![ControlOpcode::StartConnection.to_u8()];
                p.extend(payload);
                p
            },
            status: MessageStatus::Pending,
        })
    }

    /// Fills unused TX slots from the outgoing app queue and returns the
    /// batch to transmit this round (un-acked retransmissions are already
    /// sitting in their slots and are included unchanged).
    pub fn fill_batch(&mut self) -> Vec<Message> {
        for (id, slot) in self.messages_tx.iter_mut().enumerate() {
            if slot.is_none() && !self.outgoing_app_queue.is_empty() {
                let take = self.config.max_data_length.min(self.outgoing_app_queue.len());
                let payload: Vec<u8> = self.outgoing_app_queue.drain(..take).collect();
                let msg_type = if take <= 32 { MessageType::DataShort } else { MessageType::DataLong };
                *slot = Some(PendingTx {
                    message: Message {
                        msg_type,
                        id: id as u8,
                        sequence_number: 0,
                        connection_id: self.connection.assigned_connection_id,
                        payload,
                        status: MessageStatus::Pending,
                    },
                    retries: 0,
                });
            }
        }

        let mut batch = Vec::new();
        for (seq, slot) in self
            .messages_tx
            .iter_mut()
            .filter_map(|s| s.as_mut())
            .take(self.config.data_batch_size)
            .enumerate()
        {
            slot.message.sequence_number = seq as u8;
            slot.message.status = MessageStatus::Sent;
            batch.push(slot.message.clone());
        }

        if !batch.is_empty() {
            self.connection.connection_status = ConnectionStatus::Receiving;
            self.receive_timeout_ms = remaining_batch_timeout_ms(
                self.config.ack_batch_size,
                0,
                self.config.message_transmission_time_ms,
            );
            self.timers.receiving.start();
        }
        batch
    }

    /// True once every TX slot is free (all data acknowledged).
    pub fn all_acked(&self) -> bool {
        self.messages_tx.iter().all(|s| s.is_none())
    }

    fn on_ack_multi(&mut self, msg: &Message) -> Result<()> {
        let acked_ids = parse_ack_multi(&msg.payload)?;
        for id in acked_ids {
            if let Some(slot) = self.messages_tx.get_mut(id as usize) {
                *slot = None;
            }
        }
        self.timers.link.start();
        self.connection.connection_status = ConnectionStatus::TransmittingData;
        Ok(())
    }

    /// Rebuilds the retransmit batch for slots still awaiting ACK after the
    /// receive window timed out, bumping each slot's retry counter.
    pub fn retransmit_unacked(&mut self) -> Result<Vec<Message>> {
        let mut batch = Vec::new();
        for slot in self.messages_tx.iter_mut().flatten() {
            slot.retries += 1;
            if slot.retries > self.config.max_retries {
                continue;
            }
            batch.push(slot.message.clone());
        }
        self.stats.n_retransmissions += batch.len() as u64;
        Ok(batch)
    }

    /// Whether any un-acked slot has exceeded `max_retries` (probe/abort
    /// condition: spec's `RECEIVING --timeout, attempts>=max--> TRANSMITTING_CONTROL`).
    pub fn retry_budget_exhausted(&self) -> bool {
        self.messages_tx
            .iter()
            .flatten()
            .any(|slot| slot.retries > self.config.max_retries)
    }

    // ---- Responder side ------------------------------------------------

    fn add_message_rx_data(&mut self, msg: Message) -> Result<()> {
        let loc = msg.id as usize;
        let slot = self
            .messages_rx
            .get_mut(loc)
            .ok_or(ArqError::IdOutOfRange { id: msg.id, n_messages: self.messages_rx.len() })?;

        if slot.message.is_none() {
            self.stats.n_received_data += 1;
        }

        if !slot.delivered {
            self.rx_output.extend(msg.payload.iter().copied());
            slot.delivered = true;
        }
        slot.message = Some(msg);
        Ok(())
    }

    /// Feeds one received message into the controller. Returns any messages
    /// that must be transmitted immediately as a direct reaction (e.g. an
    /// `ACK_CONTROL`); batched data ACKs are instead produced by `poll`.
    pub fn on_message_received(&mut self, msg: Message) -> Result<Vec<Message>> {
        match self.connection.role {
            Role::Responder => self.handle_responder_message(msg),
            Role::Commander => self.handle_commander_message(msg),
        }
    }

    fn handle_commander_message(&mut self, msg: Message) -> Result<Vec<Message>> {
        match msg.msg_type {
            MessageType::AckMulti => {
                self.on_ack_multi(&msg)?;
                Ok(Vec::new())
            }
            MessageType::AckControl => {
                self.timers.connection.stop();
                self.timers.link.start();
                self.connection.connection_status = ConnectionStatus::TransmittingData;
                Ok(Vec::new())
            }
            _ => {
                self.stats.n_invalid_messages += 1;
                Ok(Vec::new())
            }
        }
    }

    fn handle_responder_message(&mut self, msg: Message) -> Result<Vec<Message>> {
        if self.connection.connection_status != ConnectionStatus::Receiving {
            return Ok(Vec::new());
        }

        match msg.msg_type {
            MessageType::Control if self.messages_control.is_none() => {
                self.stats.n_received_control += 1;
                self.receive_timeout_ms = remaining_batch_timeout_ms(
                    self.config.control_batch_size,
                    msg.sequence_number,
                    self.config.message_transmission_time_ms,
                );
                self.messages_control = Some(msg);
                self.timers.receiving.start();
                self.timers.link.start();
                self.timers.gear_shift.start();
                Ok(Vec::new())
            }
            MessageType::DataShort | MessageType::DataLong => {
                let sequence_number = msg.sequence_number;
                self.add_message_rx_data(msg)?;
                self.receive_timeout_ms = remaining_batch_timeout_ms(
                    self.config.data_batch_size,
                    sequence_number,
                    self.config.message_transmission_time_ms,
                );
                self.timers.receiving.start();
                self.timers.link.start();
                self.timers.gear_shift.start();
                Ok(Vec::new())
            }
            _ => {
                self.stats.n_invalid_messages += 1;
                Ok(Vec::new())
            }
        }
    }

    /// Call once the receiving window has elapsed: dispatches any staged
    /// control message, and if data was received moves to acknowledging.
    pub fn on_receive_window_elapsed(&mut self) -> Result<Vec<Message>> {
        self.timers.receiving.stop();

        let mut out = Vec::new();
        if let Some(control) = self.messages_control.take() {
            out.extend(self.process_control_responder(control)?);
        }

        if self.messages_rx.iter().any(|s| s.message.is_some() && !Self::slot_acked(s)) {
            self.connection.connection_status = ConnectionStatus::AcknowledgingData;
            out.extend(self.build_ack_batch());
        }
        Ok(out)
    }

    fn slot_acked(_slot: &RxSlot) -> bool {
        // Slots are freed back to `None` once acknowledged (see
        // `build_ack_batch`), so any `Some` slot here is still pending ack.
        false
    }

    fn build_ack_batch(&mut self) -> Vec<Message> {
        let mut ack = if self.repeating_last_ack {
            self.repeating_last_ack = false;
            self.last_ack_backup.clone().expect("repeat requested with no prior ack")
        } else {
            let acked_ids: Vec<u8> = self
                .messages_rx
                .iter()
                .enumerate()
                .filter_map(|(id, slot)| slot.message.as_ref().map(|_| id as u8))
                .collect();

            for &id in &acked_ids {
                self.messages_rx[id as usize] = RxSlot::empty();
            }
            self.stats.n_acks_sent_data += acked_ids.len() as u64;

            Message {
                msg_type: MessageType::AckMulti,
                id: 0,
                sequence_number: 0,
                connection_id: self.connection.assigned_connection_id,
                payload: ack_multi_payload(&acked_ids),
                status: MessageStatus::Pending,
            }
        };
        ack.status = MessageStatus::Sent;
        self.last_ack_backup = Some(ack.clone());
        self.connection.connection_status = ConnectionStatus::Receiving;
        vec![ack]
    }

    fn process_control_responder(&mut self, msg: Message) -> Result<Vec<Message>> {
        let opcode = msg.opcode()?;
        match opcode {
            ControlOpcode::StartConnection => self.handle_start_connection(&msg),
            ControlOpcode::TestConnection => self.handle_test_connection(&msg),
            ControlOpcode::CloseConnection => {
                if self.connection.link_status == LinkStatus::Connected {
                    self.connection.disconnect_to_listening(0);
                    self.timers.link.reset();
                    self.timers.connection.reset();
                }
                Ok(Vec::new())
            }
            ControlOpcode::SetConfig => {
                if let Some(&preset_index) = msg.payload.get(1) {
                    self.connection.current_preset = preset_index;
                }
                self.timers.link.start();
                self.timers.gear_shift.start();
                Ok(self.ack_control(&msg))
            }
            ControlOpcode::BlockEnd | ControlOpcode::FileEnd => {
                self.timers.link.start();
                Ok(self.ack_control(&msg))
            }
            ControlOpcode::SwitchRole => {
                self.connection.switch_role();
                self.timers.link.start();
                Ok(self.ack_control(&msg))
            }
            ControlOpcode::RepeatLastAck => {
                self.repeating_last_ack = true;
                Ok(Vec::new())
            }
        }
    }

    fn handle_start_connection(&mut self, msg: &Message) -> Result<Vec<Message>> {
        if !matches!(self.connection.link_status, LinkStatus::Listening | LinkStatus::ConnectionReceived) {
            return Ok(Vec::new());
        }
        let dest_len = *msg.payload.get(1).unwrap_or(&0) as usize;
        let dest_call = String::from_utf8_lossy(
            msg.payload.get(2..2 + dest_len).unwrap_or_default(),
        )
        .to_string();

        if dest_call != self.connection.my_call_sign {
            return Ok(Vec::new());
        }

        self.connection.link_status = LinkStatus::ConnectionReceived;
        self.connection.assigned_connection_id = rand::random::<u8>();
        self.timers.connection.start();
        Ok(self.ack_control(msg))
    }

    fn handle_test_connection(&mut self, msg: &Message) -> Result<Vec<Message>> {
        if !matches!(self.connection.link_status, LinkStatus::ConnectionReceived | LinkStatus::Connected) {
            return Ok(Vec::new());
        }
        self.connection.link_status = LinkStatus::Connected;
        self.timers.connection.reset();
        self.timers.link.start();
        Ok(self.ack_control(msg))
    }

    fn ack_control(&mut self, _msg: &Message) -> Vec<Message> {
        self.stats.n_acks_sent_control += 1;
        self.connection.connection_status = ConnectionStatus::Receiving;
        vec![Message {
            msg_type: MessageType::AckControl,
            id: 0,
            sequence_number: 0,
            connection_id: self.connection.assigned_connection_id,
            payload: Vec::new(),
            status: MessageStatus::Sent,
        }]
    }

    // ---- Gear-shift ------------------------------------------------------

    /// Feeds one window's outcome (did the last batch round fully succeed,
    /// and at what measured SNR) into the gear-shift logic. Returns a
    /// `SET_CONFIG` message if a shift is warranted (commander only).
    pub fn record_window_result(
        &mut self,
        success: bool,
        snr_db: f64,
        presets: &PresetTable,
    ) -> Option<Message> {
        if !self.config.gear_shift_enabled || presets.is_empty() {
            return None;
        }

        if success && snr_db >= self.config.gear_shift_snr_up_db {
            self.consecutive_good_windows += 1;
            self.consecutive_bad_windows = 0;
        } else if !success || snr_db < self.config.gear_shift_snr_down_db {
            self.consecutive_bad_windows += 1;
            self.consecutive_good_windows = 0;
        } else {
            self.consecutive_good_windows = 0;
            self.consecutive_bad_windows = 0;
        }

        let current = self.connection.current_preset;
        let max_index = presets.max_index();

        if self.consecutive_good_windows >= self.config.gear_shift_threshold && current < max_index {
            self.consecutive_good_windows = 0;
            let new_index = current + 1;
            self.connection.current_preset = new_index;
            return Some(Self::set_config_message(new_index, self.connection.assigned_connection_id));
        }

        if self.consecutive_bad_windows >= self.config.gear_shift_threshold && current > 0 {
            self.consecutive_bad_windows = 0;
            let new_index = current - 1;
            self.connection.current_preset = new_index;
            return Some(Self::set_config_message(new_index, self.connection.assigned_connection_id));
        }

        None
    }

    fn set_config_message(preset_index: u8, connection_id: u8) -> Message {
        Message::control(ControlOpcode::SetConfig, &[preset_index], connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::preset::default_presets;

    fn responder() -> ArqController {
        let mut conn = Connection::new("RESP", 0).unwrap();
        conn.link_status = LinkStatus::Connected;
        conn.role = Role::Responder;
        ArqController::new(conn, ArqConfig { n_messages: 16, data_batch_size: 4, ..Default::default() })
    }

    fn commander() -> ArqController {
        let mut conn = Connection::new("CMDR", 0).unwrap();
        conn.link_status = LinkStatus::Connected;
        conn.role = Role::Commander;
        ArqController::new(conn, ArqConfig { n_messages: 16, data_batch_size: 4, ..Default::default() })
    }

    #[test]
    fn responder_delivers_data_once_and_acks_batch() {
        let mut responder = responder();
        let msg = Message {
            msg_type: MessageType::DataShort,
            id: 2,
            sequence_number: 0,
            connection_id: 0,
            payload: vec![1, 2, 3],
            status: MessageStatus::Sent,
        };
        responder.on_message_received(msg.clone()).unwrap();
        // A retransmitted duplicate before the ack window elapses must not
        // double-deliver to the application.
        responder.on_message_received(msg).unwrap();

        let acks = responder.on_receive_window_elapsed().unwrap();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].msg_type, MessageType::AckMulti);

        let delivered = responder.drain_app_bytes();
        assert_eq!(delivered, vec![1, 2, 3]);
    }

    #[test]
    fn commander_frees_slot_on_ack_multi() {
        let mut commander = commander();
        commander.enqueue_app_bytes(b"hello");
        let batch = commander.fill_batch();
        assert!(!batch.is_empty());
        assert!(!commander.all_acked());

        let acked_ids: Vec<u8> = batch.iter().map(|m| m.id).collect();
        let ack = Message {
            msg_type: MessageType::AckMulti,
            id: 0,
            sequence_number: 0,
            connection_id: 0,
            payload: ack_multi_payload(&acked_ids),
            status: MessageStatus::Sent,
        };
        commander.on_message_received(ack).unwrap();
        assert!(commander.all_acked());
    }

    #[test]
    fn commander_retransmits_unacked_slots_with_same_payload() {
        let mut commander = commander();
        commander.enqueue_app_bytes(b"abc");
        let first_batch = commander.fill_batch();
        let retransmitted = commander.retransmit_unacked().unwrap();
        assert_eq!(first_batch.len(), retransmitted.len());
        for (a, b) in first_batch.iter().zip(retransmitted.iter()) {
            assert_eq!(a.payload, b.payload);
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn gear_shift_raises_preset_after_k_good_windows() {
        let mut commander = commander();
        let presets = default_presets();
        let threshold = commander.config.gear_shift_threshold;
        let mut last = None;
        for _ in 0..threshold {
            last = commander.record_window_result(true, 20.0, &presets);
        }
        assert!(last.is_some());
        assert_eq!(commander.connection.current_preset, 1);
    }

    #[test]
    fn gear_shift_lowers_preset_after_k_bad_windows() {
        let mut commander = commander();
        commander.connection.current_preset = 3;
        let presets = default_presets();
        let threshold = commander.config.gear_shift_threshold;
        let mut last = None;
        for _ in 0..threshold {
            last = commander.record_window_result(false, 2.0, &presets);
        }
        assert!(last.is_some());
        assert_eq!(commander.connection.current_preset, 2);
    }

    #[test]
    fn start_connection_is_rejected_for_a_different_call_sign() {
        let mut responder = responder();
        let payload = {
            let mut p = vec![ControlOpcode::StartConnection.to_u8()];
            p.push(b"OTHER".len() as u8);
            p.extend_from_slice(b"OTHER");
            p.push(b"PEER".len() as u8);
            p.extend_from_slice(b"PEER");
            p
        };
        let msg = Message {
            msg_type: MessageType::Control,
            id: 0,
            sequence_number: 0,
            connection_id: 0,
            payload,
            status: MessageStatus::Sent,
        };
        responder.connection.link_status = LinkStatus::Listening;
        let reacted = responder.on_message_received(msg).unwrap();
        assert!(reacted.is_empty());
        let acks = responder.on_receive_window_elapsed().unwrap();
        assert!(acks.is_empty());
    }
}
