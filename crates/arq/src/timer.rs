//! Poll-based timers for the ARQ controller.
//!
//! The controller loop is single-threaded and cooperative (see
//! `mercury_core`'s ring buffers for the concurrency boundary): rather than
//! scheduling callbacks, each timer is a monotonic start instant plus a
//! running flag, and callers poll `elapsed_ms() >= timeout`.

use std::time::{Duration, Instant};

/// A single poll-based timer: `start()` records "now"; `elapsed_ms()` reads
/// back how long it has been running; `stop()`/`reset()` clear it.
#[derive(Debug, Clone)]
pub struct PollTimer {
    started_at: Option<Instant>,
}

impl Default for PollTimer {
    fn default() -> Self {
        Self { started_at: None }
    }
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    /// Alias for `stop()`, matching the teacher's naming in the control flow.
    pub fn reset(&mut self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed_ms(&self) -> f64 {
        match self.started_at {
            Some(t) => t.elapsed().as_secs_f64() * 1000.0,
            None => 0.0,
        }
    }

    pub fn has_elapsed(&self, timeout_ms: f64) -> bool {
        self.is_running() && self.elapsed_ms() >= timeout_ms
    }
}

/// The five named timers every ARQ connection tracks, bundled together so
/// the controller can restart/inspect them as a group.
#[derive(Debug, Clone, Default)]
pub struct ArqTimers {
    /// Time spent transmitting/awaiting a single message's airtime.
    pub message: PollTimer,
    /// Receive window: how long the responder waits for the next message
    /// of the current batch before moving to acknowledge.
    pub receiving: PollTimer,
    /// Overall link keepalive: connection drops if nothing valid arrives
    /// for `link_timeout_ms`.
    pub link: PollTimer,
    /// Connection handshake timeout (START_CONNECTION -> TEST_CONNECTION).
    pub connection: PollTimer,
    /// Samples recent success/SNR statistics for rate adaptation.
    pub gear_shift: PollTimer,
}

impl ArqTimers {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Computes the responder's receive-window timeout for the remainder of a
/// batch, mirroring `(batch_size - sequence_number) * message_transmission_time_ms`.
pub fn remaining_batch_timeout_ms(
    batch_size: usize,
    sequence_number: u8,
    message_transmission_time_ms: f64,
) -> f64 {
    let remaining = batch_size.saturating_sub(sequence_number as usize) as f64;
    remaining * message_transmission_time_ms
}

/// Time a duration is considered "elapsed" purely from a pre-measured
/// duration, for callers that already have a `Duration` in hand (tests).
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn timer_reports_not_running_until_started() {
        let timer = PollTimer::new();
        assert!(!timer.is_running());
        assert_eq!(timer.elapsed_ms(), 0.0);
    }

    #[test]
    fn timer_elapses_and_can_be_stopped() {
        let mut timer = PollTimer::new();
        timer.start();
        sleep(Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 4.0);
        timer.stop();
        assert!(!timer.is_running());
    }

    #[test]
    fn remaining_batch_timeout_shrinks_with_sequence_number() {
        let first = remaining_batch_timeout_ms(10, 0, 20.0);
        let later = remaining_batch_timeout_ms(10, 7, 20.0);
        assert!(later < first);
        assert_eq!(remaining_batch_timeout_ms(10, 10, 20.0), 0.0);
    }
}
