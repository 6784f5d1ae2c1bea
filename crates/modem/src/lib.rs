//! Mercury Modem - OFDM, QAM and MFSK modulation, synchronization and
//! channel estimation.
//!
//! `ofdm` is the per-symbol waveform engine (zero-pad/IFFT/CP, passband
//! conversion); `qam` and `mfsk` are the two subcarrier-level modulations
//! Mercury presets select between; `sync` provides coarse timing/frequency
//! recovery and pilot-aided channel estimation.

pub mod qam;
pub mod mfsk;
pub mod ofdm;
pub mod sync;
pub mod common;
pub mod error;

pub use error::{ModemError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        qam::{QamModulator, QamConfig},
        mfsk::{MfskModulator, MfskDemodulator, welch_costas, ack_pattern},
        ofdm::{OfdmConfig, OfdmSymbolEngine, FilterWindow},
        sync::{ChannelEstimator, find_symbol_start, frequency_offset, equalize, estimate_snr_db},
        common::{Modulation, QamOrder, MfskOrder},
        error::{ModemError, Result},
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        let result = 2 + 2;
        assert_eq!(result, 4);
    }
}