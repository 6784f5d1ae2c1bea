//! Modulation order types shared by the QAM and MFSK subcarrier mappers

use serde::{Deserialize, Serialize};

/// Which modulation a preset selects. Replaces the original's numeric
/// `MOD_BPSK`/`MOD_16QAM`/`MOD_MFSK` dispatch with a tagged type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    Qam(QamOrder),
    Mfsk(MfskOrder),
}

/// QAM constellation size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QamOrder {
    Bpsk = 2,
    Qpsk = 4,
    Qam8 = 8,
    Qam16 = 16,
    Qam32 = 32,
    Qam64 = 64,
}

impl QamOrder {
    pub fn bits_per_symbol(self) -> usize {
        (self as usize).trailing_zeros() as usize
    }
}

/// MFSK tone count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MfskOrder {
    Mfsk16 = 16,
    Mfsk32 = 32,
}

impl MfskOrder {
    pub fn tones(self) -> usize {
        self as usize
    }

    pub fn bits_per_tone(self) -> usize {
        (self as usize).trailing_zeros() as usize
    }

    /// Coprime hop step used so the hop sequence cycles through every
    /// tone before repeating (spec: 7 for M=16, 13 for M=32).
    pub fn hop_step(self) -> usize {
        match self {
            MfskOrder::Mfsk16 => 7,
            MfskOrder::Mfsk32 => 13,
        }
    }
}

