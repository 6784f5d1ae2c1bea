//! Config preset table: the immutable PHY/ARQ parameter bundles that a
//! connection switches between via `SET_CONFIG` and gear-shift.

use crate::{ArqError, Result};
use mercury_frame::grid::{Lattice, PilotLattice};
use mercury_modem::common::{MfskOrder, Modulation, QamOrder};
use serde::{Deserialize, Serialize};

/// One immutable config preset, indexed 0..N-1. Identical at both ends of
/// the link for a given index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub index: u8,
    pub nfft: usize,
    pub nc: usize,
    pub nsymb: usize,
    pub gi: f64,
    pub modulation: Modulation,
    /// Code rate numerator out of 16 (spec: rate in {1/16, ..., 14/16}).
    pub rate_numerator: u8,
    pub carrier_freq: f64,
    pub bandwidth: f64,
    pub preamble_n_symb: usize,
    pub pilot: PilotLattice,
    pub n_streams: usize,
    pub ofdm_rate: f64,
}

impl Preset {
    fn bits_per_symbol(&self) -> usize {
        match self.modulation {
            Modulation::Qam(order) => order.bits_per_symbol(),
            Modulation::Mfsk(order) => order.bits_per_tone() * self.n_streams,
        }
    }

    /// Net application bitrate in bits/second: coded data-cell capacity of
    /// one frame, scaled by the code rate, divided by the frame's airtime.
    pub fn net_bitrate_bps(&self) -> Result<f64> {
        let lattice = Lattice::new(self.nc, self.nsymb, self.pilot)
            .map_err(|e| ArqError::InvalidMessage { msg: e.to_string() })?;
        let (data_cells, _, _, _) = lattice.kind_counts();

        let raw_bits = data_cells as f64 * self.bits_per_symbol() as f64;
        let coded_bits = raw_bits * self.rate_numerator as f64 / 16.0;

        let ngi = (self.nfft as f64 * self.gi).round();
        let symbol_len = self.nfft as f64 + ngi;
        let frame_symbols = (self.preamble_n_symb + self.nsymb) as f64;
        let frame_seconds = frame_symbols * symbol_len / self.ofdm_rate;

        Ok(coded_bits / frame_seconds)
    }
}

/// An ordered set of presets, indexed by gear-shift: index 0 is the most
/// robust (lowest rate), the highest index the fastest (highest rate).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetTable {
    pub presets: Vec<Preset>,
}

impl PresetTable {
    pub fn get(&self, index: u8) -> Result<&Preset> {
        self.presets
            .get(index as usize)
            .ok_or(ArqError::UnknownPreset { index })
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn max_index(&self) -> u8 {
        self.presets.len().saturating_sub(1) as u8
    }
}

/// A small built-in preset ladder spanning the spec's `rate in 1/16..14/16`
/// range at a fixed QPSK/OFDM shape, for the CLI's `-l` listing and for
/// exercising gear-shift without the production preset file.
pub fn default_presets() -> PresetTable {
    let rates = [2u8, 4, 6, 8, 10, 12, 14];
    let pilot = PilotLattice { dx: 2, dy: 4, boost: 1.5 };
    let presets = rates
        .iter()
        .enumerate()
        .map(|(i, &rate_numerator)| Preset {
            index: i as u8,
            nfft: 64,
            nc: 48,
            nsymb: 8,
            gi: 0.25,
            modulation: Modulation::Qam(QamOrder::Qam16),
            rate_numerator,
            carrier_freq: 1500.0,
            bandwidth: 2400.0,
            preamble_n_symb: 2,
            pilot,
            n_streams: 1,
            ofdm_rate: 8000.0,
        })
        .collect();
    PresetTable { presets }
}

/// A companion MFSK ladder, for presets that trade QAM's spectral
/// efficiency for MFSK's low-SNR robustness at the most robust end.
pub fn default_mfsk_preset() -> Preset {
    Preset {
        index: 0,
        nfft: 64,
        nc: 48,
        nsymb: 8,
        gi: 0.25,
        modulation: Modulation::Mfsk(MfskOrder::Mfsk16),
        rate_numerator: 2,
        carrier_freq: 1500.0,
        bandwidth: 2400.0,
        preamble_n_symb: 4,
        pilot: PilotLattice { dx: 2, dy: 4, boost: 1.5 },
        n_streams: 1,
        ofdm_rate: 8000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_increases_with_rate_numerator() {
        let table = default_presets();
        let mut prev = 0.0;
        for preset in &table.presets {
            let rate = preset.net_bitrate_bps().unwrap();
            assert!(rate > prev, "bitrate should increase with rate numerator");
            prev = rate;
        }
    }

    #[test]
    fn unknown_preset_index_is_an_error() {
        let table = default_presets();
        assert!(table.get(table.max_index() + 1).is_err());
    }

    #[test]
    fn mfsk_preset_bitrate_is_positive() {
        let preset = default_mfsk_preset();
        assert!(preset.net_bitrate_bps().unwrap() > 0.0);
    }
}
