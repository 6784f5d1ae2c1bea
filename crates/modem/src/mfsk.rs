//! Multi-stream, frequency-hopped MFSK tone modulator
//!
//! Unlike a time-domain mark/space FSK tone, this MFSK operates directly
//! on the frequency-domain bin vector of one OFDM-style symbol
//! period: each of `n_streams` parallel tone streams owns a contiguous band
//! of `M` bins, and one tone per stream per symbol carries `log2(M)` bits.
//! This is the modulation used for the low-SNR, non-coherent ARQ control
//! channel (ACK patterns, `TEST_CONNECTION`).

use crate::common::MfskOrder;
use crate::{ModemError, Result};
use mercury_core::buffer::Complex;

/// Natural binary to reflected Gray code.
fn to_gray(value: usize) -> usize {
    value ^ (value >> 1)
}

/// Inverse of [`to_gray`].
fn from_gray(gray: usize) -> usize {
    let mut value = gray;
    let mut shift = 1;
    while (gray >> shift) != 0 {
        value ^= gray >> shift;
        shift += 1;
    }
    value
}

/// Welch-Costas array construction: `costas[i] = (g^(i+1)) mod p`, a
/// permutation with the property that any nonzero time shift yields at most
/// one coincidence with the original.
pub fn welch_costas(p: u64, g: u64) -> Vec<usize> {
    let mut array = Vec::with_capacity((p - 1) as usize);
    let mut power = g % p;
    for _ in 1..p {
        array.push(power as usize);
        power = (power * g) % p;
    }
    array
}

/// The ARQ ACK pattern: the full 16-tone Welch-Costas (p=17, g=5) array.
/// Using the whole exponential construction (length p-1) is what gives it
/// near-ideal periodic autocorrelation; truncating and duplicating a prefix
/// would reintroduce a coincidence at every multiple-of-the-prefix shift.
pub fn ack_pattern() -> Vec<usize> {
    welch_costas(17, 5)
}

/// One MFSK stream configuration: the band it occupies within the Nc-wide
/// frequency-domain symbol vector.
#[derive(Debug, Clone, Copy)]
struct StreamBand {
    start_bin: usize,
}

/// Frequency-domain MFSK modulator producing one `Nc`-length bin vector per
/// symbol period.
pub struct MfskModulator {
    order: MfskOrder,
    n_streams: usize,
    nc: usize,
    bands: Vec<StreamBand>,
    symbol_index: usize,
}

impl MfskModulator {
    pub fn new(order: MfskOrder, n_streams: usize, nc: usize) -> Result<Self> {
        if !(1..=4).contains(&n_streams) {
            return Err(ModemError::InvalidParameters {
                msg: format!("n_streams must be in 1..=4, got {}", n_streams),
            });
        }
        let m = order.tones();
        let total = n_streams * m;
        if total > nc {
            return Err(ModemError::InvalidParameters {
                msg: format!("{} streams of {} tones do not fit in {} carriers", n_streams, m, nc),
            });
        }
        // Streams allocated adjacently, centered in Nc.
        let guard = (nc - total) / 2;
        let bands = (0..n_streams).map(|s| StreamBand { start_bin: guard + s * m }).collect();

        Ok(Self { order, n_streams, nc, bands, symbol_index: 0 })
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.n_streams * self.order.bits_per_tone()
    }

    /// Encode one symbol period's worth of bits into an `Nc`-length
    /// frequency-domain bin vector.
    pub fn modulate_symbol(&mut self, bits: &[u8]) -> Result<Vec<Complex>> {
        let bps = self.bits_per_symbol();
        if bits.len() != bps {
            return Err(ModemError::InvalidParameters {
                msg: format!("expected {} bits per MFSK symbol, got {}", bps, bits.len()),
            });
        }

        let mut frame = vec![Complex::default(); self.nc];
        let bits_per_tone = self.order.bits_per_tone();
        let m = self.order.tones();
        let hop = self.order.hop_step();

        for (s, chunk) in bits.chunks(bits_per_tone).enumerate() {
            let natural = chunk.iter().fold(0usize, |acc, &b| (acc << 1) | (b as usize & 1));
            let gray = to_gray(natural);
            let hopped = (gray + self.symbol_index * hop) % m;
            let bin = self.bands[s].start_bin + hopped;
            frame[bin] = Complex::new(1.0, 0.0);
        }

        self.symbol_index += 1;
        Ok(frame)
    }

    pub fn reset(&mut self) {
        self.symbol_index = 0;
    }
}

/// Reverses [`MfskModulator`]: per-bin energy in, per-bit soft LLR out.
pub struct MfskDemodulator {
    order: MfskOrder,
    bands: Vec<StreamBand>,
    nc: usize,
    symbol_index: usize,
}

impl MfskDemodulator {
    pub fn new(order: MfskOrder, n_streams: usize, nc: usize) -> Result<Self> {
        let modulator = MfskModulator::new(order, n_streams, nc)?;
        Ok(Self { order, bands: modulator.bands, nc, symbol_index: 0 })
    }

    /// Estimate noise variance from bin energies outside every stream band.
    fn noise_variance(&self, energies: &[f64]) -> f64 {
        let m = self.order.tones();
        let mut outside_sum = 0.0;
        let mut outside_count = 0usize;
        'bins: for (bin, &e) in energies.iter().enumerate() {
            for band in &self.bands {
                if bin >= band.start_bin && bin < band.start_bin + m {
                    continue 'bins;
                }
            }
            outside_sum += e;
            outside_count += 1;
        }
        if outside_count == 0 {
            1e-6
        } else {
            (outside_sum / outside_count as f64).max(1e-12)
        }
    }

    /// Demodulate one symbol period. `frame` holds per-bin energy (|X[k]|^2)
    /// for the current symbol.
    pub fn demodulate_symbol(&mut self, frame: &[f64]) -> Result<Vec<f64>> {
        if frame.len() != self.nc {
            return Err(ModemError::InvalidParameters {
                msg: format!("expected {} bins, got {}", self.nc, frame.len()),
            });
        }

        let sigma2 = self.noise_variance(frame);
        let m = self.order.tones();
        let hop = self.order.hop_step();
        let bits_per_tone = self.order.bits_per_tone();
        let mut llrs = Vec::with_capacity(self.bands.len() * bits_per_tone);

        for band in &self.bands {
            // Reverse the hop: energy at absolute tone `t` in this symbol
            // came from gray code `(t - symbol_index*hop) mod M`.
            let mut gray_energy = vec![0.0f64; m];
            for t in 0..m {
                let gray = ((t + m) as isize - (self.symbol_index * hop) as isize).rem_euclid(m as isize) as usize;
                gray_energy[gray] = frame[band.start_bin + t];
            }

            for k in 0..bits_per_tone {
                let bit_pos = bits_per_tone - 1 - k;
                let mut max_zero = f64::NEG_INFINITY;
                let mut max_one = f64::NEG_INFINITY;
                for gray in 0..m {
                    let natural = from_gray(gray);
                    let bit = (natural >> bit_pos) & 1;
                    if bit == 0 {
                        max_zero = max_zero.max(gray_energy[gray]);
                    } else {
                        max_one = max_one.max(gray_energy[gray]);
                    }
                }
                let llr = ((max_zero - max_one) / (2.0 * sigma2)).clamp(-5.0, 5.0);
                llrs.push(llr);
            }
        }

        self.symbol_index += 1;
        Ok(llrs)
    }

    pub fn reset(&mut self) {
        self.symbol_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_code_is_involutive() {
        for v in 0..32 {
            assert_eq!(from_gray(to_gray(v)), v);
        }
    }

    #[test]
    fn welch_costas_has_requested_length() {
        let array = welch_costas(17, 5);
        assert_eq!(array.len(), 16);
        assert!(array.iter().all(|&v| v >= 1 && v <= 16));
    }

    #[test]
    fn ack_pattern_has_bounded_periodic_coincidences() {
        let pattern = ack_pattern();
        assert_eq!(pattern.len(), 16);
        let n = pattern.len();
        for shift in 1..n {
            let coincidences = (0..n).filter(|&i| pattern[i] == pattern[(i + shift) % n]).count();
            assert!(coincidences <= 1, "shift {} has {} coincidences", shift, coincidences);
        }
    }

    #[test]
    fn modulate_then_demodulate_noiseless_recovers_bits() {
        let mut modulator = MfskModulator::new(MfskOrder::Mfsk16, 2, 64).unwrap();
        let mut demodulator = MfskDemodulator::new(MfskOrder::Mfsk16, 2, 64).unwrap();

        let bits = vec![1, 0, 1, 1, 0, 0, 1, 0];
        let frame = modulator.modulate_symbol(&bits).unwrap();

        let energies: Vec<f64> = frame.iter().map(|c| c.norm_sqr() + 1e-9).collect();
        let llrs = demodulator.demodulate_symbol(&energies).unwrap();

        for (bit, llr) in bits.iter().zip(llrs.iter()) {
            if *bit == 0 {
                assert!(*llr > 0.0);
            } else {
                assert!(*llr < 0.0);
            }
        }
    }

    #[test]
    fn rejects_streams_that_overflow_carriers() {
        assert!(MfskModulator::new(MfskOrder::Mfsk32, 4, 64).is_err());
    }
}
