//! QAM constellation mapping and soft demapping
//!
//! Unlike a single-carrier modulator, QAM here is a per-subcarrier symbol
//! mapper consumed by the OFDM engine: it has no waveform or symbol-rate
//! of its own, just bits-to-point and point-to-soft-bits.

use crate::common::QamOrder;
use crate::{ModemError, Result};
use mercury_core::buffer::Complex;

/// A fixed constellation for one QAM order, centered on the origin and
/// scaled to unit average symbol energy.
#[derive(Debug, Clone)]
pub struct QamConfig {
    pub order: QamOrder,
    points: Vec<Complex>,
}

impl QamConfig {
    pub fn new(order: QamOrder) -> Self {
        let points = match order {
            QamOrder::Bpsk => bpsk_points(),
            QamOrder::Qpsk => square_qam_points(2),
            QamOrder::Qam8 => star_8qam_points(),
            QamOrder::Qam16 => square_qam_points(4),
            QamOrder::Qam32 => cross_32qam_points(),
            QamOrder::Qam64 => square_qam_points(8),
        };
        let points = normalize_energy(points);
        Self { order, points }
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.order.bits_per_symbol()
    }

    pub fn points(&self) -> &[Complex] {
        &self.points
    }
}

fn bpsk_points() -> Vec<Complex> {
    vec![Complex::new(1.0, 0.0), Complex::new(-1.0, 0.0)]
}

/// Square M-QAM with natural (non-Gray) bit ordering: bit pattern `idx`,
/// MSB-first, directly indexes a side x side grid laid out in raster order.
fn square_qam_points(side: usize) -> Vec<Complex> {
    let mut points = Vec::with_capacity(side * side);
    let levels: Vec<f64> = (0..side).map(|i| 2.0 * i as f64 - (side - 1) as f64).collect();
    for &i in &levels {
        for &q in &levels {
            points.push(Complex::new(i, q));
        }
    }
    points
}

/// 8-QAM: a square-ish constellation isn't a power-of-two grid, so use two
/// amplitude rings of 4 phases each (a common rectangular-8QAM layout).
fn star_8qam_points() -> Vec<Complex> {
    let mut points = Vec::with_capacity(8);
    for k in 0..4 {
        let theta = std::f64::consts::FRAC_PI_4 + k as f64 * std::f64::consts::FRAC_PI_2;
        points.push(Complex::new(theta.cos(), theta.sin()));
    }
    for k in 0..4 {
        let theta = k as f64 * std::f64::consts::FRAC_PI_2;
        points.push(Complex::new(2.0 * theta.cos(), 2.0 * theta.sin()));
    }
    points
}

/// 32-QAM cross constellation: a 6x6 square grid with the four corners
/// removed, in raster order over the remaining 32 points.
fn cross_32qam_points() -> Vec<Complex> {
    let side = 6;
    let levels: Vec<f64> = (0..side).map(|i| 2.0 * i as f64 - (side - 1) as f64).collect();
    let mut points = Vec::with_capacity(32);
    for (ri, &i) in levels.iter().enumerate() {
        for (rq, &q) in levels.iter().enumerate() {
            let is_corner = (ri == 0 || ri == side - 1) && (rq == 0 || rq == side - 1);
            if is_corner {
                continue;
            }
            points.push(Complex::new(i, q));
        }
    }
    points
}

fn normalize_energy(points: Vec<Complex>) -> Vec<Complex> {
    let avg_energy: f64 = points.iter().map(|p| p.norm_sqr()).sum::<f64>() / points.len() as f64;
    let scale = 1.0 / avg_energy.sqrt();
    points.into_iter().map(|p| p * scale).collect()
}

/// Maps/demaps bits to/from a fixed QAM constellation using natural
/// (MSB-first) bit ordering.
pub struct QamModulator {
    config: QamConfig,
}

impl QamModulator {
    pub fn new(order: QamOrder) -> Self {
        Self { config: QamConfig::new(order) }
    }

    pub fn config(&self) -> &QamConfig {
        &self.config
    }

    /// Map one group of `bits_per_symbol` bits (each 0/1) to a constellation
    /// point.
    pub fn map_symbol(&self, bits: &[u8]) -> Result<Complex> {
        let bps = self.config.bits_per_symbol();
        if bits.len() != bps {
            return Err(ModemError::InvalidParameters {
                msg: format!("expected {} bits per QAM symbol, got {}", bps, bits.len()),
            });
        }
        let index = bits.iter().fold(0usize, |acc, &b| (acc << 1) | (b as usize & 1));
        Ok(self.config.points()[index])
    }

    /// Map a full bit stream (length a multiple of bits_per_symbol) to
    /// symbols.
    pub fn modulate(&self, bits: &[u8]) -> Result<Vec<Complex>> {
        let bps = self.config.bits_per_symbol();
        if bits.len() % bps != 0 {
            return Err(ModemError::InvalidParameters {
                msg: format!("bit stream length {} is not a multiple of {}", bits.len(), bps),
            });
        }
        bits.chunks(bps).map(|chunk| self.map_symbol(chunk)).collect()
    }

    /// Max-log soft LLR demapper. `noise_variance` comes from the channel
    /// estimator; larger variance compresses the LLR magnitudes.
    pub fn demodulate_llr(&self, symbol: Complex, noise_variance: f64) -> Vec<f64> {
        let bps = self.config.bits_per_symbol();
        let sigma2 = noise_variance.max(1e-12);
        let mut llrs = Vec::with_capacity(bps);

        for k in 0..bps {
            let bit_pos = bps - 1 - k;
            let mut min_zero = f64::INFINITY;
            let mut min_one = f64::INFINITY;
            for (idx, &point) in self.config.points().iter().enumerate() {
                let dist = (symbol - point).norm_sqr();
                if (idx >> bit_pos) & 1 == 0 {
                    min_zero = min_zero.min(dist);
                } else {
                    min_one = min_one.min(dist);
                }
            }
            llrs.push((min_zero - min_one) / sigma2);
        }
        llrs
    }

    /// Hard-decision demap: nearest constellation point, bits MSB-first.
    pub fn demodulate_hard(&self, symbol: Complex) -> Vec<u8> {
        let bps = self.config.bits_per_symbol();
        let best = self
            .config
            .points()
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (symbol - **a).norm_sqr().partial_cmp(&(symbol - **b).norm_sqr()).unwrap()
            })
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        (0..bps).map(|k| ((best >> (bps - 1 - k)) & 1) as u8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constellations_have_unit_average_energy() {
        for order in [
            QamOrder::Bpsk,
            QamOrder::Qpsk,
            QamOrder::Qam8,
            QamOrder::Qam16,
            QamOrder::Qam32,
            QamOrder::Qam64,
        ] {
            let config = QamConfig::new(order);
            let avg: f64 = config.points().iter().map(|p| p.norm_sqr()).sum::<f64>() / config.points().len() as f64;
            assert!((avg - 1.0).abs() < 1e-9, "{:?} average energy {}", order, avg);
        }
    }

    #[test]
    fn constellation_sizes_match_order() {
        assert_eq!(QamConfig::new(QamOrder::Qam16).points().len(), 16);
        assert_eq!(QamConfig::new(QamOrder::Qam32).points().len(), 32);
        assert_eq!(QamConfig::new(QamOrder::Qam64).points().len(), 64);
    }

    #[test]
    fn hard_decision_roundtrips_noiseless() {
        let modulator = QamModulator::new(QamOrder::Qam16);
        let bits = vec![1, 0, 1, 1];
        let symbol = modulator.map_symbol(&bits).unwrap();
        let recovered = modulator.demodulate_hard(symbol);
        assert_eq!(recovered, bits);
    }

    #[test]
    fn llr_sign_matches_transmitted_bit() {
        let modulator = QamModulator::new(QamOrder::Qpsk);
        let bits = vec![0, 1];
        let symbol = modulator.map_symbol(&bits).unwrap();
        let llrs = modulator.demodulate_llr(symbol, 0.1);
        // LLR convention: positive means bit=0 more likely.
        assert!(llrs[0] > 0.0);
        assert!(llrs[1] < 0.0);
    }

    #[test]
    fn rejects_wrong_bit_count() {
        let modulator = QamModulator::new(QamOrder::Qam16);
        assert!(modulator.map_symbol(&[1, 0]).is_err());
    }

    /// Mapping bits to a constellation point and hard-demapping it back is a
    /// bijection on the bit pattern, for every order and any bit string.
    #[quickcheck_macros::quickcheck]
    fn hard_decision_roundtrips_arbitrary_bits(raw_bits: Vec<bool>, order_idx: u8) -> bool {
        let orders = [
            QamOrder::Bpsk,
            QamOrder::Qpsk,
            QamOrder::Qam8,
            QamOrder::Qam16,
            QamOrder::Qam32,
            QamOrder::Qam64,
        ];
        let order = orders[order_idx as usize % orders.len()];
        let modulator = QamModulator::new(order);
        let bps = modulator.config().bits_per_symbol();
        if raw_bits.is_empty() {
            return true;
        }
        let bits: Vec<u8> = (0..bps).map(|i| raw_bits[i % raw_bits.len()] as u8).collect();

        let Ok(symbol) = modulator.map_symbol(&bits) else {
            return false;
        };
        modulator.demodulate_hard(symbol) == bits
    }
}
