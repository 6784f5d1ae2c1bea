//! Time/frequency synchronization and pilot-aided channel estimation
//!
//! Pulled out of the OFDM demodulator's `find_symbol_start`/`cp_correlation_at`
//! and generalized: coarse time sync via cyclic-prefix correlation, carrier
//! frequency offset via preamble half-symbol autocorrelation, and bilinear
//! channel interpolation from sparse pilot observations.

use mercury_core::buffer::Complex;
use mercury_frame::framer::PilotObservation;

/// Normalized cyclic-prefix correlation at a candidate symbol-start offset:
/// the CP is a copy of the symbol tail, so correlating the two should peak
/// exactly at the true start.
pub fn cp_correlation_at(buf: &[Complex], nfft: usize, ngi: usize, offset: usize) -> f64 {
    if offset + nfft + ngi > buf.len() {
        return 0.0;
    }
    let mut num_r = 0.0;
    let mut num_i = 0.0;
    let mut p1 = 0.0;
    let mut p2 = 0.0;
    for n in 0..ngi {
        let a = buf[offset + n];
        let b = buf[offset + nfft + n];
        num_r += a.real * b.real + a.imag * b.imag;
        num_i += a.imag * b.real - a.real * b.imag;
        p1 += a.norm_sqr();
        p2 += b.norm_sqr();
    }
    let denom = (p1 * p2).sqrt();
    if denom <= 1e-12 {
        0.0
    } else {
        (num_r * num_r + num_i * num_i).sqrt() / denom
    }
}

/// Slides the CP correlator across `buf` and returns the `location_to_return`
/// (0-based) highest-scoring offset, tolerating one or more off-peak false
/// matches ahead of the true symbol start.
pub fn find_symbol_start(
    buf: &[Complex],
    nfft: usize,
    ngi: usize,
    location_to_return: usize,
) -> Option<(usize, f64)> {
    let need = nfft + ngi;
    if buf.len() < need {
        return None;
    }
    let max_off = buf.len() - need;
    let mut scored: Vec<(usize, f64)> = (0..=max_off).map(|off| (off, cp_correlation_at(buf, nfft, ngi, off))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    scored.into_iter().nth(location_to_return)
}

/// Auxiliary symbol sync exploiting the preamble's two identical halves: a
/// half-symbol self-correlation peak marks the preamble boundary.
pub fn half_symbol_self_correlation(buf: &[Complex], half_len: usize, offset: usize) -> f64 {
    if offset + 2 * half_len > buf.len() {
        return 0.0;
    }
    let mut num_r = 0.0;
    let mut num_i = 0.0;
    let mut p1 = 0.0;
    let mut p2 = 0.0;
    for n in 0..half_len {
        let a = buf[offset + n];
        let b = buf[offset + half_len + n];
        num_r += a.real * b.real + a.imag * b.imag;
        num_i += a.imag * b.real - a.real * b.imag;
        p1 += a.norm_sqr();
        p2 += b.norm_sqr();
    }
    let denom = (p1 * p2).sqrt();
    if denom <= 1e-12 {
        0.0
    } else {
        (num_r * num_r + num_i * num_i).sqrt() / denom
    }
}

/// Carrier frequency offset from a preamble of two identical halves: `x1`,
/// `x2` are the zero-depadded FFTs (over the Nc data bins) of the first and
/// second half respectively.
pub fn frequency_offset(
    x1: &[Complex],
    x2: &[Complex],
    sample_rate: f64,
    nfft: usize,
    freq_offset_ignore_limit: f64,
) -> f64 {
    let mut acc = Complex::default();
    for (a, b) in x1.iter().zip(x2.iter()) {
        // conj(x2) * x1
        acc = acc + Complex::new(b.real * a.real + b.imag * a.imag, b.real * a.imag - b.imag * a.real);
    }
    if acc.norm() <= 1e-12 {
        return 0.0;
    }
    let angle = acc.imag.atan2(acc.real);
    let delta_f = (sample_rate / nfft as f64) * (angle / std::f64::consts::PI);
    if delta_f.abs() < freq_offset_ignore_limit {
        0.0
    } else {
        delta_f
    }
}

/// Per-cell channel estimate tagged by whether it came from a direct pilot
/// measurement or was interpolated.
#[derive(Debug, Clone, Copy)]
enum CellEstimate {
    Measured(Complex),
    Interpolated(Complex),
}

/// Builds a dense `H[t, f]` channel-estimate grid from sparse pilot
/// observations by time-axis interpolation within pilot columns, then
/// frequency-axis bilinear interpolation between pilot columns.
pub struct ChannelEstimator {
    nsymb: usize,
    nc: usize,
}

impl ChannelEstimator {
    pub fn new(nsymb: usize, nc: usize) -> Self {
        Self { nsymb, nc }
    }

    /// Returns the dense `H` grid in row-major `[t * nc + f]` order.
    pub fn estimate(&self, observations: &[PilotObservation]) -> Vec<Complex> {
        let mut measured: Vec<Vec<Option<Complex>>> = vec![vec![None; self.nsymb]; self.nc];
        for obs in observations {
            if obs.reference.norm() > 1e-9 {
                measured[obs.f][obs.t] = Some(obs.received / obs.reference);
            }
        }

        let pilot_cols: Vec<usize> = (0..self.nc).filter(|&f| measured[f].iter().any(|v| v.is_some())).collect();

        // Step 1: interpolate/extrapolate within each pilot column across time.
        let mut col_estimates: Vec<Vec<Complex>> = vec![vec![Complex::new(1.0, 0.0); self.nsymb]; self.nc];
        for &f in &pilot_cols {
            col_estimates[f] = interpolate_time_column(&measured[f]);
        }

        // Step 2: bilinear interpolation across frequency between the two
        // nearest pilot columns for every cell, including pilot columns
        // themselves getting their measured value verbatim.
        let mut grid = vec![Complex::new(1.0, 0.0); self.nsymb * self.nc];
        if pilot_cols.is_empty() {
            return grid;
        }

        for f in 0..self.nc {
            if let Ok(pos) = pilot_cols.binary_search(&f) {
                for t in 0..self.nsymb {
                    grid[t * self.nc + f] = col_estimates[pilot_cols[pos]][t];
                }
                continue;
            }

            let (left, right) = nearest_pilot_columns(&pilot_cols, f);
            for t in 0..self.nsymb {
                let value = match (left, right) {
                    (Some(l), Some(r)) => {
                        let frac = (f - l) as f64 / (r - l) as f64;
                        col_estimates[l][t] * (1.0 - frac) + col_estimates[r][t] * frac
                    }
                    // Cells outside any pilot column: extrapolate against the
                    // nearest pilot column and the last subcarrier.
                    (Some(l), None) => col_estimates[l][t],
                    (None, Some(r)) => col_estimates[r][t],
                    (None, None) => Complex::new(1.0, 0.0),
                };
                grid[t * self.nc + f] = value;
            }
        }

        grid
    }
}

fn interpolate_time_column(column: &[Option<Complex>]) -> Vec<Complex> {
    let n = column.len();
    let known: Vec<usize> = (0..n).filter(|&t| column[t].is_some()).collect();
    if known.is_empty() {
        return vec![Complex::new(1.0, 0.0); n];
    }

    let mut result = vec![Complex::default(); n];
    for t in 0..n {
        if let Some(v) = column[t] {
            result[t] = v;
            continue;
        }
        let before = known.iter().rev().find(|&&k| k < t).copied();
        let after = known.iter().find(|&&k| k > t).copied();
        result[t] = match (before, after) {
            (Some(b), Some(a)) => {
                let frac = (t - b) as f64 / (a - b) as f64;
                column[b].unwrap() * (1.0 - frac) + column[a].unwrap() * frac
            }
            (Some(b), None) => {
                // Extrapolate edge by linear continuation using the last two
                // known points, if available.
                if let Some(&b2) = known.iter().rev().nth(1) {
                    let slope = (column[b].unwrap() - column[b2].unwrap()) * (1.0 / (b - b2) as f64);
                    column[b].unwrap() + slope * (t - b) as f64
                } else {
                    column[b].unwrap()
                }
            }
            (None, Some(a)) => {
                if let Some(&a2) = known.iter().nth(1) {
                    let slope = (column[a2].unwrap() - column[a].unwrap()) * (1.0 / (a2 - a) as f64);
                    column[a].unwrap() - slope * (a - t) as f64
                } else {
                    column[a].unwrap()
                }
            }
            (None, None) => Complex::new(1.0, 0.0),
        };
    }
    result
}

fn nearest_pilot_columns(pilot_cols: &[usize], f: usize) -> (Option<usize>, Option<usize>) {
    let left = pilot_cols.iter().rev().find(|&&c| c < f).copied();
    let right = pilot_cols.iter().find(|&&c| c > f).copied();
    (left, right)
}

/// Zero-forcing equalization: `Ŝ[t,f] = Y[t,f] / H_est[t,f]`.
pub fn equalize(received: &[Complex], channel: &[Complex]) -> Vec<Complex> {
    received.iter().zip(channel.iter()).map(|(&y, &h)| if h.norm() > 1e-9 { y / h } else { y }).collect()
}

/// SNR estimate from the spread of pilot-cell residuals (after equalization,
/// should collapse to the known reference) versus average pilot power.
pub fn estimate_snr_db(observations: &[PilotObservation], channel: &[Complex], nc: usize) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let mut signal_power = 0.0;
    let mut noise_power = 0.0;
    for obs in observations {
        let h = channel[obs.t * nc + obs.f];
        if h.norm() <= 1e-9 {
            continue;
        }
        let equalized = obs.received / h;
        let residual = equalized - obs.reference;
        signal_power += obs.reference.norm_sqr();
        noise_power += residual.norm_sqr();
    }
    if noise_power <= 1e-15 {
        return 60.0;
    }
    10.0 * (signal_power / noise_power).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp_correlation_peaks_at_true_offset() {
        let nfft = 16;
        let ngi = 4;
        let symbol: Vec<Complex> = (0..nfft).map(|i| Complex::new((i as f64).sin(), (i as f64).cos())).collect();
        let mut buf = vec![Complex::default(); 3];
        buf.extend_from_slice(&symbol[nfft - ngi..]);
        buf.extend_from_slice(&symbol);
        buf.extend(vec![Complex::default(); 5]);

        let (offset, score) = find_symbol_start(&buf, nfft, ngi, 0).unwrap();
        assert_eq!(offset, 3);
        assert!(score > 0.9);
    }

    #[test]
    fn frequency_offset_is_zero_for_identical_halves() {
        let x1: Vec<Complex> = (0..8).map(|i| Complex::new(i as f64, 0.0)).collect();
        let x2 = x1.clone();
        let f = frequency_offset(&x1, &x2, 48000.0, 64, 0.1);
        assert_eq!(f, 0.0);
    }

    #[test]
    fn channel_estimate_recovers_constant_gain() {
        let nsymb = 6;
        let nc = 8;
        let gain = Complex::new(0.5, 0.2);
        let mut observations = Vec::new();
        for f in [0usize, 3, 7] {
            for t in 0..nsymb {
                let reference = Complex::new(1.0, 0.0);
                observations.push(PilotObservation { t, f, received: reference * gain, reference });
            }
        }

        let estimator = ChannelEstimator::new(nsymb, nc);
        let grid = estimator.estimate(&observations);

        for t in 0..nsymb {
            for f in 0..nc {
                let h = grid[t * nc + f];
                assert!((h.real - gain.real).abs() < 1e-9);
                assert!((h.imag - gain.imag).abs() < 1e-9);
            }
        }
    }
}
