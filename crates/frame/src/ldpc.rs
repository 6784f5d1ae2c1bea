//! Quasi-cyclic LDPC encoding and decoding
//!
//! The production parity-check tables (one set per supported rate, keyed by
//! K) are opaque data external to this crate; `QcTables` only fixes their
//! shape. Callers supply tables matching their chosen (N, K); tests and the
//! CLI self-test modes use [`QcTables::single_parity_check`] as a small,
//! synthetically-valid stand-in.

use crate::{FrameError, Result};

/// Which decoding algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeAlgorithm {
    /// Gradient bit-flipping: fast, degrades at low SNR.
    Gbf,
    /// Sum-product (log-domain min-sum, layered schedule).
    Spa,
}

/// Parity-check and encoder tables for one (N, K) quasi-cyclic code.
///
/// `check_neighbors[c]` lists the variable-node indices incident to check
/// `c` (padded to a common width with `-1`). `var_neighbors[v]` is the dual:
/// the check-node indices incident to variable `v`. `enc_indices[i]` lists
/// the indices (into the length-N codeword, systematic bits and
/// already-computed parity bits) that are XORed to produce parity bit `K+i`.
#[derive(Debug, Clone)]
pub struct QcTables {
    pub n: usize,
    pub k: usize,
    pub check_neighbors: Vec<Vec<i32>>,
    pub var_neighbors: Vec<Vec<i32>>,
    pub enc_indices: Vec<Vec<i32>>,
}

impl QcTables {
    pub fn p(&self) -> usize {
        self.n - self.k
    }

    fn validate(&self) -> Result<()> {
        if self.k >= self.n {
            return Err(FrameError::InvalidFecParameters {
                msg: format!("K must be less than N (K={}, N={})", self.k, self.n),
            });
        }
        if self.check_neighbors.len() != self.p() {
            return Err(FrameError::InvalidFecParameters {
                msg: "check_neighbors row count must equal P = N - K".to_string(),
            });
        }
        if self.var_neighbors.len() != self.n {
            return Err(FrameError::InvalidFecParameters {
                msg: "var_neighbors row count must equal N".to_string(),
            });
        }
        if self.enc_indices.len() != self.p() {
            return Err(FrameError::InvalidFecParameters {
                msg: "enc_indices row count must equal P = N - K".to_string(),
            });
        }
        Ok(())
    }

    /// Build a small single-parity-check-per-bit-group code: splits the
    /// systematic bits into P groups, one parity bit XORs each group.
    /// Not a real LDPC design, but it is a valid, self-consistent QC-style
    /// table usable for exercising the encode/decode machinery in tests and
    /// the CLI's `TX_TEST`/`RX_TEST` self-check.
    pub fn single_parity_check(k: usize, p: usize) -> Result<Self> {
        if p == 0 || k == 0 {
            return Err(FrameError::InvalidFecParameters {
                msg: "K and P must both be greater than 0".to_string(),
            });
        }
        let n = k + p;
        let group = k.div_ceil(p);

        let mut enc_indices = vec![Vec::new(); p];
        let mut check_neighbors = vec![Vec::new(); p];
        let mut var_neighbors = vec![Vec::new(); n];

        for (i, enc_row) in enc_indices.iter_mut().enumerate() {
            let start = i * group;
            let end = (start + group).min(k);
            for v in start..end {
                enc_row.push(v as i32);
                check_neighbors[i].push(v as i32);
                var_neighbors[v].push(i as i32);
            }
            // Each parity bit also participates in its own check (it is
            // defined as the XOR of the group, so the check on row i also
            // includes the parity bit itself).
            check_neighbors[i].push((k + i) as i32);
            var_neighbors[k + i].push(i as i32);
        }

        let tables = Self {
            n,
            k,
            check_neighbors,
            var_neighbors,
            enc_indices,
        };
        tables.validate()?;
        Ok(tables)
    }
}

/// Encode: systematic bits copied verbatim, then parity-accumulate the P
/// parity bits per `enc_indices`.
pub fn encode(tables: &QcTables, data: &[u8]) -> Result<Vec<u8>> {
    tables.validate()?;
    if data.len() != tables.k {
        return Err(FrameError::SizeMismatch {
            expected: tables.k,
            actual: data.len(),
        });
    }

    let mut encoded = vec![0u8; tables.n];
    encoded[..tables.k].copy_from_slice(data);

    for (i, row) in tables.enc_indices.iter().enumerate() {
        let mut bit = 0u8;
        for &idx in row {
            if idx >= 0 {
                bit ^= encoded[idx as usize];
            }
        }
        encoded[tables.k + i] = bit;
    }

    Ok(encoded)
}

fn syndrome(tables: &QcTables, bits: &[u8]) -> Vec<u8> {
    tables
        .check_neighbors
        .iter()
        .map(|row| {
            row.iter()
                .filter(|&&idx| idx >= 0)
                .fold(0u8, |acc, &idx| acc ^ bits[idx as usize])
        })
        .collect()
}

/// Gradient bit-flipping decoder. Returns the hard-decided codeword and the
/// number of iterations actually run.
pub fn decode_gbf(
    tables: &QcTables,
    llr: &[f64],
    max_iterations: usize,
    eta: f64,
) -> Result<(Vec<u8>, usize)> {
    tables.validate()?;
    if llr.len() != tables.n {
        return Err(FrameError::SizeMismatch {
            expected: tables.n,
            actual: llr.len(),
        });
    }

    let mut bits: Vec<u8> = llr.iter().map(|&l| if l >= 0.0 { 0 } else { 1 }).collect();

    let mut iterations = 0;
    for _ in 0..max_iterations {
        iterations += 1;
        let synd = syndrome(tables, &bits);
        if synd.iter().all(|&s| s == 0) {
            break;
        }

        let mut best_v = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for v in 0..tables.n {
            let violated = tables.var_neighbors[v]
                .iter()
                .filter(|&&c| c >= 0 && synd[c as usize] != 0)
                .count();
            let score = violated as f64 - eta * llr[v].abs();
            if score > best_score {
                best_score = score;
                best_v = v;
            }
        }
        if best_score <= 0.0 {
            break;
        }
        bits[best_v] ^= 1;
    }

    Ok((bits, iterations))
}

/// Sum-product (log-domain min-sum) decoder with a layered check-node
/// schedule. Returns the hard-decided codeword and iterations run.
pub fn decode_spa(
    tables: &QcTables,
    llr: &[f64],
    max_iterations: usize,
) -> Result<(Vec<u8>, usize)> {
    tables.validate()?;
    if llr.len() != tables.n {
        return Err(FrameError::SizeMismatch {
            expected: tables.n,
            actual: llr.len(),
        });
    }

    let p = tables.p();
    // R[c][slot] / Q[c][slot] indexed in lockstep with check_neighbors[c].
    let mut r: Vec<Vec<f64>> = tables.check_neighbors.iter().map(|row| vec![0.0; row.len()]).collect();
    let mut q: Vec<Vec<f64>> = tables
        .check_neighbors
        .iter()
        .map(|row| row.iter().map(|&idx| if idx >= 0 { llr[idx as usize] } else { 0.0 }).collect())
        .collect();

    let mut iterations = 0;
    let mut bits = vec![0u8; tables.n];

    for _ in 0..max_iterations {
        iterations += 1;

        // Check-node update: R[c->v] = (prod of signs) * min|Q| over other neighbors.
        for c in 0..p {
            let row = &tables.check_neighbors[c];
            let qs = &q[c];
            for (slot, &idx) in row.iter().enumerate() {
                if idx < 0 {
                    continue;
                }
                let mut sign = 1.0f64;
                let mut min_abs = f64::INFINITY;
                for (other_slot, &other_idx) in row.iter().enumerate() {
                    if other_slot == slot || other_idx < 0 {
                        continue;
                    }
                    let val = qs[other_slot];
                    sign *= val.signum_or_one();
                    min_abs = min_abs.min(val.abs());
                }
                r[c][slot] = sign * min_abs;
            }
        }

        // Variable-node update: Q[v->c] = LLR_init[v] + sum of R[c'->v] over other checks.
        let mut total_llr = llr.to_vec();
        for (c, row) in tables.check_neighbors.iter().enumerate() {
            for (slot, &idx) in row.iter().enumerate() {
                if idx >= 0 {
                    total_llr[idx as usize] += r[c][slot];
                }
            }
        }
        for (c, row) in tables.check_neighbors.iter().enumerate() {
            for (slot, &idx) in row.iter().enumerate() {
                if idx >= 0 {
                    q[c][slot] = total_llr[idx as usize] - r[c][slot];
                }
            }
        }

        for (v, total) in total_llr.iter().enumerate() {
            bits[v] = if *total >= 0.0 { 0 } else { 1 };
        }

        if syndrome(tables, &bits).iter().all(|&s| s == 0) {
            break;
        }
    }

    Ok((bits, iterations))
}

trait SignumOrOne {
    fn signum_or_one(self) -> f64;
}

impl SignumOrOne for f64 {
    fn signum_or_one(self) -> f64 {
        if self == 0.0 {
            1.0
        } else {
            self.signum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_tables() -> QcTables {
        QcTables::single_parity_check(8, 4).unwrap()
    }

    #[test]
    fn systematic_prefix_matches_input() {
        let tables = tiny_tables();
        let data = vec![1, 0, 1, 1, 0, 0, 1, 0];
        let codeword = encode(&tables, &data).unwrap();
        assert_eq!(&codeword[..tables.k], &data[..]);
    }

    #[test]
    fn codeword_has_zero_syndrome() {
        let tables = tiny_tables();
        let data = vec![1, 1, 0, 0, 1, 0, 1, 1];
        let codeword = encode(&tables, &data).unwrap();
        let synd = syndrome(&tables, &codeword);
        assert!(synd.iter().all(|&s| s == 0));
    }

    #[test]
    fn gbf_corrects_single_bit_flip() {
        let tables = tiny_tables();
        let data = vec![0, 1, 1, 0, 1, 0, 0, 1];
        let codeword = encode(&tables, &data).unwrap();

        let mut llr: Vec<f64> = codeword.iter().map(|&b| if b == 0 { 4.0 } else { -4.0 }).collect();
        llr[2] = -llr[2]; // flip confidence on bit 2 to simulate a channel error

        let (decoded, _iters) = decode_gbf(&tables, &llr, 50, 0.5).unwrap();
        assert_eq!(&decoded[..tables.k], &data[..]);
    }

    #[test]
    fn spa_corrects_single_bit_flip() {
        let tables = tiny_tables();
        let data = vec![1, 0, 0, 1, 1, 1, 0, 0];
        let codeword = encode(&tables, &data).unwrap();

        let mut llr: Vec<f64> = codeword.iter().map(|&b| if b == 0 { 5.0 } else { -5.0 }).collect();
        llr[5] = -llr[5];

        let (decoded, _iters) = decode_spa(&tables, &llr, 30).unwrap();
        assert_eq!(&decoded[..tables.k], &data[..]);
    }

    #[test]
    fn rejects_data_length_mismatch() {
        let tables = tiny_tables();
        let result = encode(&tables, &[0, 1, 0]);
        assert!(result.is_err());
    }

    /// Every codeword `encode` produces satisfies every parity check,
    /// regardless of the systematic payload.
    #[quickcheck_macros::quickcheck]
    fn every_codeword_has_zero_syndrome(bits: Vec<bool>) -> bool {
        let tables = tiny_tables();
        if bits.is_empty() {
            return true;
        }
        let data: Vec<u8> = (0..tables.k).map(|i| bits[i % bits.len()] as u8).collect();
        let Ok(codeword) = encode(&tables, &data) else {
            return false;
        };
        syndrome(&tables, &codeword).iter().all(|&s| s == 0)
    }
}
