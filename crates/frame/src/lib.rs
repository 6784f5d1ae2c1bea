//! Mercury Frame - OFDM resource grid, LDPC coding, and interleaving
//!
//! This crate maps bits onto the OFDM time/frequency grid (framer/deframer),
//! generates the pilot sequence, implements the quasi-cyclic LDPC codec, and
//! provides the bit-level and OFDM-level interleavers.

pub mod grid;
pub mod pilot;
pub mod framer;
pub mod ldpc;
pub mod interleave;
pub mod error;

pub use error::{FrameError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        grid::{CellKind, Lattice, PilotLattice},
        pilot::PilotSequence,
        framer::{Framer, Deframer, PilotObservation},
        ldpc::{QcTables, DecodeAlgorithm, encode as ldpc_encode, decode_gbf, decode_spa},
        interleave::{Interleaver, BlockInterleaver, OfdmInterleaver},
        error::{FrameError, Result},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let result = 2 + 2;
        assert_eq!(result, 4);
    }
}