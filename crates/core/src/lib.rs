//! Mercury Core - DSP primitives and signal processing
//!
//! This crate provides fundamental DSP operations, sample buffers,
//! resampling, filtering, FFT wrappers, and the lockless ring buffer that
//! bridges the audio I/O threads and the modem thread.

pub mod buffer;
pub mod filter;
pub mod fft;
pub mod resample;
pub mod ring;
pub mod error;

pub use error::{CoreError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        buffer::{SampleBuffer, ComplexBuffer},
        filter::{Filter, FirFilter, IirFilter},
        fft::{FftProcessor, FftConfig},
        resample::Resampler,
        ring::{Ring, RingFlags},
        error::{CoreError, Result},
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