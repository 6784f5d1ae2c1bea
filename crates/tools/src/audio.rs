//! Audio I/O capability trait (spec.md §9's re-architecture guidance for
//! `ffaudio_interface`'s function-pointer table) and the two backends this
//! port ships: a WAV file backend for the `*_TEST`/`PLOT_*` modes, and a
//! null backend for when no hardware is configured.
//!
//! Fixed format throughout: 48 kHz, 2-channel interleaved, 16-bit signed
//! little-endian PCM (spec.md §6).

use crate::error::{Result, ToolsError};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const SAMPLE_RATE_HZ: u32 = 48_000;
pub const CHANNELS: u16 = 2;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Capability interface every audio backend implements. The modem core
/// never sees backend-specific types; only byte spans of interleaved PCM
/// cross this boundary.
pub trait AudioBackend {
    fn open(&mut self) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Discards any buffered but not yet played/captured audio.
    fn clear(&mut self) -> Result<()>;
    /// Writes interleaved PCM bytes for playback. Returns bytes accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;
    /// Reads captured interleaved PCM bytes into `buf`. Returns bytes filled
    /// (0 at end of stream for file-backed backends).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Blocks until all written audio has been physically played out.
    fn drain(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Reads or writes a 48 kHz stereo 16-bit WAV file, standing in for the
/// `*_TEST`/`PLOT_*` modes' recorded-signal I/O.
pub enum WavFileBackend {
    Writer(Option<hound::WavWriter<BufWriter<File>>>),
    Reader(hound::WavReader<BufReader<File>>),
}

impl WavFileBackend {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE_HZ,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)
            .map_err(|e| ToolsError::Audio { msg: e.to_string() })?;
        Ok(Self::Writer(Some(writer)))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader =
            hound::WavReader::open(path).map_err(|e| ToolsError::Audio { msg: e.to_string() })?;
        Ok(Self::Reader(reader))
    }
}

impl AudioBackend for WavFileBackend {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let Self::Writer(Some(writer)) = self else {
            return Err(ToolsError::Audio { msg: "backend is not open for writing".into() });
        };
        for sample in bytes.chunks_exact(2) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            writer.write_sample(value).map_err(|e| ToolsError::Audio { msg: e.to_string() })?;
        }
        Ok(bytes.len() - bytes.len() % 2)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Self::Reader(reader) = self else {
            return Err(ToolsError::Audio { msg: "backend is not open for reading".into() });
        };
        let mut written = 0;
        for chunk in buf.chunks_exact_mut(2) {
            match reader.samples::<i16>().next() {
                Some(Ok(sample)) => {
                    chunk.copy_from_slice(&sample.to_le_bytes());
                    written += 2;
                }
                _ => break,
            }
        }
        Ok(written)
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Self::Writer(slot @ Some(_)) = self {
            if let Some(writer) = slot.take() {
                writer.finalize().map_err(|e| ToolsError::Audio { msg: e.to_string() })?;
            }
        }
        Ok(())
    }
}

/// Discards writes and produces silence on read, for running without an
/// audio device configured.
#[derive(Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_write_reports_full_acceptance() {
        let mut backend = NullBackend;
        assert_eq!(backend.write(&[1, 2, 3, 4]).unwrap(), 4);
    }

    #[test]
    fn null_backend_read_fills_silence() {
        let mut backend = NullBackend;
        let mut buf = [0xffu8; 8];
        let n = backend.read(&mut buf).unwrap();
        assert_eq!(n, 8);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn wav_file_backend_round_trips_samples() {
        let path = std::env::temp_dir().join(format!("mercury_tools_test_{}.wav", std::process::id()));
        {
            let mut writer = WavFileBackend::create(&path).unwrap();
            let samples: Vec<u8> = (0..8i16).flat_map(|v| (v * 100).to_le_bytes()).collect();
            writer.write(&samples).unwrap();
            writer.close().unwrap();
        }
        {
            let mut reader = WavFileBackend::open(&path).unwrap();
            let mut buf = [0u8; 16];
            let n = reader.read(&mut buf).unwrap();
            assert_eq!(n, 16);
        }
        let _ = std::fs::remove_file(&path);
    }
}
