//! Command-line interface: `-c <cpu_nr> -m <mode> -l -h`, per the external
//! interface contract, plus a `--config` path for the key=value config file.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Software-defined HF modem: OFDM PHY layer + selective-repeat ARQ.
#[derive(Parser, Debug, Clone)]
#[command(name = "mercury")]
#[command(about = "Software-defined HF modem: OFDM PHY + selective-repeat ARQ")]
pub struct Cli {
    /// Pin the modem thread to this CPU core. -1 disables pinning.
    #[arg(short = 'c', long = "cpu", default_value_t = 3)]
    pub cpu_nr: i32,

    /// Operation mode.
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = Mode::Arq)]
    pub mode: Mode,

    /// List preset indices with their net bitrates and exit.
    #[arg(short = 'l', long = "list-presets")]
    pub list_presets: bool,

    /// Config file path (key=value, `[section]`-grouped, `#` comments).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// WAV file backing `TX_TEST`/`RX_TEST`/`PLOT_*` modes instead of a live
    /// audio device.
    #[arg(long = "wav")]
    pub wav: Option<PathBuf>,

    /// Station call sign used by the ARQ connection.
    #[arg(long, default_value = "NOCALL")]
    pub callsign: String,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose (info-level) logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Operation modes, matching the original `-m` argument values.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Arq,
    Tx,
    Rx,
    TxTest,
    RxTest,
    PlotBaseband,
    PlotPassband,
}

impl Mode {
    pub fn as_original_str(&self) -> &'static str {
        match self {
            Mode::Arq => "ARQ",
            Mode::Tx => "TX",
            Mode::Rx => "RX",
            Mode::TxTest => "TX_TEST",
            Mode::RxTest => "RX_TEST",
            Mode::PlotBaseband => "PLOT_BASEBAND",
            Mode::PlotPassband => "PLOT_PASSBAND",
        }
    }
}

/// Pins the current thread to `cpu_nr`. A value of `-1` disables pinning.
/// CPU affinity is a best-effort hint (spec.md §9); this port has no
/// platform-affinity crate in its dependency stack, so it only logs intent.
pub fn apply_cpu_affinity(cpu_nr: i32) {
    if cpu_nr < 0 {
        tracing::debug!("CPU pinning disabled (-c -1)");
        return;
    }
    tracing::info!(cpu_nr, "CPU pinning requested (best-effort hint, not enforced on this platform)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_to_original_strings() {
        assert_eq!(Mode::TxTest.as_original_str(), "TX_TEST");
        assert_eq!(Mode::PlotPassband.as_original_str(), "PLOT_PASSBAND");
    }
}
