//! `mercury` - software-defined HF modem CLI: ARQ data-link server plus
//! OFDM-frame TX/RX test harness, mirroring the original `-c/-m/-l` surface.

use clap::Parser;
use mercury_arq::connection::{Connection, Role};
use mercury_arq::controller::ArqController;
use mercury_arq::preset::default_presets;
use mercury_frame::framer::{Deframer, Framer};
use mercury_frame::grid::Lattice;
use mercury_frame::interleave::{BlockInterleaver, Interleaver, OfdmInterleaver};
use mercury_frame::ldpc::{self, QcTables};
use mercury_frame::pilot::PilotSequence;
use mercury_modem::ofdm::{FilterWindow, OfdmConfig, OfdmSymbolEngine};
use mercury_modem::common::QamOrder;
use mercury_modem::qam::QamModulator;
use mercury_tools::audio::{AudioBackend, WavFileBackend};
use mercury_tools::cli::{apply_cpu_affinity, Cli, Mode};
use mercury_tools::config::{build_arq_config, ConfigFile};
use mercury_tools::tcp::{serve_control, serve_data, ControlCommand};
use mercury_tools::Result;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const CONTROL_PORT: u16 = 8300;
const DATA_PORT: u16 = 8301;

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn list_presets_and_exit() -> ! {
    let table = default_presets();
    for preset in &table.presets {
        let bps = preset.net_bitrate_bps().unwrap_or(0.0);
        println!("CONFIG_{} ({bps:.0} bps)", preset.index);
    }
    std::process::exit(0);
}

/// The largest `rows` no greater than `sqrt(n)` that evenly divides `n`,
/// paired with `n / rows`. Always succeeds (`rows = 1` is the floor), giving
/// a rectangular shape for `OfdmInterleaver` from an arbitrary cell count.
fn factor_pair(n: usize) -> (usize, usize) {
    let mut rows = (n as f64).sqrt() as usize;
    while rows > 1 && n % rows != 0 {
        rows -= 1;
    }
    (rows.max(1), n / rows.max(1))
}

/// Builds the OFDM engine, grid, LDPC tables and interleavers for a single
/// preset, for the `*_TEST` modes' one-frame round trip. The single-parity-
/// check table is a synthetically-valid stand-in for the real, data-only
/// Mercury parity tables.
fn test_pipeline(
    preset_index: u8,
) -> Result<(OfdmConfig, Lattice, QamModulator, QcTables, BlockInterleaver, OfdmInterleaver)> {
    let table = default_presets();
    let preset = table.get(preset_index)?;
    let lattice = Lattice::new(preset.nc, preset.nsymb, preset.pilot)?;
    let ofdm_config = OfdmConfig {
        nfft: preset.nfft,
        nc: preset.nc,
        gi: preset.gi,
        ofdm_rate: preset.ofdm_rate,
        audio_rate: preset.ofdm_rate,
        carrier_freq: preset.carrier_freq,
        amplitude: 0.5,
        window: FilterWindow::Hamming,
    };
    let qam = QamModulator::new(QamOrder::Qam16);

    let (n_data_cells, _, _, _) = lattice.kind_counts();
    let bits_per_symbol = qam.config().bits_per_symbol();
    let n = n_data_cells * bits_per_symbol;
    let p = (n / 5).max(1);
    let k = n - p;
    let tables = QcTables::single_parity_check(k, p)?;

    // Bit-level interleave between LDPC and QAM: rows = bits_per_symbol,
    // cols = n_data_cells, spreading each codeword's locally-correlated
    // parity-accumulate bits across many different QAM symbols.
    let bit_interleaver = BlockInterleaver::new(bits_per_symbol, n_data_cells)?;

    // Cell-level interleave over the data-cell vector, decorrelating bursts
    // across the OFDM grid independently of the bit-level interleave above.
    let (rows, cols) = factor_pair(n_data_cells);
    let cell_interleaver = OfdmInterleaver::new(rows, cols, rows)?;

    Ok((ofdm_config, lattice, qam, tables, bit_interleaver, cell_interleaver))
}

/// Encodes one test frame of random-looking bits into a passband WAV file.
fn run_tx_test(wav_path: &std::path::Path, preset_index: u8) -> Result<()> {
    let (ofdm_config, lattice, qam, tables, mut bit_interleaver, cell_interleaver) =
        test_pipeline(preset_index)?;

    let payload: Vec<u8> = (0..tables.k).map(|i| (i % 5 == 0) as u8).collect();
    let codeword = ldpc::encode(&tables, &payload)?;
    let interleaved_bits = bit_interleaver.interleave(&codeword)?;
    let data_symbols = qam.modulate(&interleaved_bits)?;
    let data_symbols = cell_interleaver.interleave(&data_symbols)?;

    let framer = Framer::new(lattice, preset_index);
    let mut pilots = PilotSequence::with_seed(0xC0FFEE, lattice.pilot.boost);
    let grid = framer.frame(&data_symbols, &mut pilots)?;

    let mut engine = OfdmSymbolEngine::new(ofdm_config.clone())?;
    let mut passband = Vec::new();
    for (t, row) in grid.chunks(lattice.nc).enumerate() {
        let symbol = engine.modulate_symbol(row)?;
        let start_sample = t * ofdm_config.symbol_length();
        passband.extend(mercury_modem::ofdm::to_passband(&symbol, &ofdm_config, start_sample));
    }

    let mut writer = WavFileBackend::create(wav_path)?;
    let pcm: Vec<u8> = passband
        .iter()
        .flat_map(|&sample| {
            let clamped = (sample * i16::MAX as f64).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            [clamped, clamped].into_iter().flat_map(|v| v.to_le_bytes())
        })
        .collect();
    writer.write(&pcm)?;
    writer.close()?;

    tracing::info!(
        payload_bits = payload.len(),
        codeword_bits = codeword.len(),
        path = %wav_path.display(),
        "wrote test OFDM frame"
    );
    Ok(())
}

/// Decodes one test frame back from a passband WAV file written by
/// `run_tx_test`.
fn run_rx_test(wav_path: &std::path::Path, preset_index: u8) -> Result<()> {
    let (ofdm_config, lattice, qam, tables, mut bit_interleaver, cell_interleaver) =
        test_pipeline(preset_index)?;

    let mut reader = WavFileBackend::open(wav_path)?;
    let mut pcm = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        pcm.extend_from_slice(&chunk[..n]);
    }
    let passband: Vec<f64> = pcm
        .chunks_exact(4)
        .map(|frame| i16::from_le_bytes([frame[0], frame[1]]) as f64 / i16::MAX as f64)
        .collect();

    let mut engine = OfdmSymbolEngine::new(ofdm_config.clone())?;
    let deframer = Deframer::new(lattice);
    let mut pilots = PilotSequence::with_seed(0xC0FFEE, lattice.pilot.boost);

    let symbol_len = ofdm_config.symbol_length();
    let mut grid = Vec::with_capacity(lattice.total_cells());
    for t in 0..lattice.nsymb {
        let start_sample = t * symbol_len;
        let segment = &passband[start_sample..start_sample + symbol_len];
        let baseband = mercury_modem::ofdm::from_passband(segment, &ofdm_config, start_sample);
        grid.extend(engine.demodulate_symbol(&baseband)?);
    }

    let (data_symbols, pilot_obs) = deframer.deframe(&grid, &mut pilots)?;
    let data_symbols = cell_interleaver.deinterleave(&data_symbols)?;
    let interleaved_bits: Vec<u8> = data_symbols.iter().flat_map(|&sym| qam.demodulate_hard(sym)).collect();
    let bits = bit_interleaver.deinterleave(&interleaved_bits)?;
    let llr: Vec<f64> = bits.iter().map(|&b| if b == 0 { 4.0 } else { -4.0 }).collect();
    let (codeword, iterations) = ldpc::decode_gbf(&tables, &llr, 50, 0.5)?;
    let payload = &codeword[..tables.k];

    tracing::info!(
        recovered_bits = payload.len(),
        ldpc_iterations = iterations,
        pilot_cells = pilot_obs.len(),
        path = %wav_path.display(),
        "decoded test OFDM frame"
    );
    Ok(())
}

async fn run_arq_mode(cli: &Cli, arq_config: mercury_arq::controller::ArqConfig) -> Result<()> {
    let connection = Connection::new(cli.callsign.clone(), 0)?;
    let mut controller = ArqController::new(connection, arq_config);

    let control_listener = TcpListener::bind(("127.0.0.1", CONTROL_PORT)).await?;
    let data_listener = TcpListener::bind(("127.0.0.1", DATA_PORT)).await?;
    tracing::info!(control_port = CONTROL_PORT, data_port = DATA_PORT, "mercury ARQ server listening");

    let (command_tx, mut command_rx) = mpsc::channel::<ControlCommand>(16);
    let call_sign = cli.callsign.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_control(control_listener, call_sign, command_tx).await {
            tracing::error!(%e, "control socket server stopped");
        }
    });

    let (to_modem_tx, mut to_modem_rx) = mpsc::channel::<Vec<u8>>(64);
    let (from_modem_tx, from_modem_rx) = mpsc::channel::<Vec<u8>>(64);
    tokio::spawn(async move {
        // One data connection at a time, per spec's half-duplex point-to-point model.
        let (stream, _) = match data_listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(%e, "data socket accept failed");
                return;
            }
        };
        if let Err(e) = serve_data(stream, to_modem_tx, from_modem_rx).await {
            tracing::warn!(%e, "data socket connection ended");
        }
    });

    let tick_ms = controller.config.message_transmission_time_ms;
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_ms.max(1.0) as u64));
    let mut stats_interval = tokio::time::interval(std::time::Duration::from_secs(30));

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                match cmd {
                    ControlCommand::Connect { peer, band } => {
                        if controller.connection.role != Role::Commander {
                            controller.connection.switch_role();
                        }
                        match controller.connect(&peer) {
                            Ok(msg) => tracing::info!(peer, band, payload_len = msg.payload.len(), "queued START_CONNECTION"),
                            Err(e) => tracing::warn!(%e, peer, "connect failed"),
                        }
                    }
                    ControlCommand::Disconnect => {
                        controller.connection.disconnect_to_listening(0);
                        tracing::info!("disconnected to listening state");
                    }
                }
            }
            Some(bytes) = to_modem_rx.recv() => {
                controller.enqueue_app_bytes(&bytes);
            }
            _ = interval.tick() => {
                let batch = controller.fill_batch();
                for msg in &batch {
                    tracing::debug!(msg_type = ?msg.msg_type, id = msg.id, "transmitting queued message");
                }
                let drained = controller.drain_app_bytes();
                if !drained.is_empty() && from_modem_tx.send(drained).await.is_err() {
                    tracing::warn!("data socket closed, dropping drained application bytes");
                }
            }
            _ = stats_interval.tick() => {
                let stats = &controller.stats;
                tracing::info!(
                    received_data = stats.n_received_data,
                    received_control = stats.n_received_control,
                    acks_sent_data = stats.n_acks_sent_data,
                    acks_sent_control = stats.n_acks_sent_control,
                    invalid_messages = stats.n_invalid_messages,
                    retransmissions = stats.n_retransmissions,
                    "arq link stats"
                );
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.list_presets {
        list_presets_and_exit();
    }

    apply_cpu_affinity(cli.cpu_nr);

    let config = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let arq_config = build_arq_config(&config);

    match cli.mode {
        Mode::Arq => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_arq_mode(&cli, arq_config))?;
        }
        Mode::Tx | Mode::TxTest => {
            let path = cli.wav.clone().ok_or_else(|| {
                mercury_tools::ToolsError::Config { msg: "TX/TX_TEST requires --wav <path>".to_string() }
            })?;
            run_tx_test(&path, 0)?;
        }
        Mode::Rx | Mode::RxTest => {
            let path = cli.wav.clone().ok_or_else(|| {
                mercury_tools::ToolsError::Config { msg: "RX/RX_TEST requires --wav <path>".to_string() }
            })?;
            run_rx_test(&path, 0)?;
        }
        Mode::PlotBaseband | Mode::PlotPassband => {
            tracing::warn!("{:?} is not implemented: no DSP plotting crate in this build's dependency stack", cli.mode);
        }
    }

    Ok(())
}
