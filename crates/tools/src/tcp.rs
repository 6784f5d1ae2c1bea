//! Control and data TCP surfaces (spec.md §6), bridging to the ARQ
//! controller's app-byte queues. Unlike the teacher crate, which never used
//! `tokio`, the control/data sockets here run on it: each connection is
//! handled by its own task, handing parsed commands / raw bytes back to the
//! single modem loop over channels rather than touching shared state
//! directly.

use crate::error::{Result, ToolsError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A parsed control-socket command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Connect { peer: String, band: String },
    Disconnect,
}

/// Parses one CRLF-terminated control command. Accepts a bare `\n` too,
/// since a line read by `AsyncBufReadExt::read_line` already strips the
/// newline and the protocol is otherwise whitespace-delimited.
pub fn parse_control_line(line: &str) -> Result<ControlCommand> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("CONNECT") => {
            let peer = parts
                .next()
                .ok_or_else(|| ToolsError::Control { msg: "CONNECT requires a peer call sign".into() })?;
            let band = parts
                .next()
                .ok_or_else(|| ToolsError::Control { msg: "CONNECT requires a band".into() })?;
            Ok(ControlCommand::Connect { peer: peer.to_string(), band: band.to_string() })
        }
        Some("DISCONNECT") => Ok(ControlCommand::Disconnect),
        _ => Err(ToolsError::Control { msg: format!("unrecognized control command: {line}") }),
    }
}

pub fn format_connected(peer: &str, own: &str, band: &str) -> String {
    format!("CONNECTED {peer} {own} {band}\r")
}

pub fn format_disconnected() -> String {
    "DISCONNECTED\r".to_string()
}

/// Serves one control-socket connection: reads CRLF commands, replies with
/// `CONNECTED`/`DISCONNECTED` immediately, and forwards each parsed command
/// to `commands` for the modem loop to act on (e.g. start an ARQ `connect`).
pub async fn handle_control_connection(
    stream: TcpStream,
    my_call: &str,
    commands: mpsc::Sender<ControlCommand>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        match parse_control_line(&line) {
            Ok(ControlCommand::Connect { peer, band }) => {
                write_half.write_all(format_connected(&peer, my_call, &band).as_bytes()).await?;
                if commands.send(ControlCommand::Connect { peer, band }).await.is_err() {
                    break;
                }
            }
            Ok(ControlCommand::Disconnect) => {
                write_half.write_all(format_disconnected().as_bytes()).await?;
                if commands.send(ControlCommand::Disconnect).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!(%e, "malformed control command"),
        }
    }
    Ok(())
}

/// Accepts control-socket connections one at a time (only one peer is ever
/// connected per spec.md §5's half-duplex point-to-point model).
pub async fn serve_control(listener: TcpListener, my_call: String, commands: mpsc::Sender<ControlCommand>) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        handle_control_connection(stream, &my_call, commands.clone()).await?;
    }
}

/// Bridges one data-socket connection: bytes read from the socket are
/// handed to `to_modem` (the ARQ controller's outgoing app queue); bytes
/// arriving on `from_modem` (drained app bytes from the peer) are written
/// back out to the socket.
pub async fn serve_data(
    stream: TcpStream,
    to_modem: mpsc::Sender<Vec<u8>>,
    mut from_modem: mpsc::Receiver<Vec<u8>>,
) -> Result<()> {
    let (mut read_half, mut write_half) = stream.into_split();

    let reader_task = tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if to_modem.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(bytes) = from_modem.recv().await {
        if write_half.write_all(&bytes).await.is_err() {
            break;
        }
    }

    reader_task.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_with_peer_and_band() {
        let cmd = parse_control_line("CONNECT S56SPZ 40m\r").unwrap();
        assert_eq!(cmd, ControlCommand::Connect { peer: "S56SPZ".to_string(), band: "40m".to_string() });
    }

    #[test]
    fn parses_disconnect() {
        assert_eq!(parse_control_line("DISCONNECT\r").unwrap(), ControlCommand::Disconnect);
    }

    #[test]
    fn rejects_connect_missing_band() {
        assert!(parse_control_line("CONNECT S56SPZ\r").is_err());
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(parse_control_line("PING\r").is_err());
    }

    #[test]
    fn formats_connected_notification() {
        assert_eq!(format_connected("S56SPZ", "W1AW", "40m"), "CONNECTED S56SPZ W1AW 40m\r");
    }
}
