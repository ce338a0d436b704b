//! Synchronous SSH CLI backup worker (§4.E).
//!
//! Runs inside `tokio::task::spawn_blocking`, gated by the engine's
//! `cli_workers`-sized `Semaphore` — this function itself is plain
//! blocking code with no async runtime dependency, matching how `ssh2` is
//! meant to be used.

use std::io::Read as _;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use ssh2::Session;

use crate::domain::{NetBackupError, Platform, RawBackup};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// One device's CLI backup input: everything the worker needs, owned, with
/// no further database access required.
pub struct CliBackupRequest {
    pub device_id: String,
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub platform: Platform,
    pub username: String,
    pub password: String,
}

/// Connect over SSH, issue the platform's show-running command, and read
/// the response to EOF. Blocking; any failure (auth, timeout, transport,
/// unexpected prompt) becomes an `Err` the engine records as a per-device
/// failure.
pub fn run_cli_backup(request: &CliBackupRequest) -> Result<RawBackup, NetBackupError> {
    let tcp = TcpStream::connect_timeout(
        &format!("{}:{}", request.ip, request.port)
            .parse()
            .map_err(|e| NetBackupError::Transport(format!("invalid address: {e}")))?,
        CONNECT_TIMEOUT,
    )
    .map_err(|e| NetBackupError::Transport(format!("connect failed: {e}")))?;

    let mut session =
        Session::new().map_err(|e| NetBackupError::Transport(format!("session init failed: {e}")))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(READ_TIMEOUT.as_millis() as u32);
    session
        .handshake()
        .map_err(|e| NetBackupError::Transport(format!("ssh handshake failed: {e}")))?;
    session
        .userauth_password(&request.username, &request.password)
        .map_err(|e| NetBackupError::Transport(format!("authentication failed: {e}")))?;
    if !session.authenticated() {
        return Err(NetBackupError::Transport(
            "authentication rejected".to_string(),
        ));
    }

    let mut channel = session
        .channel_session()
        .map_err(|e| NetBackupError::Transport(format!("channel open failed: {e}")))?;
    let command = request.platform.show_running_command();
    channel
        .exec(command)
        .map_err(|e| NetBackupError::Protocol(format!("command exec failed: {e}")))?;

    let config_text = read_channel_with_deadline(&mut channel, READ_TIMEOUT)?;

    channel.send_eof().ok();
    channel.wait_close().ok();

    let raw_sha256 = hex::encode(Sha256::digest(config_text.as_bytes()));

    Ok(RawBackup {
        hostname: request.hostname.clone(),
        device_id: request.device_id.clone(),
        platform: request.platform,
        config_text,
        raw_sha256,
    })
}

/// `ssh2` channels are non-blocking-capable but default to blocking reads
/// with no built-in overall deadline; enforce one with an explicit
/// elapsed-time check between reads.
fn read_channel_with_deadline(
    channel: &mut ssh2::Channel,
    deadline: Duration,
) -> Result<String, NetBackupError> {
    let start = Instant::now();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        if start.elapsed() > deadline {
            return Err(NetBackupError::Transport(
                "read timed out before command completion".to_string(),
            ));
        }
        match channel.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(NetBackupError::Transport(format!("read failed: {e}"))),
        }
    }

    String::from_utf8(buf)
        .map_err(|e| NetBackupError::Protocol(format!("non-UTF-8 device output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failure_is_a_transport_error() {
        let request = CliBackupRequest {
            device_id: "dev-1".to_string(),
            hostname: "r1".to_string(),
            ip: "127.0.0.1".to_string(),
            port: 1,
            platform: Platform::Ios,
            username: "admin".to_string(),
            password: "pw".to_string(),
        };
        // Nothing listens on loopback port 1; the OS refuses the connection
        // immediately rather than this test waiting out the 60s deadline.
        let result = run_cli_backup(&request);
        assert!(matches!(result, Err(NetBackupError::Transport(_))));
    }
}
