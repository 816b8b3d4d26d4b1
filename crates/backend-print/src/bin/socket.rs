// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw socket (JetDirect/AppSocket) backend entry point (§4.3, §6). Copies
// the spooler's print data to the device over a bare TCP connection while
// servicing a periodic SNMP supplies poll, following the spooler backend
// argv convention.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use backend_core::error::{BackendError, ExitCode, Result};
use backend_print::raw_client::{DeviceSocket, RAW_PORT};
use backend_print::report;
use backend_print::runloop::{classify_error, ErrorClass};
use backend_print::supplies::{PpdSupplyOptions, SuppliesWalker};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn main() -> std::process::ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        // Zero-argument discovery mode for this scheme is handled by the
        // SNMP/DNS-SD scanners; the socket backend itself has nothing to
        // list.
        return std::process::ExitCode::from(ExitCode::Ok.code() as u8);
    }

    let file = args.get(5).cloned();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(%err, "failed to start runtime");
            return std::process::ExitCode::from(ExitCode::Failed.code() as u8);
        }
    };

    match runtime.block_on(run_job(file)) {
        Ok(()) => std::process::ExitCode::from(ExitCode::Ok.code() as u8),
        Err(err) => {
            tracing::error!(%err, "print job failed");
            let code = ExitCode::from(&err);
            std::process::ExitCode::from(code.code() as u8)
        }
    }
}

async fn run_job(file: Option<String>) -> Result<()> {
    let device_uri = std::env::var("DEVICE_URI")
        .map_err(|_| BackendError::DeviceUri("DEVICE_URI not set".to_string()))?;
    let (host, port) = parse_socket_uri(&device_uri)?;

    let document = read_job_data(file.as_deref())?;

    let mut device = DeviceSocket::connect(&host, port).await?;

    let ppd = PpdSupplyOptions::from_env();
    let mut walker = ppd
        .supplies_enabled
        .then(|| make_walker(&host, ppd.capacity_quirk));

    let mut poll_timer = tokio::time::interval(Duration::from_secs(5));
    poll_timer.tick().await; // first tick fires immediately; skip it

    const CHUNK_SIZE: usize = 8192;
    let mut sent = 0usize;
    let mut offline = false;
    let mut media_empty = false;

    while sent < document.len() {
        let end = (sent + CHUNK_SIZE).min(document.len());
        let chunk = &document[sent..end];

        tokio::select! {
            write_result = device.write_chunk(chunk) => {
                match write_result {
                    Ok(n) => {
                        sent += n;
                        if offline {
                            offline = false;
                            report::state('-', "offline-report");
                            report::info_line("The printer is now connected.");
                        }
                        if media_empty {
                            media_empty = false;
                            report::state('-', "media-empty-warning");
                        }
                    }
                    Err(err) => match classify_error(&err) {
                        ErrorClass::Transient => {}
                        ErrorClass::Offline => {
                            if !offline {
                                offline = true;
                                report::state('+', "offline-report");
                                report::info_line("The printer is not connected.");
                            }
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        ErrorClass::NoSpace => {
                            if !media_empty {
                                media_empty = true;
                                report::state('+', "media-empty-warning");
                                report::debug_line("Out of paper");
                            }
                        }
                        ErrorClass::Fatal => {
                            report::error_line(&err.to_string());
                            return Err(BackendError::RunLoop(format!("device write failed: {err}")));
                        }
                    },
                }
            }
            _ = poll_timer.tick() => {
                if let Some(Some(active)) = walker.as_mut().map(poll_once) {
                    if !active {
                        walker = None;
                    }
                }
            }
        }
    }

    device.flush().await?;
    device.shutdown().await?;
    Ok(())
}

fn poll_once(walker: &mut (SuppliesWalker, SocketAddr)) -> Option<bool> {
    Some(walker.0.poll(walker.1).is_ok())
}

fn make_walker(host: &str, capacity_quirk: bool) -> (SuppliesWalker, SocketAddr) {
    let cache_dir = std::env::var("CUPS_CACHEDIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/cache/cups"));
    let addr: SocketAddr = format!("{host}:161").parse().unwrap_or_else(|_| {
        "0.0.0.0:161".parse().expect("fallback address is well-formed")
    });
    (SuppliesWalker::new(cache_dir, "public", capacity_quirk), addr)
}

fn read_job_data(file: Option<&str>) -> Result<Vec<u8>> {
    match file {
        Some(path) => std::fs::read(path).map_err(BackendError::Io),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).map_err(BackendError::Io)?;
            Ok(buf)
        }
    }
}

/// Parse `socket://host[:port]` into a host and port, defaulting to the
/// JetDirect port when none is given.
fn parse_socket_uri(uri: &str) -> Result<(String, u16)> {
    let rest = uri
        .strip_prefix("socket://")
        .ok_or_else(|| BackendError::DeviceUri(format!("not a socket:// URI: {uri}")))?;
    let rest = rest.trim_end_matches('/');
    match rest.split_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| BackendError::DeviceUri(format!("bad port in {uri}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((rest.to_string(), RAW_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_explicit_port() {
        let (host, port) = parse_socket_uri("socket://10.0.0.5:9100").unwrap();
        assert_eq!(host, "10.0.0.5");
        assert_eq!(port, 9100);
    }

    #[test]
    fn defaults_to_raw_port_when_absent() {
        let (host, port) = parse_socket_uri("socket://printer.local/").unwrap();
        assert_eq!(host, "printer.local");
        assert_eq!(port, RAW_PORT);
    }

    #[test]
    fn rejects_non_socket_scheme() {
        assert!(parse_socket_uri("ipp://host").is_err());
    }
}
