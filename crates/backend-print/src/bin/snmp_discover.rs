// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SNMP backend entry point: scans the configured address/community space
// for Host-Resources-MIB-speaking devices and lists them on stdout (§4.2).
// Invoked with no spooler arguments, matching the original scanner's usage.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use backend_core::config::SnmpConfig;
use backend_core::error::ExitCode;
use backend_print::report;
use backend_print::snmp_scan::SnmpScanner;
use backend_print::snmp_session::{self, DEVICE_TYPE};

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

    let config_path = std::env::var("CUPS_SERVERROOT")
        .map(|root| PathBuf::from(root).join("snmp.conf"))
        .unwrap_or_else(|_| PathBuf::from("/etc/cups/snmp.conf"));
    let config = SnmpConfig::load(&config_path).unwrap_or_else(|err| {
        tracing::warn!(%err, "snmp.conf unreadable, using defaults");
        SnmpConfig::default()
    });

    match run_scan(config) {
        Ok(()) => std::process::ExitCode::from(ExitCode::Ok.code() as u8),
        Err(err) => {
            tracing::error!(%err, "SNMP scan failed");
            std::process::ExitCode::from(ExitCode::Failed.code() as u8)
        }
    }
}

fn run_scan(config: SnmpConfig) -> backend_core::error::Result<()> {
    let max_run_time = Duration::from_secs(config.max_run_time_secs);
    let communities = config.communities.clone();
    let mut scanner = SnmpScanner::new(config);
    let start = Instant::now();

    let targets = scanner.target_addresses()?;
    let socket_addrs: Vec<SocketAddr> = targets
        .iter()
        .filter_map(|addr| format!("{addr}:161").parse().ok())
        .collect();

    let oid = snmp_session::oid_from_str("1.3.6.1.2.1.25.3.2.1.2.1")
        .ok_or_else(|| backend_core::error::BackendError::Snmp("bad hrDeviceType OID".into()))?;

    for addr in &socket_addrs {
        if start.elapsed() >= max_run_time {
            break;
        }
        for community in &communities {
            if let Ok((request_id, value)) =
                snmp_session::get(*addr, community, &oid, DEVICE_TYPE, Duration::from_secs(2))
            {
                scanner.handle_reply(*addr, community, request_id, value);
            }
        }
    }

    report_ready_devices(&mut scanner);
    Ok(())
}

fn report_ready_devices(scanner: &mut SnmpScanner) -> usize {
    let ready: Vec<_> = scanner.ready_entries().cloned().collect();
    let mut reported = 0;
    for entry in ready {
        let uri = entry.uri.clone().or_else(|| scanner.probe(&entry));
        if let Some(uri) = uri {
            report::report_device(
                "network",
                &uri,
                entry.make_and_model.as_deref().unwrap_or(""),
                entry.info.as_deref().unwrap_or(""),
                entry.device_id.as_deref().unwrap_or(""),
                entry.location.as_deref().unwrap_or(""),
            );
            scanner.mark_reported(&entry.addr);
            reported += 1;
        }
    }
    reported
}
