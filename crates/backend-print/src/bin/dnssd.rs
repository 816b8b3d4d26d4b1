// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DNS-SD backend entry point. With no arguments, runs the discovery engine
// and lists reachable printers on stdout (§4.1). With the full spooler
// argument set, resolves its own `dnssd://` device URI and hands the job
// off to the scheme-matching backend (§4.1, "Dispatch-as-resolver mode").

use std::os::unix::process::CommandExt;
use std::time::Duration;

use mdns_sd::ServiceDaemon;

use backend_core::error::ExitCode;
use backend_print::dispatch::{self, BackendExecutor, DispatchPolicy, JobArgs, UriResolver};
use backend_print::resolver::{DiscoveryEngine, MdnsResolver};

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
        return match run_discovery() {
            Ok(()) => std::process::ExitCode::from(ExitCode::Ok.code() as u8),
            Err(err) => {
                tracing::error!(%err, "discovery failed");
                std::process::ExitCode::from(ExitCode::Failed.code() as u8)
            }
        };
    }

    let job_args = JobArgs {
        job_id: args.first().cloned().unwrap_or_default(),
        user: args.get(1).cloned().unwrap_or_default(),
        title: args.get(2).cloned().unwrap_or_default(),
        copies: args.get(3).cloned().unwrap_or_default(),
        options: args.get(4).cloned().unwrap_or_default(),
        file: args.get(5).cloned(),
    };

    let dnssd_uri = match std::env::var("DEVICE_URI") {
        Ok(uri) => uri,
        Err(_) => {
            tracing::error!("DEVICE_URI not set in dispatch-as-resolver mode");
            return std::process::ExitCode::from(ExitCode::Failed.code() as u8);
        }
    };

    let server_bin = std::env::var("CUPS_SERVERBIN").unwrap_or_else(|_| "/usr/lib/cups".to_string());
    let policy = DispatchPolicy::from_env();
    let mut resolver = LiveDnssdResolver::new();
    let executor = ExecBackend;

    loop {
        match dispatch::run(&mut resolver, &executor, &server_bin, &dnssd_uri, &job_args, &policy) {
            Ok(ExitCode::RetryJobNow) => return std::process::ExitCode::from(ExitCode::RetryJobNow.code() as u8),
            Ok(ExitCode::RetryJobCurrentTime) => {
                std::thread::sleep(policy.retry_delay);
                continue;
            }
            Ok(code) => return std::process::ExitCode::from(code.code() as u8),
            Err(err) => {
                tracing::error!(%err, "dispatch failed");
                return std::process::ExitCode::from(ExitCode::Failed.code() as u8);
            }
        }
    }
}

/// Run the discovery engine until every browser has stopped and every
/// catalog entry has been reported, printing a line per device as it
/// becomes ready.
fn run_discovery() -> backend_core::error::Result<()> {
    let resolver = MdnsResolver::new()?;
    let mut engine = DiscoveryEngine::new(resolver);
    engine.start()?;

    loop {
        let ready = engine.run_once(Duration::from_millis(500));
        for device in &ready {
            DiscoveryEngine::<MdnsResolver>::report(device);
        }
        if engine.is_done() {
            break;
        }
    }
    for device in engine.flush() {
        DiscoveryEngine::<MdnsResolver>::report(&device);
    }
    Ok(())
}

/// A `UriResolver` that performs a single synchronous browse+resolve
/// against a live mDNS daemon for the fullname embedded in a `dnssd://`
/// URI, recovering a scheme-matching backend URI from the resolved
/// service's hostname, port, and TXT resource-path hint.
struct LiveDnssdResolver {
    daemon: Option<ServiceDaemon>,
}

impl LiveDnssdResolver {
    fn new() -> Self {
        LiveDnssdResolver { daemon: ServiceDaemon::new().ok() }
    }
}

impl UriResolver for LiveDnssdResolver {
    fn resolve(&mut self, dnssd_uri: &str) -> Option<String> {
        let daemon = self.daemon.as_ref()?;
        let (fullname, reg_type) = parse_dnssd_uri(dnssd_uri)?;
        let receiver = daemon.browse(&reg_type).ok()?;

        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while std::time::Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let event = receiver.recv_timeout(remaining.min(Duration::from_millis(500))).ok()?;
            if let mdns_sd::ServiceEvent::ServiceResolved(info) = event {
                if info.get_fullname() == fullname {
                    return Some(build_resolved_uri(&info, &reg_type));
                }
            }
        }
        None
    }
}

fn parse_dnssd_uri(uri: &str) -> Option<(String, String)> {
    let rest = uri.strip_prefix("dnssd://")?;
    let (host_part, _path) = rest.split_once('/').unwrap_or((rest, ""));
    let decoded = backend_print::unquote::unquote(host_part);
    for reg_type in ["_ipp._tcp.local.", "_ipps._tcp.local.", "_printer._tcp.local.", "_pdl-datastream._tcp.local."] {
        if decoded.strip_suffix(&format!(".{reg_type}")).is_some() {
            return Some((decoded.clone(), reg_type.to_string()));
        }
    }
    None
}

fn build_resolved_uri(info: &mdns_sd::ServiceInfo, reg_type: &str) -> String {
    let scheme = if reg_type.starts_with("_ipps") {
        "ipps"
    } else if reg_type.starts_with("_printer") {
        "lpd"
    } else if reg_type.starts_with("_pdl-datastream") {
        "socket"
    } else {
        "ipp"
    };
    let host = info.get_hostname().trim_end_matches('.');
    let port = info.get_port();
    let rp = info
        .get_property_val_str("rp")
        .map(|p| format!("/{p}"))
        .unwrap_or_else(|| "/ipp/print".to_string());
    format!("{scheme}://{host}:{port}{rp}")
}

struct ExecBackend;

impl BackendExecutor for ExecBackend {
    fn exec_backend(&self, server_bin: &str, scheme: &str, resolved_uri: &str, args: &JobArgs) -> std::io::Error {
        // §4.1 "Dispatch-as-resolver mode": argv[0] is the resolved URI
        // itself, per the spooler backend convention, not a trailing arg.
        let path = format!("{server_bin}/backend/{scheme}");
        let mut command = std::process::Command::new(&path);
        command.arg0(resolved_uri);
        command.env("DEVICE_URI", resolved_uri);
        command.arg(&args.job_id).arg(&args.user).arg(&args.title).arg(&args.copies).arg(&args.options);
        if let Some(file) = &args.file {
            command.arg(file);
        }
        command.exec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dnssd_uri_recovers_fullname_and_type() {
        let (fullname, reg_type) = parse_dnssd_uri("dnssd://Front%20Office._ipp._tcp.local./cups?uuid=x").unwrap();
        assert_eq!(reg_type, "_ipp._tcp.local.");
        assert!(fullname.ends_with("._ipp._tcp.local."));
    }

    #[test]
    fn parse_dnssd_uri_rejects_non_dnssd_scheme() {
        assert!(parse_dnssd_uri("ipp://host/queue").is_none());
    }
}
