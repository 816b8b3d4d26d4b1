// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch-as-resolver mode (§4.1, "Dispatch-as-resolver mode"): when the
// DNS-SD program is invoked with the full spooler argument set, it resolves
// a `dnssd://` device URI to a concrete scheme-matching backend URI and
// hands the job off by replacing itself with that backend.

use std::time::Duration;

use backend_core::error::{BackendError, ExitCode, Result};

/// The spooler's full argument set, as handed to any backend.
#[derive(Debug, Clone)]
pub struct JobArgs {
    pub job_id: String,
    pub user: String,
    pub title: String,
    pub copies: String,
    pub options: String,
    pub file: Option<String>,
}

/// Resolves a `dnssd://` URI to a concrete backend URI. Modeled rather than
/// implemented against the live protocol (§4.1) — a real resolver would
/// perform a synchronous single-shot browse+resolve; [`DiscoveryEngine`]
/// supplies the data this trait's implementations would consult.
///
/// [`DiscoveryEngine`]: crate::resolver::DiscoveryEngine
pub trait UriResolver {
    fn resolve(&mut self, dnssd_uri: &str) -> Option<String>;
}

/// The process-replacement step, isolated behind a trait so tests can swap
/// in a double instead of actually calling `execve`.
pub trait BackendExecutor {
    /// Replace the current process image with `<server_bin>/backend/<scheme>`,
    /// argv[0] set to `resolved_uri`, forwarding the job arguments. Returns
    /// only on failure to exec (mirrors `execve`'s contract).
    fn exec_backend(&self, server_bin: &str, scheme: &str, resolved_uri: &str, args: &JobArgs) -> std::io::Error;
}

/// Retry policy for a failed resolution: how long to wait before the next
/// attempt, and whether running inside a queue `CLASS` should give up and
/// let the spooler retry the whole job with "try next printer in class"
/// instead of blocking indefinitely (§4.1, §6 `CLASS`).
pub struct DispatchPolicy {
    pub retry_delay: Duration,
    pub in_class: bool,
}

impl DispatchPolicy {
    pub fn from_env() -> Self {
        DispatchPolicy {
            retry_delay: Duration::from_secs(5),
            in_class: std::env::var("CLASS").map(|v| !v.is_empty()).unwrap_or(false),
        }
    }
}

/// Outcome of one dispatch attempt, distinguishing "resolved and handed
/// off" from "give up, let the spooler try the next printer in the class"
/// from "retry again after the delay".
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched(String),
    RetryNextInClass,
    Retry,
}

/// Run the dispatch-as-resolver algorithm for one `dnssd_uri`. Attempts
/// resolution; on failure, either signals a class-aware retry-elsewhere
/// outcome or a plain retry, per `policy.in_class`. Never sleeps itself —
/// callers drive the retry delay so this stays synchronously testable.
pub fn dispatch_once<U: UriResolver>(resolver: &mut U, dnssd_uri: &str, policy: &DispatchPolicy) -> DispatchOutcome {
    match resolver.resolve(dnssd_uri) {
        Some(resolved) => DispatchOutcome::Dispatched(resolved),
        None if policy.in_class => DispatchOutcome::RetryNextInClass,
        None => DispatchOutcome::Retry,
    }
}

/// Extract the URI scheme (`ipp`, `socket`, `lpd`, ...) from a resolved
/// backend URI, used to pick which `<CUPS_SERVERBIN>/backend/<scheme>`
/// executable to exec into.
pub fn scheme_of(uri: &str) -> Option<&str> {
    uri.split_once("://").map(|(scheme, _)| scheme)
}

/// Perform the full hand-off: resolve, then exec the scheme-matching
/// backend. Returns the exit code to use if exec never returns control
/// (i.e. it failed) or if resolution gave up.
pub fn run<U: UriResolver, E: BackendExecutor>(
    resolver: &mut U,
    executor: &E,
    server_bin: &str,
    dnssd_uri: &str,
    args: &JobArgs,
    policy: &DispatchPolicy,
) -> Result<ExitCode> {
    match dispatch_once(resolver, dnssd_uri, policy) {
        DispatchOutcome::Dispatched(resolved) => {
            let scheme = scheme_of(&resolved)
                .ok_or_else(|| BackendError::DeviceUri(format!("no scheme in resolved URI {resolved}")))?;
            let err = executor.exec_backend(server_bin, scheme, &resolved, args);
            Err(BackendError::RunLoop(format!("exec {scheme} backend failed: {err}")))
        }
        DispatchOutcome::RetryNextInClass => Ok(ExitCode::RetryJobNow),
        DispatchOutcome::Retry => Ok(ExitCode::RetryJobCurrentTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver(Option<String>);
    impl UriResolver for StaticResolver {
        fn resolve(&mut self, _dnssd_uri: &str) -> Option<String> {
            self.0.clone()
        }
    }

    struct RecordingExecutor {
        calls: std::cell::RefCell<Vec<(String, String, String)>>,
    }
    impl BackendExecutor for RecordingExecutor {
        fn exec_backend(&self, server_bin: &str, scheme: &str, resolved_uri: &str, _args: &JobArgs) -> std::io::Error {
            self.calls.borrow_mut().push((server_bin.to_string(), scheme.to_string(), resolved_uri.to_string()));
            std::io::Error::other("exec double does not actually replace the process")
        }
    }

    fn job_args() -> JobArgs {
        JobArgs {
            job_id: "42".to_string(),
            user: "u".to_string(),
            title: "t".to_string(),
            copies: "1".to_string(),
            options: String::new(),
            file: None,
        }
    }

    #[test]
    fn s6_resolved_uri_execs_scheme_matching_backend() {
        let mut resolver = StaticResolver(Some("ipp://host/queue".to_string()));
        let executor = RecordingExecutor { calls: std::cell::RefCell::new(Vec::new()) };
        let policy = DispatchPolicy { retry_delay: Duration::from_secs(5), in_class: false };

        let result = run(&mut resolver, &executor, "/usr/lib/cups", "dnssd://Printer._ipp._tcp.local/", &job_args(), &policy);
        assert!(result.is_err(), "exec double never replaces the process, so run() surfaces its failure");

        let calls = executor.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("/usr/lib/cups".to_string(), "ipp".to_string(), "ipp://host/queue".to_string()));
    }

    #[test]
    fn unresolved_uri_in_class_retries_next_in_class() {
        let mut resolver = StaticResolver(None);
        let policy = DispatchPolicy { retry_delay: Duration::from_secs(5), in_class: true };
        assert_eq!(dispatch_once(&mut resolver, "dnssd://x", &policy), DispatchOutcome::RetryNextInClass);
    }

    #[test]
    fn unresolved_uri_outside_class_retries_same_printer() {
        let mut resolver = StaticResolver(None);
        let policy = DispatchPolicy { retry_delay: Duration::from_secs(5), in_class: false };
        assert_eq!(dispatch_once(&mut resolver, "dnssd://x", &policy), DispatchOutcome::Retry);
    }

    #[test]
    fn scheme_of_extracts_leading_scheme() {
        assert_eq!(scheme_of("socket://10.0.0.1:9100"), Some("socket"));
        assert_eq!(scheme_of("no-scheme-here"), None);
    }
}
