// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The DNS-SD discovery engine (§4.1): browses the fixed set of printer
// registration types plus their local-suppression counterparts, feeds
// events into the catalog, and drives the announcement pass.
//
// The engine is written against the [`ResolverBackend`] capability (§9,
// "dynamic dispatch between DNS-SD-backed and Avahi-backed
// implementations") so it never touches `mdns_sd` types directly; only
// [`MdnsResolver`] does.

use std::collections::HashMap;
use std::sync::mpsc;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, warn};

use backend_core::error::{BackendError, Result};
use backend_core::types::{DeviceRecord, DeviceType};

use crate::catalog::{Catalog, CatalogKey};
use crate::txt::interpret_txt;
use crate::unquote::{quote, unquote};

/// Registration types browsed for every printer discovery run, in the order
/// the original scanner queries them.
const REGISTRATION_TYPES: &[&str] = &[
    "_ipp._tcp.local.",
    "_ipps._tcp.local.",
    "_ipp-tls._tcp.local.",
    "_fax-ipp._tcp.local.",
    "_pdl-datastream._tcp.local.",
    "_printer._tcp.local.",
    "_riousbprint._tcp.local.",
];

/// An event surfaced by a resolver backend, already translated out of the
/// backend's own vocabulary.
#[derive(Debug, Clone)]
pub enum ResolverEvent {
    Found {
        reg_type: String,
        fullname: String,
    },
    Resolved {
        reg_type: String,
        fullname: String,
        txt: HashMap<String, String>,
    },
    Removed {
        reg_type: String,
        fullname: String,
    },
    SearchStopped {
        reg_type: String,
    },
}

/// The capability set a DNS-SD discovery engine needs from its resolver
/// (§9): create a browser for a registration type, poll for events with a
/// bounded wait, join a name to a domain, and unquote a raw service name.
pub trait ResolverBackend {
    fn create_browser(&mut self, reg_type: &str) -> Result<()>;
    fn poll(&mut self, timeout: Duration) -> Vec<ResolverEvent>;
    fn active_browsers(&self) -> usize;

    fn name_join(&self, name: &str, domain: &str) -> String {
        format!("{name}.{domain}")
    }

    fn unquote(&self, raw: &str) -> String {
        unquote(raw)
    }
}

/// A live `mdns-sd`-backed resolver. Each browser runs its own forwarding
/// thread draining the daemon's per-type channel into one shared queue, so
/// `poll` only ever needs to wait on a single receiver (§5, "message-
/// oriented model").
pub struct MdnsResolver {
    daemon: ServiceDaemon,
    tx: mpsc::Sender<ResolverEvent>,
    rx: mpsc::Receiver<ResolverEvent>,
    browser_count: usize,
}

impl MdnsResolver {
    pub fn new() -> Result<Self> {
        let daemon =
            ServiceDaemon::new().map_err(|e| BackendError::Discovery(format!("starting mDNS daemon: {e}")))?;
        let (tx, rx) = mpsc::channel();
        Ok(MdnsResolver {
            daemon,
            tx,
            rx,
            browser_count: 0,
        })
    }
}

impl ResolverBackend for MdnsResolver {
    fn create_browser(&mut self, reg_type: &str) -> Result<()> {
        let receiver = self
            .daemon
            .browse(reg_type)
            .map_err(|e| BackendError::Discovery(format!("browse {reg_type}: {e}")))?;
        let tx = self.tx.clone();
        let owned_type = reg_type.to_string();
        std::thread::Builder::new()
            .name(format!("mdns-{owned_type}"))
            .spawn(move || {
                while let Ok(event) = receiver.recv() {
                    let stop = matches!(event, ServiceEvent::SearchStopped(_));
                    if let Some(translated) = translate(event) {
                        if tx.send(translated).is_err() {
                            break;
                        }
                    }
                    if stop {
                        break;
                    }
                }
            })
            .map_err(|e| BackendError::Discovery(format!("spawning listener for {owned_type}: {e}")))?;
        self.browser_count += 1;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Vec<ResolverEvent> {
        let mut events = Vec::new();
        match self.rx.recv_timeout(timeout) {
            Ok(event) => events.push(event),
            Err(_) => return events,
        }
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn active_browsers(&self) -> usize {
        self.browser_count
    }
}

fn translate(event: ServiceEvent) -> Option<ResolverEvent> {
    match event {
        ServiceEvent::SearchStarted(stype) => {
            debug!(service_type = %stype, "mDNS search started");
            None
        }
        ServiceEvent::ServiceFound(reg_type, fullname) => Some(ResolverEvent::Found { reg_type, fullname }),
        ServiceEvent::ServiceResolved(info) => Some(translate_resolved(&info)),
        ServiceEvent::ServiceRemoved(reg_type, fullname) => Some(ResolverEvent::Removed { reg_type, fullname }),
        ServiceEvent::SearchStopped(reg_type) => Some(ResolverEvent::SearchStopped { reg_type }),
    }
}

fn translate_resolved(info: &ServiceInfo) -> ResolverEvent {
    let txt = info
        .get_properties()
        .iter()
        .map(|p| (p.key().to_string(), p.val_str().to_string()))
        .collect();
    ResolverEvent::Resolved {
        reg_type: info.get_type().to_string(),
        fullname: info.get_fullname().to_string(),
        txt,
    }
}

/// The local-suppression counterpart of a registration type: a browser for
/// this subtype surfaces only the host's own locally-registered queues, so
/// matching entries are flagged "published" and never reported (§4.1).
fn local_suppression_variant(reg_type: &str) -> String {
    format!("_local._sub.{reg_type}")
}

fn strip_local_domain(reg_type: &str) -> &str {
    reg_type.strip_suffix(".local.").unwrap_or(reg_type)
}

fn extract_name(fullname: &str, reg_type: &str) -> String {
    let raw = fullname
        .strip_suffix(reg_type)
        .unwrap_or(fullname)
        .trim_end_matches('.');
    unquote(raw)
}

/// Drives the catalog against whatever [`ResolverBackend`] it is given.
pub struct DiscoveryEngine<R: ResolverBackend> {
    resolver: R,
    catalog: Catalog,
    browser_kind: HashMap<String, bool>,
}

impl<R: ResolverBackend> DiscoveryEngine<R> {
    pub fn new(resolver: R) -> Self {
        DiscoveryEngine {
            resolver,
            catalog: Catalog::new(),
            browser_kind: HashMap::new(),
        }
    }

    /// `Start()`: register a browser per registration type, plus its
    /// local-suppression counterpart.
    pub fn start(&mut self) -> Result<()> {
        for reg_type in REGISTRATION_TYPES {
            self.resolver.create_browser(reg_type)?;
            self.browser_kind.insert((*reg_type).to_string(), false);

            let local_type = local_suppression_variant(reg_type);
            self.resolver.create_browser(&local_type)?;
            self.browser_kind.insert(local_type, true);
        }
        Ok(())
    }

    /// `Run(cancel)`, one iteration: wait up to `timeout` for resolver
    /// input. With no input, run the announcement pass and return whatever
    /// it emits. With input, process exactly one round of events and return
    /// nothing — the caller loops back for the next iteration.
    pub fn run_once(&mut self, timeout: Duration) -> Vec<DeviceRecord> {
        let events = self.resolver.poll(timeout);
        if events.is_empty() {
            return self.catalog.announce_ready();
        }
        for event in events {
            self.handle_event(event);
        }
        Vec::new()
    }

    fn handle_event(&mut self, event: ResolverEvent) {
        match event {
            ResolverEvent::Found { reg_type, fullname } => {
                let is_local = *self.browser_kind.get(&reg_type).unwrap_or(&false);
                let device_type = DeviceType::from_registration_type(strip_local_domain(&reg_type));
                let name = extract_name(&fullname, &reg_type);
                self.catalog.handle_add(&name, device_type, "local.", is_local);
            }
            ResolverEvent::Resolved { reg_type, fullname, txt } => {
                let is_lpd = strip_local_domain(&reg_type) == "_printer._tcp";
                let device_type = DeviceType::from_registration_type(strip_local_domain(&reg_type));
                let name = extract_name(&fullname, &reg_type);
                let key: CatalogKey = (name.to_lowercase(), device_type);
                let fields = interpret_txt(&txt, is_lpd);
                self.catalog.complete_txt_query(&key, fields);
            }
            ResolverEvent::Removed { reg_type, fullname } => {
                let device_type = DeviceType::from_registration_type(strip_local_domain(&reg_type));
                let name = extract_name(&fullname, &reg_type);
                self.catalog.handle_remove(&name, device_type);
            }
            ResolverEvent::SearchStopped { reg_type } => {
                self.browser_kind.remove(&reg_type);
            }
        }
    }

    /// True once every browser has stopped and every catalog entry is
    /// reported (§4.1 rule 5, termination).
    pub fn is_done(&self) -> bool {
        self.browser_kind.is_empty() && self.catalog.all_reported()
    }

    /// Flush any surviving tie-break candidates — call once after the last
    /// browser stops, before exiting.
    pub fn flush(&mut self) -> Vec<DeviceRecord> {
        self.catalog.flush_pending()
    }

    /// `Report(device)`: print the canonical discovery line. The URI is
    /// `dnssd://<quoted-fullname>/cups?uuid=...` for a CUPS-shared queue,
    /// `dnssd://<quoted-fullname>/?uuid=...` otherwise (§3, "Device URI").
    pub fn report(device: &DeviceRecord) {
        let path = if device.shared { "/cups" } else { "/" };
        let mut uri = format!("dnssd://{}{path}", quote(&device.fullname));
        if let Some(uuid) = device.uuid {
            uri.push_str(&format!("?uuid={uuid}"));
        }
        crate::report::report_device(
            "network",
            &uri,
            device.make_and_model.as_deref().unwrap_or(""),
            &device.name,
            device.device_id.as_deref().unwrap_or(""),
            "",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A scripted resolver for exercising the engine without a live daemon.
    struct FakeResolver {
        queued: VecDeque<Vec<ResolverEvent>>,
        browsers: usize,
    }

    impl FakeResolver {
        fn new(rounds: Vec<Vec<ResolverEvent>>) -> Self {
            FakeResolver {
                queued: rounds.into(),
                browsers: 0,
            }
        }
    }

    impl ResolverBackend for FakeResolver {
        fn create_browser(&mut self, _reg_type: &str) -> Result<()> {
            self.browsers += 1;
            Ok(())
        }

        fn poll(&mut self, _timeout: Duration) -> Vec<ResolverEvent> {
            self.queued.pop_front().unwrap_or_default()
        }

        fn active_browsers(&self) -> usize {
            self.browsers
        }
    }

    #[test]
    fn local_suppression_never_emits_a_report() {
        let rounds = vec![
            vec![
                ResolverEvent::Found {
                    reg_type: "_local._sub._ipp._tcp.local.".to_string(),
                    fullname: "Printer._local._sub._ipp._tcp.local.".to_string(),
                },
                ResolverEvent::Found {
                    reg_type: "_ipp._tcp.local.".to_string(),
                    fullname: "Printer._ipp._tcp.local.".to_string(),
                },
            ],
            vec![],
        ];
        let resolver = FakeResolver::new(rounds);
        let mut engine = DiscoveryEngine::new(resolver);
        engine.browser_kind.insert("_local._sub._ipp._tcp.local.".to_string(), true);
        engine.browser_kind.insert("_ipp._tcp.local.".to_string(), false);

        let _ = engine.run_once(Duration::from_millis(10));
        let ready = engine.run_once(Duration::from_millis(10));
        assert!(ready.is_empty(), "suppressed device must never be reported");
    }

    #[test]
    fn strip_local_domain_recovers_bare_registration_type() {
        assert_eq!(strip_local_domain("_printer._tcp.local."), "_printer._tcp");
        assert_eq!(strip_local_domain("_ipp._tcp.local."), "_ipp._tcp");
    }

    #[test]
    fn extract_name_unquotes_and_strips_suffix() {
        let name = extract_name(r"Front\032Office._ipp._tcp.local.", "_ipp._tcp.local.");
        assert_eq!(name, "Front Office");
    }
}
