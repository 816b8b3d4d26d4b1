// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SNMP discovery engine (§4.2): scans configured addresses for printers via
// the Host Resources MIB, routes follow-up GET replies into a per-address
// cache, and probes bare sockets for devices lacking a `DeviceURI` rule
// match.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use regex::Regex;

use backend_core::config::SnmpConfig;
use backend_core::error::Result;
use backend_core::types::SnmpCacheEntry;

use crate::addrlist;
use crate::snmp_session::{self, DEVICE_DESCRIPTION, DEVICE_ID, DEVICE_LOCATION, DEVICE_TYPE, DEVICE_URI};

const OID_HR_DEVICE_TYPE: &str = "1.3.6.1.2.1.25.3.2.1.2.1";
const OID_HR_DEVICE_DESCR: &str = "1.3.6.1.2.1.25.3.2.1.3.1";
const OID_PPM_IEEE1284_DEVICE_ID: &str = "1.3.6.1.2.1.43.15.1.1.2.1.1";
const OID_PPM_PORT_SERVICE_NAME: &str = "1.3.6.1.2.1.43.17.6.1.14.1.1";
const OID_SYS_LOCATION: &str = "1.3.6.1.2.1.1.6.0";

/// One record the scanner has learned about, before it's fully ready to
/// report (mirrors [`SnmpCacheEntry`] plus the bookkeeping the scanner
/// itself needs).
struct ScanEntry {
    cache: SnmpCacheEntry,
    seen_device_type: bool,
}

pub struct SnmpScanner {
    config: SnmpConfig,
    entries: Vec<ScanEntry>,
    device_uri_rules: Vec<(Regex, Vec<String>)>,
}

impl SnmpScanner {
    pub fn new(config: SnmpConfig) -> Self {
        let device_uri_rules = config
            .device_uri_rules
            .iter()
            .filter_map(|rule| {
                regex::RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (re, rule.templates.clone()))
            })
            .collect();

        SnmpScanner {
            config,
            entries: Vec::new(),
            device_uri_rules,
        }
    }

    /// Resolve every configured `Address` directive to concrete broadcast
    /// or unicast addresses (§4.2 point 1-2).
    pub fn target_addresses(&self) -> Result<Vec<String>> {
        addrlist::expand_addresses(&self.config.addresses)
    }

    /// Send the opening `hrDeviceType` probe to every target under every
    /// configured community.
    pub fn send_probes(&self, socket_addrs: &[SocketAddr]) {
        for addr in socket_addrs {
            for community in &self.config.communities {
                let oid = match snmp_session::oid_from_str(OID_HR_DEVICE_TYPE) {
                    Some(oid) => oid,
                    None => continue,
                };
                if let Err(err) =
                    snmp_session::get(*addr, community, &oid, DEVICE_TYPE, Duration::from_secs(2))
                {
                    tracing::debug!(%addr, %err, "device-type probe failed");
                }
            }
        }
    }

    fn entry_mut(&mut self, addr: &str) -> &mut ScanEntry {
        if let Some(index) = self.entries.iter().position(|e| e.cache.addr == addr) {
            return &mut self.entries[index];
        }
        self.entries.push(ScanEntry {
            cache: SnmpCacheEntry::new(addr, addr),
            seen_device_type: false,
        });
        self.entries.last_mut().expect("just pushed")
    }

    /// Route one SNMP reply into the cache, issuing follow-up GETs the
    /// first time a device replies to the opening probe (§4.2 point 3).
    pub fn handle_reply(
        &mut self,
        addr: SocketAddr,
        community: &str,
        request_id: i32,
        value: snmp_session::SnmpValue,
    ) {
        let addr_str = addr.ip().to_string();
        let first_contact = {
            let entry = self.entry_mut(&addr_str);
            let first_contact = request_id == DEVICE_TYPE && !entry.seen_device_type;
            if request_id == DEVICE_TYPE {
                entry.seen_device_type = true;
            }
            first_contact
        };

        {
            let entry = self.entry_mut(&addr_str);
            match request_id {
                DEVICE_DESCRIPTION => {
                    entry.cache.make_and_model = value.as_string().map(|s| repair_make_and_model(&s));
                    entry.cache.info = value.as_string();
                }
                DEVICE_ID => entry.cache.device_id = value.as_string(),
                DEVICE_URI => entry.cache.uri = value.as_string(),
                DEVICE_LOCATION => entry.cache.location = value.as_string(),
                _ => {}
            }
        }

        if first_contact {
            self.send_followups(addr, community);
        }
    }

    fn send_followups(&self, addr: SocketAddr, community: &str) {
        let followups = [
            (OID_HR_DEVICE_DESCR, DEVICE_DESCRIPTION),
            (OID_PPM_IEEE1284_DEVICE_ID, DEVICE_ID),
            (OID_PPM_PORT_SERVICE_NAME, DEVICE_URI),
            (OID_SYS_LOCATION, DEVICE_LOCATION),
        ];
        for (oid_str, tag) in followups {
            if let Some(oid) = snmp_session::oid_from_str(oid_str) {
                if let Err(err) = snmp_session::get(addr, community, &oid, tag, Duration::from_secs(2)) {
                    tracing::debug!(%addr, oid = oid_str, %err, "follow-up GET failed");
                }
            }
        }
    }

    /// Devices with both `info` and `make_and_model`, not yet reported
    /// (§4.2 point 3, timeout branch).
    pub fn ready_entries(&self) -> impl Iterator<Item = &SnmpCacheEntry> {
        self.entries.iter().map(|e| &e.cache).filter(|c| c.ready_to_probe())
    }

    /// Resolve a URI for a ready device: `DeviceURI` rule match, then a raw
    /// socket probe on 9100, then LPD on 515 (§4.2 "Probe").
    pub fn probe(&self, entry: &SnmpCacheEntry) -> Option<String> {
        if let Some(make_and_model) = &entry.make_and_model {
            for (pattern, templates) in &self.device_uri_rules {
                if pattern.is_match(make_and_model) {
                    return templates.first().map(|t| t.replace("%s", &entry.addr));
                }
            }
        }

        if tcp_probe(&entry.addr, 9100) {
            return Some(format!("socket://{}", entry.addr));
        }
        if tcp_probe(&entry.addr, 515) {
            return Some(format!("lpd://{}/", entry.addr));
        }
        None
    }

    pub fn mark_reported(&mut self, addr: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.cache.addr == addr) {
            entry.cache.reported = true;
        }
    }
}

fn tcp_probe(addr: &str, port: u16) -> bool {
    let target = format!("{addr}:{port}");
    match target.parse::<SocketAddr>() {
        Ok(socket_addr) => TcpStream::connect_timeout(&socket_addr, Duration::from_secs(1)).is_ok(),
        Err(_) => false,
    }
}

/// Clean up raw `hrDeviceDescr` text into a presentable make-and-model
/// string (§4.2 "make-and-model repair").
pub fn repair_make_and_model(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    if text.contains(':') && text.contains(';') {
        if let Some(mfg_mdl) = recover_from_1284_id(&text) {
            return mfg_mdl;
        }
    }

    if text.len() >= 15 && text[..15.min(text.len())].eq_ignore_ascii_case("hewlett-packard") {
        let rest = text[15..].trim_start();
        let rest = rest
            .strip_prefix("hp ")
            .or_else(|| rest.strip_prefix("HP "))
            .unwrap_or(rest);
        text = format!("HP {rest}");
    } else if text.len() >= 7 && text[..7].eq_ignore_ascii_case("deskjet") {
        text = format!("HP DeskJet{}", &text[7..]);
    } else if text.len() >= 9 && text[..9].eq_ignore_ascii_case("officejet") {
        text = format!("HP OfficeJet{}", &text[9..]);
    } else if text.len() >= 11 && text[..11].eq_ignore_ascii_case("stylus_pro_") {
        text = format!("EPSON Stylus Pro {}", &text[11..]);
    }

    text = text.replace(", Inc.,", ",");
    if let Some(idx) = text.find(" Network") {
        text.truncate(idx);
    }
    if let Some(idx) = text.find(',') {
        text.truncate(idx);
    }

    text.trim().to_string()
}

/// Recover make-and-model from an embedded IEEE 1284 Device ID string when
/// the description field itself looks like one.
fn recover_from_1284_id(text: &str) -> Option<String> {
    let id = backend_core::deviceid::DeviceId::parse(text);
    match (id.make(), id.model()) {
        (Some(make), Some(model)) => Some(format!("{make} {model}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_hewlett_packard_prefix() {
        assert_eq!(repair_make_and_model("Hewlett-Packard hp LaserJet 4"), "HP LaserJet 4");
    }

    #[test]
    fn repair_deskjet_prefix() {
        assert_eq!(repair_make_and_model("deskjet 2540 series"), "HP DeskJet 2540 series");
    }

    #[test]
    fn repair_stylus_pro_prefix() {
        assert_eq!(repair_make_and_model("stylus_pro_9900"), "EPSON Stylus Pro 9900");
    }

    #[test]
    fn repair_strips_inc_fragment_and_trailing_comma() {
        assert_eq!(
            repair_make_and_model("Acme Print Co, Inc., Model X, Network Printer"),
            "Acme Print Co"
        );
    }

    #[test]
    fn repair_truncates_at_network_suffix() {
        assert_eq!(repair_make_and_model("LaserJet 4 Network Card"), "LaserJet 4");
    }

    #[test]
    fn ready_entries_require_both_info_and_make_and_model() {
        let scanner = SnmpScanner::new(SnmpConfig::default());
        assert_eq!(scanner.ready_entries().count(), 0);
    }

    #[test]
    fn device_uri_rule_match_wins_over_socket_probe() {
        let mut config = SnmpConfig::default();
        config.device_uri_rules.push(backend_core::config::DeviceUriRule {
            pattern: "Acme.*".to_string(),
            templates: vec!["special://%s".to_string()],
        });
        let scanner = SnmpScanner::new(config);
        let mut entry = SnmpCacheEntry::new("10.0.0.5", "10.0.0.5");
        entry.make_and_model = Some("Acme LaserJet".to_string());
        entry.info = Some("Acme LaserJet".to_string());
        assert_eq!(scanner.probe(&entry), Some("special://10.0.0.5".to_string()));
    }
}
