// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thin synchronous wrapper over the `snmp` crate, isolating its exact API
// surface to this one file. Everything downstream (the scanner, the
// side-channel proxy) talks to [`SnmpValue`] and the symbolic request-id
// tags, never to `snmp::Value` directly.

use std::net::SocketAddr;
use std::time::Duration;

use snmp::{SyncSession, Value};

use backend_core::error::{BackendError, Result};

/// Symbolic request-id tags used both as the SNMPv1 protocol field and as a
/// routing key for matching replies to the follow-up GET that produced them
/// (§6, "SNMP wire").
pub const DEVICE_TYPE: i32 = 1;
pub const DEVICE_DESCRIPTION: i32 = 2;
pub const DEVICE_LOCATION: i32 = 3;
pub const DEVICE_ID: i32 = 4;
pub const DEVICE_URI: i32 = 5;
pub const DEVICE_PRODUCT: i32 = 6;

/// All tags the scanner ever issues; a reply whose request-id isn't in this
/// set is dropped (invariant 7).
pub const KNOWN_TAGS: [i32; 6] = [
    DEVICE_TYPE,
    DEVICE_DESCRIPTION,
    DEVICE_LOCATION,
    DEVICE_ID,
    DEVICE_URI,
    DEVICE_PRODUCT,
];

/// A value decoded from an SNMP varbind, detached from the wire crate's
/// borrowed representation.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectIdentifier(String),
    Counter(u32),
    Gauge(u32),
    Timeticks(u32),
    HexString(Vec<u8>),
    Null,
    Other,
}

impl SnmpValue {
    fn from_wire(value: Value<'_>) -> Self {
        match value {
            Value::Integer(i) => SnmpValue::Integer(i),
            Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
            Value::ObjectIdentifier(oid) => SnmpValue::ObjectIdentifier(oid.to_string()),
            Value::Counter32(c) => SnmpValue::Counter(c),
            Value::Unsigned32(c) => SnmpValue::Gauge(c),
            Value::Timeticks(t) => SnmpValue::Timeticks(t),
            Value::Null => SnmpValue::Null,
            _ => SnmpValue::Other,
        }
    }

    /// Render a value the way the side-channel SNMP proxy does (§4.4): plain
    /// integers in decimal, octet-strings raw (lossy UTF-8), hex-strings as
    /// uppercase hex pairs, OIDs dotted, null as the empty string.
    pub fn render(&self) -> String {
        match self {
            SnmpValue::Integer(i) => i.to_string(),
            SnmpValue::Counter(c) => c.to_string(),
            SnmpValue::Gauge(g) => g.to_string(),
            SnmpValue::Timeticks(t) => t.to_string(),
            SnmpValue::OctetString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            SnmpValue::HexString(bytes) => bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(""),
            SnmpValue::ObjectIdentifier(oid) => oid.clone(),
            SnmpValue::Null | SnmpValue::Other => String::new(),
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(i) => Some(*i),
            SnmpValue::Counter(c) | SnmpValue::Gauge(c) | SnmpValue::Timeticks(c) => {
                Some(*c as i64)
            }
            _ => None,
        }
    }
}

/// Parse a dotted OID string (`"1.3.6.1.2.1.1.1.0"`) into its component
/// arcs. Returns `None` on any non-numeric component.
pub fn oid_from_str(s: &str) -> Option<Vec<u32>> {
    s.trim()
        .trim_start_matches('.')
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

pub fn oid_to_string(oid: &[u32]) -> String {
    oid.iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Issue a single SNMPv1 GET, tagging the request with `tag` (one of the
/// `DEVICE_*` constants, or an arbitrary value for the side-channel proxy).
/// Returns the request-id echoed by the agent and the first varbind's value.
pub fn get(
    addr: SocketAddr,
    community: &str,
    oid: &[u32],
    tag: i32,
    timeout: Duration,
) -> Result<(i32, SnmpValue)> {
    let mut session = SyncSession::new(addr, community.as_bytes(), Some(timeout), tag)
        .map_err(|e| BackendError::Snmp(format!("opening session to {addr}: {e}")))?;

    let pdu = session
        .get(oid)
        .map_err(|e| BackendError::Snmp(format!("GET {} from {addr}: {e}", oid_to_string(oid))))?;

    let (_oid, value) = pdu
        .varbinds
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Snmp(format!("empty response from {addr}")))?;

    Ok((pdu.req_id, SnmpValue::from_wire(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_round_trips_through_string() {
        let dotted = "1.3.6.1.2.1.43.5.1.1.17.1";
        let oid = oid_from_str(dotted).unwrap();
        assert_eq!(oid_to_string(&oid), dotted);
    }

    #[test]
    fn oid_from_str_rejects_non_numeric() {
        assert!(oid_from_str("1.3.x.1").is_none());
    }

    #[test]
    fn render_hex_string_is_uppercase_pairs() {
        let value = SnmpValue::HexString(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(value.render(), "DEADBEEF");
    }

    #[test]
    fn render_octet_string_is_raw_text() {
        let value = SnmpValue::OctetString(b"ACME42".to_vec());
        assert_eq!(value.render(), "ACME42");
    }

    #[test]
    fn known_tags_cover_all_symbolic_constants() {
        for tag in [
            DEVICE_TYPE,
            DEVICE_DESCRIPTION,
            DEVICE_LOCATION,
            DEVICE_ID,
            DEVICE_URI,
            DEVICE_PRODUCT,
        ] {
            assert!(KNOWN_TAGS.contains(&tag));
        }
    }
}
