// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IEEE 1284 Device ID parsing and formatting.
//
// A device ID is a semicolon-delimited list of `KEY:VALUE;` pairs
// (`MFG:HP;MDL:LaserJet;CMD:PCL,PJL;`). Both the DNS-SD TXT-record synthesizer
// and the SNMP make-and-model repair routine build and tear these apart, so
// the representation lives here rather than being duplicated per subsystem.

use std::fmt;

/// A parsed 1284 device ID, preserving pair order for round-tripping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceId {
    pairs: Vec<(String, String)>,
}

impl DeviceId {
    pub fn new() -> Self {
        DeviceId::default()
    }

    /// Parse a `KEY:VALUE;KEY:VALUE;` string. Pairs missing a `:` are
    /// skipped; a trailing pair without `;` is still accepted.
    pub fn parse(raw: &str) -> Self {
        let mut pairs = Vec::new();
        for segment in raw.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if let Some((key, value)) = segment.split_once(':') {
                pairs.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        DeviceId { pairs }
    }

    /// Look up a key case-insensitively, returning the first match.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set (replacing any existing entry with the same key) or append a
    /// `KEY:VALUE` pair.
    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            slot.1 = value.to_string();
        } else {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    /// Append a `KEY:VALUE` pair unconditionally, even if the key already
    /// exists — used by TXT-record synthesis, where `usb_*` keys are
    /// appended verbatim in discovery order (§4.1).
    pub fn append(&mut self, key: &str, value: &str) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn make(&self) -> Option<&str> {
        self.get("MFG").or_else(|| self.get("MANUFACTURER"))
    }

    pub fn model(&self) -> Option<&str> {
        self.get("MDL").or_else(|| self.get("MODEL"))
    }

    pub fn command_set(&self) -> Option<&str> {
        self.get("CMD").or_else(|| self.get("COMMAND SET"))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.pairs {
            write!(f, "{key}:{value};")?;
        }
        Ok(())
    }
}

/// Map a `pdl=` MIME type from a DNS-SD TXT record to a `CMD:` token
/// (§4.1, `pdl` key handling).
pub fn mime_to_cmd_token(mime: &str) -> Option<String> {
    let mime = mime.trim();
    match mime {
        "application/pdf" => Some("PDF".to_string()),
        "application/postscript" => Some("PS".to_string()),
        "application/vnd.hp-PCL" => Some("PCL".to_string()),
        _ => mime
            .strip_prefix("image/")
            .map(|subtype| subtype.to_uppercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_format_is_stable_for_well_formed_ids() {
        let id = DeviceId::parse("MFG:HP;MDL:LaserJet 4;CMD:PCL,PJL;");
        assert_eq!(id.make(), Some("HP"));
        assert_eq!(id.model(), Some("LaserJet 4"));
        assert_eq!(id.command_set(), Some("PCL,PJL"));
        let reparsed = DeviceId::parse(&id.to_string());
        assert_eq!(id, reparsed);
    }

    #[test]
    fn malformed_segments_without_colon_are_skipped() {
        let id = DeviceId::parse("MFG:HP;garbage;MDL:X;");
        assert_eq!(id.get("MFG"), Some("HP"));
        assert_eq!(id.get("MDL"), Some("X"));
    }

    #[test]
    fn set_replaces_existing_key_case_insensitively() {
        let mut id = DeviceId::parse("mfg:HP;");
        id.set("MFG", "Epson");
        assert_eq!(id.get("mfg"), Some("Epson"));
        assert_eq!(id.to_string(), "mfg:Epson;");
    }

    #[test]
    fn mime_mapping_table() {
        assert_eq!(mime_to_cmd_token("application/pdf").as_deref(), Some("PDF"));
        assert_eq!(
            mime_to_cmd_token("application/postscript").as_deref(),
            Some("PS")
        );
        assert_eq!(
            mime_to_cmd_token("application/vnd.hp-PCL").as_deref(),
            Some("PCL")
        );
        assert_eq!(mime_to_cmd_token("image/urf").as_deref(), Some("URF"));
        assert_eq!(mime_to_cmd_token("text/plain"), None);
    }
}
