// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DNS-SD TXT record interpretation (§4.1, "TXT parsing").

use std::collections::HashMap;

use backend_core::deviceid::{mime_to_cmd_token, DeviceId};

/// Fields synthesized from a TXT record, ready to merge into a
/// [`backend_core::types::DeviceRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtFields {
    pub make: Option<String>,
    pub model: Option<String>,
    pub device_id: Option<String>,
    pub priority: Option<u32>,
    pub cups_shared: bool,
    pub suppress_lpd: bool,
    pub uuid: Option<String>,
}

/// Interpret a flat TXT key/value map per §4.1. `is_lpd` selects whether a
/// `printer-type` key additionally suppresses reporting (true only for
/// `_printer._tcp` entries).
pub fn interpret_txt(txt: &HashMap<String, String>, is_lpd: bool) -> TxtFields {
    let mut fields = TxtFields::default();
    let mut device_id = DeviceId::new();
    let mut has_cmd = false;
    let mut pdl_cmd_candidate: Option<String> = None;

    // Case-insensitive lookup requires scanning; TXT records are small.
    let get = |key: &str| -> Option<(&String, &String)> {
        txt.iter().find(|(k, _)| k.eq_ignore_ascii_case(key))
    };

    if let Some((_, v)) = get("usb_MFG").or_else(|| get("usb_MANU")).or_else(|| get("usb_MANUFACTURER")) {
        fields.make = Some(v.clone());
    }
    if let Some((_, v)) = get("usb_MDL").or_else(|| get("usb_MODEL")) {
        fields.model = Some(v.clone());
    }

    for (key, value) in txt {
        if let Some(rest) = key.strip_prefix("usb_").or_else(|| key.strip_prefix("USB_")) {
            let upper = rest.to_ascii_uppercase();
            if matches!(
                upper.as_str(),
                "MFG" | "MANU" | "MANUFACTURER" | "MDL" | "MODEL"
            ) {
                continue;
            }
            device_id.append(&upper, value);
            if upper == "CMD" {
                has_cmd = true;
            }
        }
    }

    if let Some((_, v)) = get("product") {
        if !v.contains("Ghostscript") {
            let trimmed = v.trim_start_matches('(').trim_end_matches(')');
            fields.model = Some(trimmed.to_string());
        }
    }

    if let Some((_, v)) = get("ty") {
        let model = v.split(',').next().unwrap_or(v).to_string();
        fields.model = Some(model);
    }

    if let Some((_, v)) = get("pdl") {
        let tokens: Vec<String> = v.split(',').filter_map(|m| mime_to_cmd_token(m.trim())).collect();
        if !tokens.is_empty() {
            pdl_cmd_candidate = Some(tokens.join(","));
        }
    }

    if !has_cmd {
        if let Some(cmd) = pdl_cmd_candidate {
            device_id.append("CMD", &cmd);
        }
    }

    if let Some((_, v)) = get("priority") {
        if let Ok(p) = v.parse() {
            fields.priority = Some(p);
        }
    }

    if let Some((_, _v)) = get("printer-type") {
        fields.cups_shared = true;
        if is_lpd {
            fields.suppress_lpd = true;
        }
    }

    if let Some((_, v)) = get("UUID") {
        fields.uuid = Some(v.clone());
    }

    if !device_id.is_empty() {
        fields.device_id = Some(device_id.to_string());
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn usb_manufacturer_and_model() {
        let fields = interpret_txt(&txt(&[("usb_MFG", "HP"), ("usb_MDL", "LaserJet 4")]), false);
        assert_eq!(fields.make.as_deref(), Some("HP"));
        assert_eq!(fields.model.as_deref(), Some("LaserJet 4"));
    }

    #[test]
    fn other_usb_keys_become_device_id_pairs() {
        let fields = interpret_txt(&txt(&[("usb_SN", "12345")]), false);
        let id = fields.device_id.unwrap();
        assert!(id.contains("SN:12345;"));
    }

    #[test]
    fn product_skips_ghostscript_marker() {
        let fields = interpret_txt(&txt(&[("product", "(Ghostscript)")]), false);
        assert_eq!(fields.model, None);
        let fields = interpret_txt(&txt(&[("product", "(Color LaserJet)")]), false);
        assert_eq!(fields.model.as_deref(), Some("Color LaserJet"));
    }

    #[test]
    fn ty_truncates_at_first_comma() {
        let fields = interpret_txt(&txt(&[("ty", "Color LaserJet,Printer")]), false);
        assert_eq!(fields.model.as_deref(), Some("Color LaserJet"));
    }

    #[test]
    fn pdl_synthesizes_cmd_when_device_id_lacks_one() {
        let fields = interpret_txt(
            &txt(&[("pdl", "application/pdf,application/postscript")]),
            false,
        );
        assert_eq!(fields.device_id.as_deref(), Some("CMD:PDF,PS;"));
    }

    #[test]
    fn pdl_does_not_override_existing_cmd() {
        let fields = interpret_txt(
            &txt(&[("usb_CMD", "PCL"), ("pdl", "application/pdf")]),
            false,
        );
        assert_eq!(fields.device_id.as_deref(), Some("CMD:PCL;"));
    }

    #[test]
    fn printer_type_on_lpd_suppresses_reporting() {
        let fields = interpret_txt(&txt(&[("printer-type", "0x800b")]), true);
        assert!(fields.cups_shared);
        assert!(fields.suppress_lpd);
    }

    #[test]
    fn printer_type_on_ipp_does_not_suppress() {
        let fields = interpret_txt(&txt(&[("printer-type", "0x800b")]), false);
        assert!(fields.cups_shared);
        assert!(!fields.suppress_lpd);
    }

    #[test]
    fn priority_and_uuid_parsed() {
        let fields = interpret_txt(&txt(&[("priority", "10"), ("UUID", "abc-123")]), false);
        assert_eq!(fields.priority, Some(10));
        assert_eq!(fields.uuid.as_deref(), Some("abc-123"));
    }
}
