// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Supplies walker (§4.5): polls `prtMarkerSuppliesTable` and
// `hrPrinterDetectedErrorState`, diffs against the previous poll, and emits
// `ATTR:`/`STATE:` lines through `report.rs`. Bit tables and the colorant
// palette are taken straight from `snmp-supplies.c`'s constant tables.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backend_core::error::{BackendError, Result};
use backend_core::types::{SupplyClass, SupplyDescriptor, SupplyType, MAX_SUPPLIES};

use crate::charset::{self, CharSet};
use crate::report;
use crate::snmp_session;

const OID_HR_DEVICE_DESCR: &str = "1.3.6.1.2.1.25.3.2.1.3.1";
const OID_PRT_CURRENT_LOCALIZATION: &str = "1.3.6.1.2.1.43.13.2.1.1.1";
const OID_PRT_LOCALIZATION_CHARSET_PREFIX: &str = "1.3.6.1.2.1.43.12.1.1.4.1";
const OID_PRT_MARKER_SUPPLIES_CLASS: &str = "1.3.6.1.2.1.43.11.1.1.4.1";
const OID_PRT_MARKER_SUPPLIES_TYPE: &str = "1.3.6.1.2.1.43.11.1.1.5.1";
const OID_PRT_MARKER_SUPPLIES_DESCRIPTION: &str = "1.3.6.1.2.1.43.11.1.1.6.1";
const OID_PRT_MARKER_SUPPLIES_UNIT: &str = "1.3.6.1.2.1.43.11.1.1.7.1";
const OID_PRT_MARKER_SUPPLIES_MAX_CAPACITY: &str = "1.3.6.1.2.1.43.11.1.1.8.1";
const OID_PRT_MARKER_SUPPLIES_LEVEL: &str = "1.3.6.1.2.1.43.11.1.1.9.1";
const OID_PRT_MARKER_COLORANT_VALUE: &str = "1.3.6.1.2.1.43.12.1.1.6.1";
const OID_HR_PRINTER_DETECTED_ERROR_STATE: &str = "1.3.6.1.2.1.25.3.5.1.2.1";

/// RFC 1759 `PrtMarkerSuppliesSupplyUnitTC::percent`.
const SUPPLY_UNIT_PERCENT: i64 = 19;

/// Printer-state bitmap (`hrPrinterDetectedErrorState`, big-endian 16-bit),
/// from `backend-private.h`'s `CUPS_TC_*` constants.
const BIT_OUTPUT_FULL: u16 = 0x0008;
const BIT_OUTPUT_NEAR_FULL: u16 = 0x0010;
const BIT_MARKER_SUPPLY_MISSING: u16 = 0x0020;
const BIT_OUTPUT_TRAY_MISSING: u16 = 0x0040;
const BIT_INPUT_TRAY_MISSING: u16 = 0x0080;
const BIT_JAMMED: u16 = 0x0400;
const BIT_DOOR_OPEN: u16 = 0x0800;
const BIT_NO_PAPER: u16 = 0x4000;
const BIT_INPUT_TRAY_EMPTY: u16 = 0x0004;

/// Fixed bit-to-keyword table for the printer-state bitmap, in the order
/// `snmp-supplies.c`'s `printer_states[]` checks them.
const PRINTER_STATE_TABLE: &[(u16, &str)] = &[
    (BIT_NO_PAPER | BIT_INPUT_TRAY_EMPTY, "media-empty-warning"),
    (BIT_DOOR_OPEN, "door-open-report"),
    (BIT_JAMMED, "media-jam-warning"),
    (BIT_INPUT_TRAY_MISSING, "input-tray-missing-warning"),
    (BIT_OUTPUT_TRAY_MISSING, "output-tray-missing-warning"),
    (BIT_MARKER_SUPPLY_MISSING, "marker-supply-missing-warning"),
    (BIT_OUTPUT_NEAR_FULL, "output-area-almost-full-report"),
    (BIT_OUTPUT_FULL, "output-area-full-warning"),
];

/// `<low-keyword>, <empty-keyword>` per supply-type family, §4.5 point 3.
fn supply_state_keywords(supply_type: SupplyType) -> Option<(&'static str, &'static str)> {
    match supply_type {
        SupplyType::Toner => Some(("toner-low-report", "toner-empty-warning")),
        SupplyType::InkOrWax => Some(("marker-supply-low-report", "marker-supply-empty-warning")),
        SupplyType::Developer => Some(("developer-low-report", "developer-empty-warning")),
        SupplyType::OpcFuserTransferCorona => Some(("opc-near-eol-report", "opc-life-over-warning")),
        SupplyType::CleanerOrFuserPad => {
            Some(("cleaner-life-almost-over-report", "cleaner-life-over-warning"))
        }
        SupplyType::Waste | SupplyType::Other => None,
    }
}

/// Well-known colorant name to `#RRGGBB`, per §4.5 "Colorant table".
fn colorant_hex(name: &str) -> &'static str {
    match name {
        "black" => "#000000",
        "cyan" => "#00FFFF",
        "magenta" => "#FF00FF",
        "yellow" => "#FFFF00",
        "lightCyan" => "#77FFFF",
        "lightMagenta" => "#FF77FF",
        "lightBlack" | "gray" => "#808080",
        "blue" => "#0000FF",
        "brown" => "#806914",
        "green" => "#00FF00",
        "orange" => "#FF7F00",
        "red" => "#FF0000",
        "violet" | "purple" => "#8B00FF",
        "white" => "#FFFFFF",
        _ => "none",
    }
}

/// Whether a queue's PPD opts the walker in. Absence of either keyword is
/// permitted and defaults to enabled (§4.5 "PPD gating").
#[derive(Debug, Clone, Copy, Default)]
pub struct PpdSupplyOptions {
    pub supplies_enabled: bool,
    pub capacity_quirk: bool,
}

impl PpdSupplyOptions {
    /// Scan a PPD file's text for `*cupsSNMPSupplies:` and
    /// `*cupsSNMPQuirks: capacity`.
    pub fn from_ppd_text(text: &str) -> Self {
        let mut supplies_enabled = true;
        let mut capacity_quirk = false;
        for line in text.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("*cupsSNMPSupplies:") {
                supplies_enabled = !rest.trim().trim_matches('"').eq_ignore_ascii_case("false");
            } else if let Some(rest) = line.strip_prefix("*cupsSNMPQuirks:") {
                if rest.trim().trim_matches('"').eq_ignore_ascii_case("capacity") {
                    capacity_quirk = true;
                }
            }
        }
        PpdSupplyOptions { supplies_enabled, capacity_quirk }
    }

    /// Read gating options from the PPD named by the `PPD` environment
    /// variable. Absent or unreadable PPD means supplies stay enabled.
    pub fn from_env() -> Self {
        match std::env::var("PPD") {
            Ok(path) => match std::fs::read_to_string(&path) {
                Ok(text) => Self::from_ppd_text(&text),
                Err(_) => PpdSupplyOptions { supplies_enabled: true, capacity_quirk: false },
            },
            Err(_) => PpdSupplyOptions { supplies_enabled: true, capacity_quirk: false },
        }
    }
}

/// Tracks per-device walker state across polls: descriptors, previous
/// supply-state bitmap, and previous printer-state bitmap, so successive
/// polls only emit `STATE:` lines for bits that actually changed.
pub struct SuppliesWalker {
    cache_dir: PathBuf,
    community: String,
    quirk: bool,
    devices: HashMap<SocketAddr, DeviceState>,
}

struct DeviceState {
    description: String,
    charset: CharSet,
    supplies: Vec<SupplyDescriptor>,
    supply_state_bits: u32,
    printer_state_bits: u16,
    initialized: bool,
}

impl SuppliesWalker {
    pub fn new(cache_dir: PathBuf, community: &str, quirk: bool) -> Self {
        SuppliesWalker {
            cache_dir,
            community: community.to_string(),
            quirk,
            devices: HashMap::new(),
        }
    }

    fn cache_path(&self, addr: SocketAddr) -> PathBuf {
        self.cache_dir.join(format!("{}.snmp", addr.ip()))
    }

    /// Poll one device, initializing its descriptor table on first contact
    /// and emitting `ATTR:`/`STATE:` lines for whatever changed.
    pub fn poll(&mut self, addr: SocketAddr) -> Result<()> {
        if !self.devices.contains_key(&addr) {
            self.initialize(addr)?;
        }

        let levels = self.read_levels(addr)?;
        {
            let state = self.devices.get_mut(&addr).expect("initialized above");
            for (descriptor, level) in state.supplies.iter_mut().zip(levels.iter()) {
                descriptor.level = *level;
            }
        }
        self.emit_supply_state(addr)?;
        self.emit_printer_state(addr)?;
        Ok(())
    }

    /// Read the device description, character set, and (if the cache is
    /// stale or missing) the full `prtMarkerSuppliesTable` plus colorant
    /// table, persisting the result to the cache file (§4.5 "Initialization").
    fn initialize(&mut self, addr: SocketAddr) -> Result<()> {
        let description = self.get_device_description(addr).unwrap_or_default();
        let charset = self.resolve_charset(addr).unwrap_or(CharSet::Ascii);

        let cache_path = self.cache_path(addr);
        if let Some(cached) = read_cache(&cache_path) {
            if cached.description == description {
                emit_supply_descriptor_attrs(&cached.supplies);
                self.devices.insert(
                    addr,
                    DeviceState {
                        description,
                        charset,
                        supplies: cached.supplies,
                        supply_state_bits: 0,
                        printer_state_bits: 0,
                        initialized: true,
                    },
                );
                return Ok(());
            }
        }

        let supplies = self.walk_supplies(addr, charset)?;
        write_cache(&cache_path, charset, &description, &supplies)?;

        emit_supply_descriptor_attrs(&supplies);
        self.devices.insert(
            addr,
            DeviceState {
                description,
                charset,
                supplies,
                supply_state_bits: 0,
                printer_state_bits: 0,
                initialized: true,
            },
        );
        Ok(())
    }

    fn get_device_description(&self, addr: SocketAddr) -> Result<String> {
        let oid = snmp_session::oid_from_str(OID_HR_DEVICE_DESCR)
            .ok_or_else(|| BackendError::Snmp("bad device-description OID".into()))?;
        let (_, value) = snmp_session::get(addr, &self.community, &oid, 1, Duration::from_secs(2))?;
        Ok(value.as_string().unwrap_or_default())
    }

    fn resolve_charset(&self, addr: SocketAddr) -> Result<CharSet> {
        let oid = snmp_session::oid_from_str(OID_PRT_CURRENT_LOCALIZATION)
            .ok_or_else(|| BackendError::Snmp("bad localization OID".into()))?;
        let (_, loc) = snmp_session::get(addr, &self.community, &oid, 1, Duration::from_secs(2))?;
        let index = loc.as_int().unwrap_or(1);

        let charset_oid_str = format!("{OID_PRT_LOCALIZATION_CHARSET_PREFIX}.{index}");
        let charset_oid = snmp_session::oid_from_str(&charset_oid_str)
            .ok_or_else(|| BackendError::Snmp("bad charset OID".into()))?;
        let (_, cs) = snmp_session::get(addr, &self.community, &charset_oid, 1, Duration::from_secs(2))?;
        Ok(CharSet::from_mib_value(cs.as_int().unwrap_or(3)))
    }

    /// Walk the supplies table row by row (bounded by [`MAX_SUPPLIES`]),
    /// then the colorant table, matching colorant indices back to rows.
    fn walk_supplies(&self, addr: SocketAddr, charset: CharSet) -> Result<Vec<SupplyDescriptor>> {
        let mut supplies = Vec::new();
        for row in 1..=MAX_SUPPLIES {
            let class = self.get_row_int(addr, OID_PRT_MARKER_SUPPLIES_CLASS, row)?;
            let class = match class {
                Some(3) => SupplyClass::Consumed,
                Some(4) => SupplyClass::ReceptacleFilled,
                Some(_) => SupplyClass::Unknown,
                None => break,
            };

            let supply_type = self
                .get_row_int(addr, OID_PRT_MARKER_SUPPLIES_TYPE, row)?
                .map(|v| SupplyType::from_mib_type(v as i32))
                .unwrap_or(SupplyType::Other);

            let description_bytes = self.get_row_bytes(addr, OID_PRT_MARKER_SUPPLIES_DESCRIPTION, row)?;
            let name = charset::decode(&description_bytes.unwrap_or_default(), charset);

            let unit = self.get_row_int(addr, OID_PRT_MARKER_SUPPLIES_UNIT, row)?.unwrap_or(0);
            let mut max_capacity =
                self.get_row_int(addr, OID_PRT_MARKER_SUPPLIES_MAX_CAPACITY, row)?.unwrap_or(0) as i32;
            if unit == SUPPLY_UNIT_PERCENT {
                max_capacity = 100;
            }

            let level = self.get_row_int(addr, OID_PRT_MARKER_SUPPLIES_LEVEL, row)?.unwrap_or(-1) as i32;

            let colorant_index = self.get_row_int(addr, OID_PRT_MARKER_COLORANT_VALUE, row)?.unwrap_or(0);

            supplies.push(SupplyDescriptor {
                name,
                color: "none".to_string(),
                colorant: colorant_index as i32,
                class,
                supply_type,
                max_capacity,
                level,
            });
        }

        for descriptor in &mut supplies {
            if descriptor.colorant > 0 {
                if let Ok(Some(colorant_name)) =
                    self.get_row_bytes(addr, OID_PRT_MARKER_COLORANT_VALUE, descriptor.colorant as usize)
                {
                    let name = String::from_utf8_lossy(&colorant_name).into_owned();
                    descriptor.color = colorant_hex(&name).to_string();
                }
            }
        }

        Ok(supplies)
    }

    fn get_row_int(&self, addr: SocketAddr, base_oid: &str, row: usize) -> Result<Option<i64>> {
        let oid_str = format!("{base_oid}.{row}");
        let Some(oid) = snmp_session::oid_from_str(&oid_str) else {
            return Ok(None);
        };
        match snmp_session::get(addr, &self.community, &oid, 1, Duration::from_secs(2)) {
            Ok((_, value)) => Ok(value.as_int()),
            Err(_) => Ok(None),
        }
    }

    fn get_row_bytes(&self, addr: SocketAddr, base_oid: &str, row: usize) -> Result<Option<Vec<u8>>> {
        let oid_str = format!("{base_oid}.{row}");
        let Some(oid) = snmp_session::oid_from_str(&oid_str) else {
            return Ok(None);
        };
        match snmp_session::get(addr, &self.community, &oid, 1, Duration::from_secs(2)) {
            Ok((_, snmp_session::SnmpValue::OctetString(bytes))) => Ok(Some(bytes)),
            _ => Ok(None),
        }
    }

    /// Incremental re-walk of levels only (§4.5 per-poll action 1).
    fn read_levels(&self, addr: SocketAddr) -> Result<Vec<i32>> {
        let state = self
            .devices
            .get(&addr)
            .ok_or_else(|| BackendError::Snmp("device not initialized".into()))?;
        let mut levels = Vec::with_capacity(state.supplies.len());
        for row in 1..=state.supplies.len() {
            let level = self
                .get_row_int(addr, OID_PRT_MARKER_SUPPLIES_LEVEL, row)?
                .unwrap_or(-1) as i32;
            levels.push(level);
        }
        Ok(levels)
    }

    /// Compute percentages, emit `ATTR: marker-levels=...`, and diff the
    /// supply-state bitmap against the previous poll (§4.5 points 2-4).
    fn emit_supply_state(&mut self, addr: SocketAddr) -> Result<()> {
        let quirk = self.quirk;
        let state = self
            .devices
            .get_mut(&addr)
            .ok_or_else(|| BackendError::Snmp("device not initialized".into()))?;

        let mut percentages = Vec::with_capacity(state.supplies.len());
        let mut new_bits: u32 = 0;

        for (index, descriptor) in state.supplies.iter().enumerate() {
            let computed = if descriptor.max_capacity > 0 && descriptor.level >= 0 {
                Some(100 * descriptor.level / descriptor.max_capacity)
            } else if quirk && (0..=100).contains(&descriptor.level) {
                Some(descriptor.level)
            } else {
                None
            };

            // Unknown level (max unset, or level still -1) reports the
            // documented -1 sentinel rather than a fabricated percentage.
            let percent = match computed {
                Some(computed) if descriptor.class == SupplyClass::ReceptacleFilled => 100 - computed,
                Some(computed) => computed,
                None => -1,
            };
            percentages.push(percent);

            if computed.is_some() && percent <= 5 {
                if supply_state_keywords(descriptor.supply_type).is_some() {
                    new_bits |= 1 << (index as u32 * 2);
                    if percent <= 1 {
                        new_bits |= 1 << (index as u32 * 2 + 1);
                    }
                }
            }
        }

        report::attr_marker_levels(&percentages);

        let previous = state.supply_state_bits;
        let initialized = state.initialized;
        for (index, descriptor) in state.supplies.iter().enumerate() {
            let Some((low_keyword, empty_keyword)) = supply_state_keywords(descriptor.supply_type) else {
                continue;
            };
            let low_bit = 1 << (index as u32 * 2);
            let empty_bit = 1 << (index as u32 * 2 + 1);
            emit_bit_transition(previous, new_bits, low_bit, low_keyword, initialized);
            emit_bit_transition(previous, new_bits, empty_bit, empty_keyword, initialized);
        }

        state.supply_state_bits = new_bits;
        state.initialized = true;
        Ok(())
    }

    /// GET `hrPrinterDetectedErrorState`, diff against the previous poll,
    /// and emit matching `STATE:` lines (§4.5 point 5).
    fn emit_printer_state(&mut self, addr: SocketAddr) -> Result<()> {
        let oid = snmp_session::oid_from_str(OID_HR_PRINTER_DETECTED_ERROR_STATE)
            .ok_or_else(|| BackendError::Snmp("bad error-state OID".into()))?;
        let (_, value) = snmp_session::get(addr, &self.community, &oid, 1, Duration::from_secs(2))?;

        let bits = match value {
            snmp_session::SnmpValue::OctetString(bytes) if bytes.len() >= 2 => {
                u16::from_be_bytes([bytes[0], bytes[1]])
            }
            _ => 0,
        };

        let state = self
            .devices
            .get_mut(&addr)
            .ok_or_else(|| BackendError::Snmp("device not initialized".into()))?;
        let previous = state.printer_state_bits;

        for &(mask, keyword) in PRINTER_STATE_TABLE {
            let was_set = previous & mask == mask && mask != 0;
            let is_set = bits & mask == mask && mask != 0;
            if is_set && !was_set {
                report::state('+', keyword);
            } else if was_set && !is_set {
                report::state('-', keyword);
            }
        }

        state.printer_state_bits = bits;
        Ok(())
    }
}

/// Marker-type label used in `ATTR: marker-types=` — one of the family
/// names the IPP `marker-types` keyword set defines, per RFC 3805's
/// `PrtMarkerSuppliesTypeTC` to `marker-types` IPP mapping.
fn supply_type_label(supply_type: SupplyType) -> &'static str {
    match supply_type {
        SupplyType::Toner => "toner",
        SupplyType::InkOrWax => "ink",
        SupplyType::Developer => "developer",
        SupplyType::OpcFuserTransferCorona => "opc",
        SupplyType::CleanerOrFuserPad => "fuser-cleaning-pad",
        SupplyType::Waste => "waste-toner",
        SupplyType::Other => "unknown",
    }
}

/// Emit the three descriptor-derived `ATTR:` lines (§6) once per descriptor
/// load — colors, types, and names don't change between polls the way
/// levels do, so they're only re-emitted when the supply table itself is
/// (re)read, not on every poll (invariant 2: the four CSV arrays share
/// cardinality whenever they're emitted together).
fn emit_supply_descriptor_attrs(supplies: &[SupplyDescriptor]) {
    let colors: Vec<String> = supplies.iter().map(|s| s.color.clone()).collect();
    let types: Vec<String> = supplies
        .iter()
        .map(|s| supply_type_label(s.supply_type).to_string())
        .collect();
    let names: Vec<String> = supplies.iter().map(|s| s.name.clone()).collect();
    report::attr_marker_colors(&colors);
    report::attr_marker_types(&types);
    report::attr_marker_names(&names);
}

fn emit_bit_transition(previous: u32, new: u32, mask: u32, keyword: &str, initialized: bool) {
    let was_set = initialized && previous & mask != 0;
    let is_set = new & mask != 0;
    if is_set && !was_set {
        report::state('+', keyword);
    } else if was_set && !is_set {
        report::state('-', keyword);
    }
}

struct CachedDescriptors {
    description: String,
    supplies: Vec<SupplyDescriptor>,
}

/// Parse the `<cache-dir>/<addr>.snmp` cache file (§4.5 "Initialization",
/// point 3). Corrupt or missing caches are treated as a cold start.
fn read_cache(path: &Path) -> Option<CachedDescriptors> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut lines = text.lines();
    let header = lines.next()?;
    let mut parts = header.split_whitespace();
    if parts.next()? != "3" {
        return None;
    }
    let num_supplies: usize = parts.next()?.parse().ok()?;
    let _charset: i64 = parts.next()?.parse().ok()?;
    let description = lines.next()?.to_string();

    let mut supplies = Vec::with_capacity(num_supplies);
    for line in lines.take(num_supplies) {
        let mut fields = line.split('\t');
        let name = fields.next()?.to_string();
        let color = fields.next()?.to_string();
        let colorant: i32 = fields.next()?.parse().ok()?;
        let class = match fields.next()? {
            "consumed" => SupplyClass::Consumed,
            "receptacle" => SupplyClass::ReceptacleFilled,
            _ => SupplyClass::Unknown,
        };
        let supply_type = SupplyType::from_mib_type(fields.next()?.parse().ok()?);
        let max_capacity: i32 = fields.next()?.parse().ok()?;
        let level: i32 = fields.next()?.parse().ok()?;
        supplies.push(SupplyDescriptor {
            name,
            color,
            colorant,
            class,
            supply_type,
            max_capacity,
            level,
        });
    }
    if supplies.len() != num_supplies {
        return None;
    }
    Some(CachedDescriptors { description, supplies })
}

fn write_cache(
    path: &Path,
    charset: CharSet,
    description: &str,
    supplies: &[SupplyDescriptor],
) -> Result<()> {
    let charset_code = match charset {
        CharSet::Ascii => 3,
        CharSet::IsoLatin1 => 4,
        CharSet::ShiftJis => 17,
        CharSet::Utf8 => 106,
        _ => 3,
    };
    let mut body = format!("3 {} {}\n{}\n", supplies.len(), charset_code, description);
    for descriptor in supplies {
        let class = match descriptor.class {
            SupplyClass::Consumed => "consumed",
            SupplyClass::ReceptacleFilled => "receptacle",
            SupplyClass::Unknown => "unknown",
        };
        body.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            descriptor.name,
            descriptor.color,
            descriptor.colorant,
            class,
            mib_type_code(descriptor.supply_type),
            descriptor.max_capacity,
            descriptor.level,
        ));
    }
    std::fs::write(path, body)?;
    Ok(())
}

fn mib_type_code(supply_type: SupplyType) -> i32 {
    match supply_type {
        SupplyType::Toner => 3,
        SupplyType::Waste => 4,
        SupplyType::InkOrWax => 5,
        SupplyType::Developer => 10,
        SupplyType::OpcFuserTransferCorona => 9,
        SupplyType::CleanerOrFuserPad => 18,
        SupplyType::Other => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_core::types::SupplyType;

    #[test]
    fn colorant_table_maps_known_names() {
        assert_eq!(colorant_hex("cyan"), "#00FFFF");
        assert_eq!(colorant_hex("lightBlack"), "#808080");
        assert_eq!(colorant_hex("gray"), "#808080");
        assert_eq!(colorant_hex("mystery"), "none");
    }

    #[test]
    fn supply_state_keywords_skip_waste_and_other() {
        assert!(supply_state_keywords(SupplyType::Waste).is_none());
        assert!(supply_state_keywords(SupplyType::Other).is_none());
        assert_eq!(
            supply_state_keywords(SupplyType::Toner),
            Some(("toner-low-report", "toner-empty-warning"))
        );
    }

    #[test]
    fn ppd_gating_defaults_enabled_when_keywords_absent() {
        let opts = PpdSupplyOptions::from_ppd_text("*Manufacturer: \"Acme\"\n");
        assert!(opts.supplies_enabled);
        assert!(!opts.capacity_quirk);
    }

    #[test]
    fn ppd_gating_honors_explicit_false_and_capacity_quirk() {
        let opts = PpdSupplyOptions::from_ppd_text(
            "*cupsSNMPSupplies: False\n*cupsSNMPQuirks: capacity\n",
        );
        assert!(!opts.supplies_enabled);
        assert!(opts.capacity_quirk);
    }

    #[test]
    fn cache_round_trips_through_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.snmp");
        let supplies = vec![SupplyDescriptor {
            name: "Black Toner".to_string(),
            color: "#000000".to_string(),
            colorant: 1,
            class: SupplyClass::Consumed,
            supply_type: SupplyType::Toner,
            max_capacity: 1000,
            level: 300,
        }];
        write_cache(&path, CharSet::Ascii, "Acme LaserJet", &supplies).unwrap();

        let cached = read_cache(&path).expect("cache should parse");
        assert_eq!(cached.description, "Acme LaserJet");
        assert_eq!(cached.supplies.len(), 1);
        assert_eq!(cached.supplies[0].name, "Black Toner");
        assert_eq!(cached.supplies[0].level, 300);
    }

    #[test]
    fn stale_cache_with_wrong_row_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.snmp");
        std::fs::write(&path, "3 2 3\nDescr\nonly-one-row-here\n").unwrap();
        assert!(read_cache(&path).is_none());
    }

    #[test]
    fn printer_state_table_covers_s3_scenario_bits() {
        // Scenario: detected-error-state 0x4004 == noPaper | inputTrayEmpty.
        let bits: u16 = 0x4004;
        let matched: Vec<&str> = PRINTER_STATE_TABLE
            .iter()
            .filter(|&&(mask, _)| bits & mask == mask)
            .map(|&(_, keyword)| keyword)
            .collect();
        assert_eq!(matched, vec!["media-empty-warning"]);
    }
}
