// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Domain types shared between the discovery, run-loop, side-channel, and
// supplies subsystems.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Inferred transport/protocol family for a discovered device.
///
/// Ordinal order matters: it is the tie-break used when two catalog entries
/// share a name and domain but differ in type (see [`DeviceRecord`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceType {
    Ipps = 0,
    Ipp = 1,
    IppFax = 2,
    Lpd = 3,
    AppSocket = 4,
    /// Residual "other" bucket for registration types with no dedicated
    /// mapping (e.g. `_riousbprint._tcp`).
    Riousbprint = 5,
}

impl DeviceType {
    /// Map a DNS-SD registration type string to a device type.
    ///
    /// Unknown types fall back to [`DeviceType::Riousbprint`].
    pub fn from_registration_type(reg_type: &str) -> Self {
        match reg_type {
            "_ipps._tcp" | "_ipps._tcp.local." => DeviceType::Ipps,
            "_ipp._tcp" | "_ipp._tcp.local." | "_ipp-tls._tcp" => DeviceType::Ipp,
            "_fax-ipp._tcp" => DeviceType::IppFax,
            "_printer._tcp" => DeviceType::Lpd,
            "_pdl-datastream._tcp" => DeviceType::AppSocket,
            _ => DeviceType::Riousbprint,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::Ipps => "ipps",
            DeviceType::Ipp => "ipp",
            DeviceType::IppFax => "ipp-fax",
            DeviceType::Lpd => "lpd",
            DeviceType::AppSocket => "appsocket",
            DeviceType::Riousbprint => "riousbprint",
        };
        f.write_str(s)
    }
}

/// A DNS-SD discovery catalog entry.
///
/// Keyed by `(name.to_lowercase(), device_type)` within `backend-print`'s
/// discovery catalog.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub name: String,
    pub domain: String,
    pub fullname: String,
    pub device_type: DeviceType,
    pub make_and_model: Option<String>,
    pub device_id: Option<String>,
    pub uuid: Option<Uuid>,
    pub priority: u32,
    pub shared: bool,
    /// True when this entry arrived (also) via a local-only browser, i.e.
    /// it is a queue this host shares itself and must never report back.
    pub published: bool,
    /// True while a TXT query for this device is outstanding.
    pub query_pending: bool,
    /// True once a TXT query has completed (successfully or not) — distinct
    /// from `query_pending` so the announcement pass can tell "never asked"
    /// apart from "asked and got an empty answer".
    pub resolved: bool,
    pub reported: bool,
}

impl DeviceRecord {
    pub fn new(name: &str, domain: &str, device_type: DeviceType) -> Self {
        DeviceRecord {
            name: name.to_string(),
            domain: domain.to_string(),
            fullname: format!("{name}.{domain}"),
            device_type,
            make_and_model: None,
            device_id: None,
            uuid: None,
            priority: 50,
            shared: false,
            published: false,
            query_pending: false,
            resolved: false,
            reported: false,
        }
    }

    /// Key used for catalog deduplication: case-insensitive name + type.
    pub fn catalog_key(&self) -> (String, DeviceType) {
        (self.name.to_lowercase(), self.device_type)
    }
}

/// A cached SNMP-discovered device, keyed by its canonical address string.
#[derive(Debug, Clone, Default)]
pub struct SnmpCacheEntry {
    pub addr: String,
    pub addrname: String,
    pub uri: Option<String>,
    pub device_id: Option<String>,
    pub info: Option<String>,
    pub location: Option<String>,
    pub make_and_model: Option<String>,
    pub reported: bool,
}

impl SnmpCacheEntry {
    pub fn new(addr: &str, addrname: &str) -> Self {
        SnmpCacheEntry {
            addr: addr.to_string(),
            addrname: addrname.to_string(),
            ..Default::default()
        }
    }

    /// A device is ready to report once it has both a human info string and
    /// a make-and-model, matching the original scanner's "walk the cache"
    /// timeout behavior.
    pub fn ready_to_probe(&self) -> bool {
        self.info.is_some() && self.make_and_model.is_some() && !self.reported
    }
}

/// Supply class: consumable vs. receptacle (affects percent-full inversion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyClass {
    Consumed,
    ReceptacleFilled,
    Unknown,
}

/// Marker supply kind, used to select the printer-state-reasons keyword
/// family when a supply runs low (§4.5 point 3).
///
/// Each variant other than [`SupplyType::Waste`] and [`SupplyType::Other`]
/// maps to a `<low>/<empty>` keyword pair; waste types are intentionally
/// never reported (inconsistent across vendors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyType {
    /// `toner-low-report` / `toner-empty-warning`.
    Toner,
    /// ink or wax types: `marker-supply-low-report` / `marker-supply-empty-warning`.
    InkOrWax,
    /// `developer-low-report` / `developer-empty-warning`.
    Developer,
    /// opc, fuser, transfer, corona: `opc-near-eol-report` / `opc-life-over-warning`.
    OpcFuserTransferCorona,
    /// cleaner or fuser-pad: `cleaner-life-almost-over-report` / `cleaner-life-over-warning`.
    CleanerOrFuserPad,
    Waste,
    Other,
}

impl SupplyType {
    /// Map a `prtMarkerSuppliesType` MIB enumeration value (RFC 3805) to a
    /// supply type family. Unmapped values fall back to [`SupplyType::Other`].
    pub fn from_mib_type(value: i32) -> Self {
        match value {
            3 => SupplyType::Toner,                    // toner
            4 => SupplyType::Waste,                    // wasteToner
            5 => SupplyType::InkOrWax,                 // ink
            6 => SupplyType::InkOrWax,                 // inkCartridge
            7 => SupplyType::InkOrWax,                 // inkRibbon
            8 => SupplyType::Waste,                    // wasteInk
            9 => SupplyType::OpcFuserTransferCorona,   // opc
            10 => SupplyType::Developer,                // developer
            11 => SupplyType::Other,                    // fuserOil: no keyword in the low/empty switch
            12 => SupplyType::InkOrWax,                 // solidWax
            13 => SupplyType::InkOrWax,                 // ribbonWax
            14 => SupplyType::Waste,                    // wasteWax
            15 => SupplyType::OpcFuserTransferCorona,  // fuser
            16 => SupplyType::OpcFuserTransferCorona,  // coronaWire
            17 => SupplyType::Other,                    // fuserOilWick: no keyword in the low/empty switch
            18 => SupplyType::CleanerOrFuserPad,        // cleanerUnit
            19 => SupplyType::CleanerOrFuserPad,        // fuserCleaningPad
            20 => SupplyType::OpcFuserTransferCorona,  // transferUnit
            21 => SupplyType::Toner,                    // tonerCartridge
            22 => SupplyType::Other,                    // fuserOiler: no keyword in the low/empty switch
            1 => SupplyType::Other,                     // other
            _ => SupplyType::Other,
        }
    }
}

/// One row of the `prtMarkerSuppliesTable`.
#[derive(Debug, Clone)]
pub struct SupplyDescriptor {
    pub name: String,
    pub color: String,
    pub colorant: i32,
    pub class: SupplyClass,
    pub supply_type: SupplyType,
    pub max_capacity: i32,
    pub level: i32,
}

impl SupplyDescriptor {
    pub fn empty() -> Self {
        SupplyDescriptor {
            name: String::new(),
            color: "none".to_string(),
            colorant: 0,
            class: SupplyClass::Unknown,
            supply_type: SupplyType::Other,
            max_capacity: 0,
            level: -1,
        }
    }
}

/// Maximum number of supplies tracked for a single device, mirroring the
/// fixed-size supply table used by the original MIB walker.
pub const MAX_SUPPLIES: usize = 32;

/// A discovered or manually-added printer ready for reporting.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub class: &'static str,
    pub uri: String,
    pub make_and_model: String,
    pub info: String,
    pub device_id: String,
    pub location: String,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    /// Format the canonical discovery report line emitted on stdout.
    ///
    /// `<class> <uri> "<make-and-model>" "<info>" "<device-id>" "<location>"`
    pub fn report_line(&self) -> String {
        format!(
            "{} {} \"{}\" \"{}\" \"{}\" \"{}\"",
            self.class, self.uri, self.make_and_model, self.info, self.device_id, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_ordinal_orders_ipp_before_appsocket() {
        assert!(DeviceType::Ipp.ordinal() < DeviceType::AppSocket.ordinal());
    }

    #[test]
    fn unknown_registration_type_becomes_riousbprint() {
        assert_eq!(
            DeviceType::from_registration_type("_weird._tcp"),
            DeviceType::Riousbprint
        );
    }

    #[test]
    fn catalog_key_is_case_insensitive_on_name() {
        let a = DeviceRecord::new("Printer", "local.", DeviceType::Ipp);
        let b = DeviceRecord::new("PRINTER", "local.", DeviceType::Ipp);
        assert_eq!(a.catalog_key(), b.catalog_key());
    }

    #[test]
    fn supply_type_families_from_mib() {
        assert_eq!(SupplyType::from_mib_type(3), SupplyType::Toner);
        assert_eq!(SupplyType::from_mib_type(4), SupplyType::Waste);
        assert_eq!(SupplyType::from_mib_type(18), SupplyType::CleanerOrFuserPad);
        assert_eq!(SupplyType::from_mib_type(999), SupplyType::Other);
    }
}
