// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The DNS-SD discovery catalog: deduplication, domain-upgrade, and the
// announcement-pass tie-break rules from §4.1.

use std::collections::HashMap;

use backend_core::types::{DeviceRecord, DeviceType};
use uuid::Uuid;

use crate::txt::TxtFields;

pub type CatalogKey = (String, DeviceType);

/// The discovery catalog plus the per-name "current best" tracker used by
/// the tie-break rules (§4.1, "Announcement pass").
#[derive(Default)]
pub struct Catalog {
    entries: HashMap<CatalogKey, DeviceRecord>,
    /// Insertion order, so `needs_txt_query` walks deterministically.
    order: Vec<CatalogKey>,
    /// Per-name (case-insensitive) pending "best" candidate awaiting a
    /// challenger before it is finally emitted.
    pending_best: HashMap<String, CatalogKey>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Handle a browse "added" event for `(name, type, domain)`. `is_local`
    /// is true when the event came from the local-only suppression browser.
    pub fn handle_add(&mut self, name: &str, device_type: DeviceType, domain: &str, is_local: bool) {
        let key = (name.to_lowercase(), device_type);
        match self.entries.get_mut(&key) {
            Some(rec) => {
                if rec.domain == "local." && domain != "local." {
                    rec.domain = domain.to_string();
                    rec.fullname = format!("{name}.{domain}");
                }
                if is_local {
                    rec.published = true;
                }
            }
            None => {
                let mut rec = DeviceRecord::new(name, domain, device_type);
                if is_local {
                    rec.published = true;
                }
                self.entries.insert(key.clone(), rec);
                self.order.push(key);
            }
        }
    }

    /// Handle a browse "removed" event. Entries already reported are left
    /// alone (invariant 3 — at most one report per triple, never retracted).
    pub fn handle_remove(&mut self, name: &str, device_type: DeviceType) {
        let key = (name.to_lowercase(), device_type);
        if let Some(rec) = self.entries.get_mut(&key) {
            if !rec.reported {
                rec.published = true; // suppress: never report a withdrawn service
            }
        }
    }

    /// Keys whose TXT query has neither started nor completed, oldest first.
    /// Caller is responsible for capping concurrent queries at 50 (§4.1).
    pub fn needs_txt_query(&self) -> Vec<CatalogKey> {
        self.order
            .iter()
            .filter(|k| {
                let rec = &self.entries[*k];
                !rec.reported && !rec.query_pending && !rec.resolved
            })
            .cloned()
            .collect()
    }

    pub fn start_txt_query(&mut self, key: &CatalogKey) {
        if let Some(rec) = self.entries.get_mut(key) {
            rec.query_pending = true;
        }
    }

    /// Record the result of a completed TXT query and fold it into the
    /// device record.
    pub fn complete_txt_query(&mut self, key: &CatalogKey, fields: TxtFields) {
        let Some(rec) = self.entries.get_mut(key) else {
            return;
        };
        rec.query_pending = false;
        rec.resolved = true;

        let make_and_model = match (&fields.make, &fields.model) {
            (Some(make), Some(model)) => Some(format!("{make} {model}")),
            (Some(make), None) => Some(make.clone()),
            (None, Some(model)) => Some(model.clone()),
            (None, None) => None,
        };
        if make_and_model.is_some() {
            rec.make_and_model = make_and_model;
        }
        if fields.device_id.is_some() {
            rec.device_id = fields.device_id;
        }
        if let Some(priority) = fields.priority {
            rec.priority = priority;
        }
        if fields.cups_shared {
            rec.shared = true;
        }
        if fields.suppress_lpd {
            rec.published = true;
        }
        if let Some(uuid_str) = fields.uuid {
            rec.uuid = Uuid::parse_str(&uuid_str).ok();
        }
    }

    /// Run one step of the announcement pass: suppress any newly-published
    /// entries, then fold any newly-resolved entry into the tie-break and
    /// return whichever record should be reported right now, if any.
    ///
    /// The DNS-SD engine should call this once per catalog key that just
    /// transitioned out of `query_pending` (or was marked published).
    pub fn announce_ready(&mut self) -> Vec<DeviceRecord> {
        let mut ready = Vec::new();

        // Suppressed (published) entries never enter tie-break.
        for key in self.order.clone() {
            let rec = &self.entries[&key];
            if rec.published && !rec.reported {
                self.entries.get_mut(&key).unwrap().reported = true;
            }
        }

        for key in self.order.clone() {
            let rec = self.entries[&key].clone();
            if rec.reported || rec.published || !rec.resolved {
                continue;
            }
            // Already queued for tie-break consideration? Skip re-entry.
            if self.pending_best.values().any(|k| *k == key) {
                continue;
            }
            if let Some(winner_key) = self.consider(key) {
                let winner = self.entries.get_mut(&winner_key).unwrap();
                winner.reported = true;
                ready.push(winner.clone());
            }
        }

        ready
    }

    /// Fold `key` into the per-name tie-break state. Returns the winning
    /// key if a decision was reached (i.e. a second candidate arrived).
    fn consider(&mut self, key: CatalogKey) -> Option<CatalogKey> {
        let name_key = self.entries[&key].name.to_lowercase();
        match self.pending_best.remove(&name_key) {
            None => {
                self.pending_best.insert(name_key, key);
                None
            }
            Some(prev_key) => {
                let (winner, new_best) = self.tie_break(prev_key, key);
                self.pending_best.insert(name_key, new_best);
                Some(winner)
            }
        }
    }

    /// §4.1 rules 3 & 4: different domains → first-seen wins; same domain →
    /// lower priority wins, ties broken by lower type ordinal.
    fn tie_break(&self, a_key: CatalogKey, b_key: CatalogKey) -> (CatalogKey, CatalogKey) {
        let a = &self.entries[&a_key];
        let b = &self.entries[&b_key];
        if a.domain != b.domain {
            return (a_key, b_key);
        }
        let a_wins = a.priority < b.priority
            || (a.priority == b.priority && a.device_type.ordinal() <= b.device_type.ordinal());
        if a_wins {
            (a_key, b_key)
        } else {
            (b_key, a_key)
        }
    }

    /// Flush any surviving per-name "best" candidates — called when no
    /// browsers remain active (§4.1 rule 5, process termination).
    pub fn flush_pending(&mut self) -> Vec<DeviceRecord> {
        let keys: Vec<CatalogKey> = self.pending_best.values().cloned().collect();
        self.pending_best.clear();
        let mut out = Vec::new();
        for key in keys {
            if let Some(rec) = self.entries.get_mut(&key) {
                if !rec.reported {
                    rec.reported = true;
                    out.push(rec.clone());
                }
            }
        }
        out
    }

    pub fn all_reported(&self) -> bool {
        self.entries.values().all(|r| r.reported)
    }

    #[cfg(test)]
    pub fn get(&self, key: &CatalogKey) -> Option<&DeviceRecord> {
        self.entries.get(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved_fields(make: &str, model: &str) -> TxtFields {
        TxtFields {
            make: Some(make.to_string()),
            model: Some(model.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn s1_two_browsers_same_name_local_suppressed() {
        let mut cat = Catalog::new();
        cat.handle_add("Printer", DeviceType::Ipp, "local.", true);
        cat.handle_add("Printer", DeviceType::Ipp, "local.", false);
        assert_eq!(cat.len(), 1);
        let ready = cat.announce_ready();
        assert!(ready.is_empty());
        let key = ("printer".to_string(), DeviceType::Ipp);
        assert!(cat.get(&key).unwrap().reported);
    }

    #[test]
    fn s2_priority_tie_break_favors_lower_ordinal() {
        let mut cat = Catalog::new();
        cat.handle_add("Printer", DeviceType::Ipp, "local.", false);
        cat.handle_add("Printer", DeviceType::AppSocket, "local.", false);

        let ipp_key = ("printer".to_string(), DeviceType::Ipp);
        let pdl_key = ("printer".to_string(), DeviceType::AppSocket);

        cat.complete_txt_query(&ipp_key, resolved_fields("HP", "LaserJet"));
        let ready = cat.announce_ready();
        assert!(ready.is_empty(), "first resolved candidate waits for a challenger");

        cat.complete_txt_query(&pdl_key, resolved_fields("HP", "LaserJet"));
        let ready = cat.announce_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].device_type, DeviceType::Ipp);
    }

    #[test]
    fn domain_upgrade_does_not_create_second_entry() {
        let mut cat = Catalog::new();
        cat.handle_add("Printer", DeviceType::Ipp, "local.", false);
        cat.handle_add("Printer", DeviceType::Ipp, "example.com.", false);
        assert_eq!(cat.len(), 1);
        let key = ("printer".to_string(), DeviceType::Ipp);
        assert_eq!(cat.get(&key).unwrap().domain, "example.com.");
    }

    #[test]
    fn different_type_creates_separate_entry() {
        let mut cat = Catalog::new();
        cat.handle_add("Printer", DeviceType::Ipp, "local.", false);
        cat.handle_add("Printer", DeviceType::Lpd, "local.", false);
        assert_eq!(cat.len(), 2);
    }

    #[test]
    fn never_reports_same_triple_twice() {
        let mut cat = Catalog::new();
        cat.handle_add("Printer", DeviceType::Ipp, "local.", false);
        let key = ("printer".to_string(), DeviceType::Ipp);
        cat.complete_txt_query(&key, resolved_fields("HP", "X"));
        let ready = cat.announce_ready();
        assert!(ready.is_empty());
        let flushed = cat.flush_pending();
        assert_eq!(flushed.len(), 1);
        // A second flush must not re-emit.
        let flushed_again = cat.flush_pending();
        assert!(flushed_again.is_empty());
    }
}
