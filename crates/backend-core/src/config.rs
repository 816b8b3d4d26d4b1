// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration for the print backend suite: a hand-written parser for the
// `snmp.conf` directive grammar, plus a small serde-based `RuntimeConfig` for
// crate-wide knobs that have no CUPS-file equivalent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// A `DeviceURI` match rule: regex against the make-and-model, with one or
/// more `%s`-templated URIs to emit when it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUriRule {
    pub pattern: String,
    pub templates: Vec<String>,
}

/// Parsed `snmp.conf` directives, as consumed by the SNMP discovery engine.
///
/// Defaults mirror §4.2: `Address @LOCAL`, `Community public`, `DebugLevel
/// 0`, `HostNameLookups off`, `MaxRunTime 120`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpConfig {
    pub addresses: Vec<String>,
    pub communities: Vec<String>,
    pub debug_level: u32,
    pub device_uri_rules: Vec<DeviceUriRule>,
    pub host_name_lookups: bool,
    pub max_run_time_secs: u64,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        SnmpConfig {
            addresses: vec!["@LOCAL".to_string()],
            communities: vec!["public".to_string()],
            debug_level: 0,
            device_uri_rules: Vec::new(),
            host_name_lookups: false,
            max_run_time_secs: 120,
        }
    }
}

impl SnmpConfig {
    /// Parse a `snmp.conf` file. Unknown keywords and malformed directives
    /// are logged and skipped, not fatal — per §7, configuration errors
    /// never abort startup.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse `snmp.conf` text directly. Directives given more than once are
    /// additive for `Address`/`Community`/`DeviceURI`, replacing for scalars.
    pub fn parse(text: &str) -> Self {
        // Address/Community only get their built-in defaults if the file
        // never mentions the directive at all.
        let mut cfg = SnmpConfig {
            addresses: Vec::new(),
            communities: Vec::new(),
            ..SnmpConfig::default()
        };

        for raw_line in text.lines() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before,
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let (keyword, rest) = match line.split_once(char::is_whitespace) {
                Some((k, r)) => (k, r.trim()),
                None => (line, ""),
            };
            match keyword {
                "Address" => cfg.addresses.push(rest.to_string()),
                "Community" => cfg.communities.push(rest.to_string()),
                "DebugLevel" => {
                    if let Ok(n) = rest.parse() {
                        cfg.debug_level = n;
                    } else {
                        tracing::warn!(line = raw_line, "snmp.conf: bad DebugLevel value");
                    }
                }
                "HostNameLookups" => cfg.host_name_lookups = rest.eq_ignore_ascii_case("on"),
                "MaxRunTime" => {
                    if let Ok(n) = rest.parse() {
                        cfg.max_run_time_secs = n;
                    } else {
                        tracing::warn!(line = raw_line, "snmp.conf: bad MaxRunTime value");
                    }
                }
                "DeviceURI" => match parse_device_uri_rule(rest) {
                    Some(rule) => cfg.device_uri_rules.push(rule),
                    None => tracing::warn!(line = raw_line, "snmp.conf: malformed DeviceURI"),
                },
                other => {
                    tracing::warn!(keyword = other, "snmp.conf: unknown directive, ignoring");
                }
            }
        }

        if cfg.addresses.is_empty() {
            cfg.addresses.push("@LOCAL".to_string());
        }
        if cfg.communities.is_empty() {
            cfg.communities.push("public".to_string());
        }

        if let Ok(level) = std::env::var("CUPS_DEBUG_LEVEL") {
            if let Ok(n) = level.parse() {
                cfg.debug_level = n;
            }
        }
        if let Ok(secs) = std::env::var("CUPS_MAX_RUN_TIME") {
            if let Ok(n) = secs.parse() {
                cfg.max_run_time_secs = n;
            }
        }

        cfg
    }
}

/// Parse a `DeviceURI "<regex>" <uri-template> [<uri-template>…]` value
/// (the keyword itself already stripped). The quoted string supports
/// backslash escaping of `"` and `\`.
fn parse_device_uri_rule(rest: &str) -> Option<DeviceUriRule> {
    let rest = rest.trim_start();
    if !rest.starts_with('"') {
        return None;
    }
    let mut chars = rest[1..].chars();
    let mut pattern = String::new();
    let mut closed = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    pattern.push(escaped);
                }
            }
            '"' => {
                closed = true;
                break;
            }
            _ => pattern.push(c),
        }
    }
    if !closed {
        return None;
    }
    let remainder: String = chars.collect();
    let templates: Vec<String> = remainder
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();
    if templates.is_empty() {
        return None;
    }
    Some(DeviceUriRule { pattern, templates })
}

/// Crate-wide knobs with no `snmp.conf` equivalent: cache directory
/// override and default poll interval. Additive to `SnmpConfig`, not a
/// replacement — loaded as JSON the way the original `AppConfig` was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Overrides `CUPS_CACHEDIR` when set.
    pub cache_dir: Option<String>,
    /// Supplies-walker poll interval, seconds. Default 5 (§4.3 point 9).
    pub poll_interval_secs: u64,
    /// `select`-equivalent timeout while bidi or side-channel is active.
    /// Default 5 (§4.3).
    pub loop_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            cache_dir: None,
            poll_interval_secs: 5,
            loop_timeout_secs: 5,
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| BackendError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_absent_values_given() {
        let cfg = SnmpConfig::parse("");
        assert_eq!(cfg.addresses, vec!["@LOCAL".to_string()]);
        assert_eq!(cfg.communities, vec!["public".to_string()]);
        assert_eq!(cfg.debug_level, 0);
        assert!(!cfg.host_name_lookups);
        assert_eq!(cfg.max_run_time_secs, 120);
    }

    #[test]
    fn parses_mixed_directives_and_comments() {
        let text = "\
            # a comment\n\
            Address 192.168.1.1\n\
            Address @IF(eth0)\n\
            Community public\n\
            Community private\n\
            DebugLevel 3\n\
            HostNameLookups on\n\
            MaxRunTime 60\n\
        ";
        let cfg = SnmpConfig::parse(text);
        assert_eq!(cfg.addresses, vec!["192.168.1.1", "@IF(eth0)"]);
        assert_eq!(cfg.communities, vec!["public", "private"]);
        assert_eq!(cfg.debug_level, 3);
        assert!(cfg.host_name_lookups);
        assert_eq!(cfg.max_run_time_secs, 60);
    }

    #[test]
    fn unknown_directive_is_ignored_not_fatal() {
        let cfg = SnmpConfig::parse("Bogus wat\nMaxRunTime 30\n");
        assert_eq!(cfg.max_run_time_secs, 30);
    }

    #[test]
    fn device_uri_rule_with_escaped_quote() {
        let cfg = SnmpConfig::parse(r#"DeviceURI "HP\"Color.*" socket://%s lpd://%s/"#);
        assert_eq!(cfg.device_uri_rules.len(), 1);
        let rule = &cfg.device_uri_rules[0];
        assert_eq!(rule.pattern, r#"HP"Color.*"#);
        assert_eq!(rule.templates, vec!["socket://%s", "lpd://%s/"]);
    }

    #[test]
    fn malformed_device_uri_is_dropped() {
        let cfg = SnmpConfig::parse("DeviceURI no-quote-here\n");
        assert!(cfg.device_uri_rules.is_empty());
    }
}
