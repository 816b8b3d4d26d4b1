// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend wire-format output: the `STATE:`/`ATTR:`/`DEBUG:`/`INFO:`/`ERROR:`
// lines a spooler parses from stderr, and the `network`/`direct` discovery
// lines on stdout. These are a wire protocol, not a logging concern (§10.1)
// — they bypass `tracing` and go straight to the process's own stdout/stderr.

use std::io::Write;

/// Emit one discovery report line on stdout:
/// `<class> <uri> "<make-and-model>" "<info>" "<device-id>" "<location>"`.
pub fn report_device(
    class: &str,
    uri: &str,
    make_and_model: &str,
    info: &str,
    device_id: &str,
    location: &str,
) {
    println!(
        "{class} {uri} \"{make_and_model}\" \"{info}\" \"{device_id}\" \"{location}\""
    );
    let _ = std::io::stdout().flush();
}

/// Emit a `STATE: +keyword` or `STATE: -keyword` transition line on stderr.
pub fn state(sign: char, keyword: &str) {
    eprintln!("STATE: {sign}{keyword}");
    let _ = std::io::stderr().flush();
}

/// Emit a `STATE:` line carrying several keywords with the same sign in one
/// shot, space-separated, matching the original backend's batched form.
pub fn state_many(sign: char, keywords: &[&str]) {
    if keywords.is_empty() {
        return;
    }
    let joined = keywords
        .iter()
        .map(|k| format!("{sign}{k}"))
        .collect::<Vec<_>>()
        .join(" ");
    eprintln!("STATE: {joined}");
    let _ = std::io::stderr().flush();
}

pub fn debug_line(msg: &str) {
    eprintln!("DEBUG: {msg}");
}

pub fn info_line(msg: &str) {
    eprintln!("INFO: {msg}");
}

pub fn error_line(msg: &str) {
    eprintln!("ERROR: {msg}");
    let _ = std::io::stderr().flush();
}

/// `ATTR: marker-levels=<csv>`.
pub fn attr_marker_levels(levels: &[i32]) {
    let csv = levels
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    eprintln!("ATTR: marker-levels={csv}");
}

/// `ATTR: marker-colors=<csv>`.
pub fn attr_marker_colors(colors: &[String]) {
    eprintln!("ATTR: marker-colors={}", colors.join(","));
}

/// `ATTR: marker-types=<csv>`.
pub fn attr_marker_types(types: &[String]) {
    eprintln!("ATTR: marker-types={}", types.join(","));
}

/// `ATTR: marker-names='"name1"' '"name2"'...` — doubled quoting, since the
/// attribute syntax wants single-quoted strings that themselves contain
/// double-quoted tokens (§6). Backslashes, double quotes, and single quotes
/// inside a name are escaped with a leading backslash.
pub fn attr_marker_names(names: &[String]) {
    let parts: Vec<String> = names
        .iter()
        .map(|n| format!("'\"{}\"'", escape_marker_name(n)))
        .collect();
    eprintln!("ATTR: marker-names={}", parts.join(","));
}

fn escape_marker_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '\\' || c == '"' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_marker_name_escapes_quotes_and_backslash() {
        assert_eq!(escape_marker_name(r#"Black "K" Toner"#), r#"Black \"K\" Toner"#);
        assert_eq!(escape_marker_name(r"back\slash"), r"back\\slash");
        assert_eq!(escape_marker_name("it's fine"), r"it\'s fine");
    }
}
