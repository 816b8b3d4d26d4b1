// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Character-set-aware decoding for Printer MIB strings (§4.5, "Character-set
// decoding"). `prtLocalizationCharacterSet` returns an IANA-registry integer;
// everything downstream dispatches on it to pick a decoder for
// `prtMarkerSuppliesDescription` and the device-description string.

use encoding_rs::SHIFT_JIS;

/// IANA character-set codes the Printer MIB is known to report. `Unknown`
/// covers any value CUPS itself didn't special-case, which falls back to an
/// ASCII-safe passthrough rather than a guessed decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSet {
    Ascii,
    Utf8,
    UnicodeAscii,
    IsoLatin1,
    UnicodeLatin1,
    ShiftJis,
    Windows31J,
    Ucs4,
    Utf32,
    Utf32Be,
    Utf32Le,
    Unicode,
    Utf16Be,
    Utf16Le,
    Unknown,
}

impl CharSet {
    /// Map a `prtLocalizationCharacterSet` integer to a [`CharSet`], per the
    /// IANA character-set registry values CUPS special-cases.
    pub fn from_mib_value(value: i64) -> Self {
        match value {
            3 => CharSet::Ascii,
            4 => CharSet::IsoLatin1,
            17 => CharSet::ShiftJis,
            106 => CharSet::Utf8,
            1000 => CharSet::Unicode,
            1001 => CharSet::Ucs4,
            1002 => CharSet::UnicodeAscii,
            1003 => CharSet::UnicodeLatin1,
            1013 => CharSet::Utf16Be,
            1014 => CharSet::Utf16Le,
            1017 => CharSet::Utf32,
            1018 => CharSet::Utf32Be,
            1019 => CharSet::Utf32Le,
            2024 => CharSet::Windows31J,
            _ => CharSet::Unknown,
        }
    }
}

/// Decode a raw Printer MIB octet string into UTF-8 per the character set in
/// effect for the device (§4.5).
pub fn decode(bytes: &[u8], charset: CharSet) -> String {
    match charset {
        CharSet::Ascii | CharSet::Utf8 | CharSet::UnicodeAscii => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        CharSet::IsoLatin1 | CharSet::UnicodeLatin1 => {
            bytes.iter().map(|&b| b as char).collect()
        }
        CharSet::ShiftJis | CharSet::Windows31J => {
            let (text, _, _) = SHIFT_JIS.decode(bytes);
            text.into_owned()
        }
        CharSet::Ucs4 | CharSet::Utf32 | CharSet::Utf32Be => utf32_to_utf8(bytes, false),
        CharSet::Utf32Le => utf32_to_utf8(bytes, true),
        CharSet::Unicode | CharSet::Utf16Be => utf16_to_utf8(bytes, false),
        CharSet::Utf16Le => utf16_to_utf8(bytes, true),
        CharSet::Unknown => ascii_safe_passthrough(bytes),
    }
}

/// UTF-32 (any endianness) to UTF-8, four bytes per code point.
fn utf32_to_utf8(bytes: &[u8], little_endian: bool) -> String {
    let mut out = String::new();
    for chunk in bytes.chunks_exact(4) {
        let code = if little_endian {
            u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        } else {
            u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        };
        if let Some(c) = char::from_u32(code) {
            out.push(c);
        }
    }
    out
}

/// UTF-16 (either endianness) to UTF-8, composing surrogate pairs per the
/// `utf16_to_utf8` algorithm in `snmp-supplies.c` (§10.5).
fn utf16_to_utf8(bytes: &[u8], little_endian: bool) -> String {
    let mut units = Vec::with_capacity(bytes.len() / 2);
    let mut chunks = bytes.chunks_exact(2);
    for chunk in &mut chunks {
        let unit = if little_endian {
            u16::from_le_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], chunk[1]])
        };
        units.push(unit);
    }

    let mut out = String::new();
    let mut i = 0;
    while i < units.len() {
        let high = units[i];
        if (0xd800..=0xdbff).contains(&high) && i + 1 < units.len() {
            let low = units[i + 1];
            if (0xdc00..=0xdfff).contains(&low) {
                let code = (((high as u32) & 0x3ff) << 10 | ((low as u32) & 0x3ff)) + 0x10000;
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                }
                i += 2;
                continue;
            }
        }
        if let Some(c) = char::from_u32(high as u32) {
            out.push(c);
        }
        i += 1;
    }
    out
}

/// Unknown-charset fallback: copy bytes that look like printable ASCII,
/// replace anything with the high bit set, a control byte, or DEL with `?`.
/// Tab, carriage return, and newline are allowed whitespace.
fn ascii_safe_passthrough(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b & 0x80 != 0 || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\r' && b != b'\n') {
                '?'
            } else {
                b as char
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_copied_verbatim() {
        assert_eq!(decode(b"Black Toner", CharSet::Ascii), "Black Toner");
    }

    #[test]
    fn iso_8859_1_high_bytes_map_to_latin1_code_points() {
        // 0xE9 in Latin-1 is U+00E9 (e acute).
        assert_eq!(decode(&[0x63, 0x61, 0x66, 0xE9], CharSet::IsoLatin1), "café");
    }

    #[test]
    fn unknown_charset_replaces_high_bit_and_control_bytes() {
        assert_eq!(decode(&[b'O', b'K', 0xFF, 0x01], CharSet::Unknown), "OK??");
    }

    #[test]
    fn unknown_charset_preserves_allowed_whitespace() {
        assert_eq!(decode(b"a\tb", CharSet::Unknown), "a\tb");
    }

    #[test]
    fn utf16_be_basic_multilingual_plane_round_trips() {
        // "Hi" as UTF-16BE.
        let bytes = [0x00, b'H', 0x00, b'i'];
        assert_eq!(decode(&bytes, CharSet::Utf16Be), "Hi");
    }

    #[test]
    fn utf16_surrogate_pair_composes_to_one_code_point() {
        // U+1F600 (grinning face) as a UTF-16BE surrogate pair.
        let bytes = [0xD8, 0x3D, 0xDE, 0x00];
        let decoded = decode(&bytes, CharSet::Utf16Be);
        assert_eq!(decoded.chars().count(), 1);
        assert_eq!(decoded.chars().next(), char::from_u32(0x1F600));
    }

    #[test]
    fn utf32_le_round_trips_ascii() {
        let bytes = [b'O', 0, 0, 0, b'K', 0, 0, 0];
        assert_eq!(decode(&bytes, CharSet::Utf32Le), "OK");
    }

    #[test]
    fn mib_value_mapping_recognizes_known_codes() {
        assert_eq!(CharSet::from_mib_value(106), CharSet::Utf8);
        assert_eq!(CharSet::from_mib_value(1014), CharSet::Utf16Le);
        assert_eq!(CharSet::from_mib_value(999999), CharSet::Unknown);
    }
}
