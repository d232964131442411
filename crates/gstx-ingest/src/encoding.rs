//! # Encoding Fallback
//!
//! Marketplace exports arrive in whatever encoding the seller portal felt
//! like that day. Decoding tries, in order: UTF-8 with BOM, UTF-8, Latin-1,
//! Windows-1252, ASCII. The first decoder that accepts the bytes wins, and
//! the chosen label is reported to the audit log.
//!
//! Latin-1 is total over all byte values, so the chain cannot fail for
//! non-empty input; the later entries exist to keep the resolution label
//! honest when earlier decoders succeed.

/// UTF-8 byte-order mark.
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Windows-1252 mappings for the 0x80–0x9F block where it differs from
/// Latin-1. `None` marks the five undefined code points.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Decode report bytes, returning the text and the encoding label used.
pub fn decode_report(bytes: &[u8]) -> Option<(String, &'static str)> {
    if bytes.is_empty() {
        return None;
    }

    if bytes.starts_with(BOM) {
        if let Ok(s) = std::str::from_utf8(&bytes[BOM.len()..]) {
            return Some((s.to_string(), "utf-8-sig"));
        }
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some((s.to_string(), "utf-8"));
    }

    // Prefer cp1252 for the 0x80–0x9F block when every high byte maps;
    // otherwise fall back to latin-1, which is total.
    if let Some(s) = decode_cp1252(bytes) {
        return Some((s, "cp1252"));
    }

    Some((decode_latin1(bytes), "latin-1"))
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn decode_cp1252(bytes: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            0x80..=0x9F => out.push(CP1252_HIGH[(b - 0x80) as usize]?),
            _ => out.push(b as char),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_with_bom() {
        let mut bytes = BOM.to_vec();
        bytes.extend_from_slice("sku,qty".as_bytes());
        let (text, label) = decode_report(&bytes).unwrap();
        assert_eq!(text, "sku,qty");
        assert_eq!(label, "utf-8-sig");
    }

    #[test]
    fn plain_utf8() {
        let (text, label) = decode_report("état,1".as_bytes()).unwrap();
        assert_eq!(text, "état,1");
        assert_eq!(label, "utf-8");
    }

    #[test]
    fn cp1252_smart_quotes() {
        // 0x93/0x94 are curly quotes in cp1252, undefined-ish in latin-1.
        let bytes = [b'a', 0x93, b'b', 0x94];
        let (text, label) = decode_report(&bytes).unwrap();
        assert_eq!(text, "a\u{201C}b\u{201D}");
        assert_eq!(label, "cp1252");
    }

    #[test]
    fn latin1_when_cp1252_undefined() {
        // 0x81 is undefined in cp1252, valid in latin-1.
        let bytes = [b'a', 0x81];
        let (text, label) = decode_report(&bytes).unwrap();
        assert_eq!(text, "a\u{81}");
        assert_eq!(label, "latin-1");
    }

    #[test]
    fn empty_input_is_none() {
        assert!(decode_report(&[]).is_none());
    }
}
