//! # Indian State Tables
//!
//! Static lookup tables shared by the tax engine, invoice numbering, and
//! ledger resolution: full state name to two-letter abbreviation, and GSTIN
//! leading-digit pair to abbreviation.
//!
//! The 36-entry name table and 37-entry GSTIN table are the GST council's
//! published code sets; they change only when states merge or split.

/// Full state name (uppercase) to two-letter abbreviation.
pub const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("ANDHRA PRADESH", "AP"),
    ("ARUNACHAL PRADESH", "AR"),
    ("ASSAM", "AS"),
    ("BIHAR", "BR"),
    ("CHHATTISGARH", "CG"),
    ("GOA", "GA"),
    ("GUJARAT", "GJ"),
    ("HARYANA", "HR"),
    ("HIMACHAL PRADESH", "HP"),
    ("JHARKHAND", "JH"),
    ("KARNATAKA", "KA"),
    ("KERALA", "KL"),
    ("MADHYA PRADESH", "MP"),
    ("MAHARASHTRA", "MH"),
    ("MANIPUR", "MN"),
    ("MEGHALAYA", "ML"),
    ("MIZORAM", "MZ"),
    ("NAGALAND", "NL"),
    ("DELHI", "DL"),
    ("ODISHA", "OR"),
    ("PUNJAB", "PB"),
    ("RAJASTHAN", "RJ"),
    ("SIKKIM", "SK"),
    ("TAMIL NADU", "TN"),
    ("TELANGANA", "TG"),
    ("TRIPURA", "TR"),
    ("UTTAR PRADESH", "UP"),
    ("UTTARAKHAND", "UK"),
    ("WEST BENGAL", "WB"),
    ("JAMMU & KASHMIR", "JK"),
    ("LADAKH", "LA"),
    ("CHANDIGARH", "CH"),
    ("DADRA & NAGAR HAVELI", "DN"),
    ("DAMAN & DIU", "DD"),
    ("LAKSHADWEEP", "LD"),
    ("PUDUCHERRY", "PY"),
];

/// GSTIN leading digit pair to state abbreviation.
pub const GSTIN_STATE_CODES: &[(&str, &str)] = &[
    ("01", "JK"),
    ("02", "HP"),
    ("03", "PB"),
    ("04", "CH"),
    ("05", "UK"),
    ("06", "HR"),
    ("07", "DL"),
    ("08", "RJ"),
    ("09", "UP"),
    ("10", "BR"),
    ("11", "SK"),
    ("12", "AR"),
    ("13", "NL"),
    ("14", "MN"),
    ("15", "MZ"),
    ("16", "TR"),
    ("17", "ML"),
    ("18", "AS"),
    ("19", "WB"),
    ("20", "JH"),
    ("21", "OR"),
    ("22", "CG"),
    ("23", "MP"),
    ("24", "GJ"),
    ("25", "DD"),
    ("26", "DN"),
    ("27", "MH"),
    ("28", "AP"),
    ("29", "KA"),
    ("30", "GA"),
    ("31", "LD"),
    ("32", "KL"),
    ("33", "TN"),
    ("34", "PY"),
    ("35", "AN"),
    ("36", "TG"),
    ("37", "LA"),
];

/// Sentinel abbreviation for states the tables do not recognize.
pub const UNKNOWN_STATE: &str = "UN";

/// Resolve a state identifier (full name or abbreviation, any case) to a
/// two-letter abbreviation. Unknown input passes through uppercased when it
/// already looks like an abbreviation, else resolves to [`UNKNOWN_STATE`].
pub fn state_abbrev(state: &str) -> String {
    let upper = state.trim().to_uppercase();
    if let Some((_, abbrev)) = STATE_ABBREVIATIONS.iter().find(|(name, _)| *name == upper) {
        return (*abbrev).to_string();
    }
    if upper.len() == 2 && is_known_abbrev(&upper) {
        return upper;
    }
    if upper.len() == 2 {
        // Two-letter input that isn't in the code set passes through so the
        // LED-002 pass can flag it against the source value.
        return upper;
    }
    UNKNOWN_STATE.to_string()
}

/// Full state name for an abbreviation, title-cased for ledger labels.
pub fn state_name(abbrev: &str) -> Option<String> {
    let upper = abbrev.trim().to_uppercase();
    STATE_ABBREVIATIONS
        .iter()
        .find(|(_, a)| *a == upper)
        .map(|(name, _)| title_case(name))
}

/// Abbreviation for the state encoded in GSTIN leading digits.
pub fn abbrev_from_gstin_digits(digits: &str) -> &'static str {
    GSTIN_STATE_CODES
        .iter()
        .find(|(d, _)| *d == digits)
        .map(|(_, a)| *a)
        .unwrap_or(UNKNOWN_STATE)
}

/// Whether the abbreviation is in the recognized set.
pub fn is_known_abbrev(abbrev: &str) -> bool {
    let upper = abbrev.trim().to_uppercase();
    STATE_ABBREVIATIONS.iter().any(|(_, a)| *a == upper)
        || GSTIN_STATE_CODES.iter().any(|(_, a)| *a == upper)
}

fn title_case(upper: &str) -> String {
    upper
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_string() + chars.as_str().to_lowercase().as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
