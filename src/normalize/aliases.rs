//! Spec-key alias table.
//!
//! Different sources name the same spec differently (`Voltage`,
//! `System Voltage`, a datasheet's `Nominal Ac Line Voltage Vrms`); the
//! merge collapses them onto one canonical key. The table is the config
//! surface: adding an alias is a one-line edit.
//!
//! Matching is insensitive to case and punctuation, and every canonical
//! form maps to itself, which makes `canonicalize` idempotent.

use std::collections::HashMap;
use std::sync::LazyLock;

/// alias → canonical key.
const ALIASES: &[(&str, &str)] = &[
    ("System Voltage", "Nominal AC Line Voltage (VRMS)"),
    ("Voltage", "Nominal AC Line Voltage (VRMS)"),
    ("Line Voltage", "Nominal AC Line Voltage (VRMS)"),
    ("Nominal Voltage", "Nominal AC Line Voltage (VRMS)"),
    ("Nominal Ac Line Voltage Vrms", "Nominal AC Line Voltage (VRMS)"),
    ("Frequency", "Frequency Range - USA/Euro Std"),
    ("Frequency Range", "Frequency Range - USA/Euro Std"),
    ("Freq Range", "Frequency Range - USA/Euro Std"),
    ("Warranty Period", "Warranty"),
    ("Enclosure", "Enclosure Size (HxWxD)"),
    ("Enclosure Dimensions", "Enclosure Size (HxWxD)"),
    ("Enclosure Size", "Enclosure Size (HxWxD)"),
    ("Dimensions", "Enclosure Size (HxWxD)"),
    ("Operating Temp", "Operating Temperature"),
    ("Temperature Range", "Operating Temperature"),
    ("Operating Temperature Range", "Operating Temperature"),
    ("Short Circuit Current Rating", "SCCR (Short Circuit Current Rating)"),
    ("Sccr", "SCCR (Short Circuit Current Rating)"),
    ("Mcov", "MCOV (VRMS)"),
    ("Mcov Vrms", "MCOV (VRMS)"),
    ("Max Continuous Operating Voltage", "MCOV (VRMS)"),
    ("Vpr", "VPR (Voltage Protection Rating)"),
    ("Voltage Protection Rating", "VPR (Voltage Protection Rating)"),
    ("Surge Current", "Max Surge Current (per Phase)"),
    ("Max Surge Current", "Max Surge Current (per Phase)"),
    ("Surge Current Capacity", "Max Surge Current (per Phase)"),
    ("Protection Mode", "Protection Modes"),
    ("Modes Of Protection", "Protection Modes"),
    ("Nominal Discharge Current", "Nominal Discharge Current (In)"),
    ("In Rating", "Nominal Discharge Current (In)"),
    ("Unit Weight", "Weight"),
    ("Net Weight", "Weight"),
    ("Remote Alarm Contacts", "Remote Alarm"),
    ("Agency Listings", "Agency Approvals"),
    ("Approvals", "Agency Approvals"),
    ("Certifications", "Agency Approvals"),
    ("Spd Type", "SPD Type"),
    ("Type", "SPD Type"),
    ("Connection", "Connection Type"),
    ("Wiring", "Connection Type"),
    ("Phases", "Phase"),
];

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

static ALIAS_LOOKUP: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    // Canonical forms map to themselves first so identity always wins.
    for (_, canonical) in ALIASES {
        map.insert(fold_key(canonical), *canonical);
    }
    for (alias, canonical) in ALIASES {
        map.entry(fold_key(alias)).or_insert(*canonical);
    }
    map
});

/// Collapse a spec key onto its canonical form. Unknown keys pass through
/// trimmed but otherwise untouched.
#[must_use]
pub fn canonicalize(key: &str) -> String {
    let trimmed = key.trim();
    match ALIAS_LOOKUP.get(&fold_key(trimmed)) {
        Some(canonical) => (*canonical).to_string(),
        None => trimmed.to_string(),
    }
}
