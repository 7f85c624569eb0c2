//! Text repair for column-fractured datasheet PDFs.
//!
//! PDF text extraction flattens multi-column spec tables into lines where
//! cell boundaries vanish (`Model NumberM1-1120-3`) and labels break across
//! column gutters (`Encl osure Size`). The repairs here are regex surgery
//! plus a label-prefix dictionary that restores the canonical spec labels.

use std::sync::LazyLock;

use regex::Regex;

/// Normalize extracted PDF text: unify dashes, drop NBSPs, collapse
/// horizontal whitespace runs, and preserve line structure.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.replace("\r\n", "\n").replace('\r', "\n").lines() {
        let mut cleaned = String::with_capacity(line.len());
        let mut last_space = false;
        for ch in line.chars() {
            let ch = match ch {
                '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
                '\u{00a0}' => ' ',
                other => other,
            };
            if ch == ' ' || ch == '\t' {
                if !last_space {
                    cleaned.push(' ');
                }
                last_space = true;
            } else {
                cleaned.push(ch);
                last_space = false;
            }
        }
        out.push_str(cleaned.trim_end());
        out.push('\n');
    }
    out
}

/// Model token in canonical hyphenated form (`M1-1120-3`).
pub static MODEL_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,3}\d?-\d{3,4}-\d\b").unwrap());

static FUSED_BEFORE_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9)\]])([A-Z]{1,3}\d?-\d{3,4}-\d\b)").unwrap());
static FUSED_UPPER_BEFORE_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{3,})([A-Z]\d?-\d{3,4}-\d\b)").unwrap());

/// Insert spaces where column collapse glued a label onto a model token.
///
/// `Model NumberM1-1120-3` → `Model Number M1-1120-3`, and the all-caps
/// header variant `MODEL NUMBERM1-1120-3` likewise.
#[must_use]
pub fn repair_columns(text: &str) -> String {
    let text = FUSED_BEFORE_MODEL_RE.replace_all(text, "$1 $2");
    FUSED_UPPER_BEFORE_MODEL_RE
        .replace_all(&text, "$1 $2")
        .into_owned()
}

/// Label-prefix repair dictionary.
///
/// Keys are the fragments a column break leaves at the start of a spec row;
/// values are the restored labels. Longest fragment wins, so `Nominal
/// Discharge` is matched before `Nomi`.
pub const LABEL_REPAIRS: &[(&str, &str)] = &[
    ("Nominal Discharge", "Nominal Discharge Current (In)"),
    ("Nomin al Discharge", "Nominal Discharge Current (In)"),
    ("Nomi", "Nominal AC Line Voltage (VRMS)"),
    ("Freq", "Frequency Range - USA/Euro Std"),
    ("Warr", "Warranty"),
    ("Encl osure Size", "Enclosure Size (HxWxD)"),
    ("Enclosure Size", "Enclosure Size (HxWxD)"),
    ("Oper ating Temp", "Operating Temperature"),
    ("Operating Temp", "Operating Temperature"),
    ("Humi", "Humidity Range"),
    ("Prot ection Modes", "Protection Modes"),
    ("Protection Modes", "Protection Modes"),
    ("MCOV", "MCOV (VRMS)"),
    ("VPR", "VPR (Voltage Protection Rating)"),
    ("SCCR", "SCCR (Short Circuit Current Rating)"),
    ("Max Surge", "Max Surge Current (per Phase)"),
    ("Conn ection", "Connection Type"),
    ("Connection", "Connection Type"),
    ("Mount", "Mounting"),
    ("Wire Size", "Wire Size"),
    ("Status Ind", "Status Indication"),
    ("Agen cy", "Agency Approvals"),
    ("Agency", "Agency Approvals"),
    ("Resp onse", "Response Time"),
    ("Response", "Response Time"),
    ("EMI", "EMI/RFI Filtering"),
    ("SPD Type", "SPD Type"),
    ("Weig", "Weight"),
    ("Ener gy", "Energy Rating (Joules)"),
    ("Energy", "Energy Rating (Joules)"),
    ("Ingr", "Ingress Protection Rating"),
    ("Alti", "Altitude Rating"),
];

static TWO_SPACE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z ()/%.,-]*?)\s{2,}(.+)$").unwrap());
static DIGIT_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z ()/%.,-]*[A-Za-z)])\s+(\d.+)$").unwrap());

/// Split one in-table line into a repaired label and the raw right-hand
/// column string. Returns `None` for lines with no recognizable label.
#[must_use]
pub fn split_spec_row(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // Dictionary first: longest fragment wins.
    let mut best: Option<(&str, &str)> = None;
    for (fragment, label) in LABEL_REPAIRS {
        if line.len() >= fragment.len()
            && line.is_char_boundary(fragment.len())
            && line[..fragment.len()].eq_ignore_ascii_case(fragment)
            && best.is_none_or(|(f, _)| fragment.len() > f.len())
        {
            best = Some((fragment, label));
        }
    }
    if let Some((fragment, label)) = best {
        let raw = line[fragment.len()..].trim_start_matches([':', '.']).trim();
        if !raw.is_empty() {
            return Some((label.to_string(), raw.to_string()));
        }
        return None;
    }

    // Fallbacks: a wide gutter gap, then the first numeric column.
    if let Some(caps) = TWO_SPACE_SPLIT_RE.captures(line) {
        return Some((
            caps[1].trim().trim_end_matches(':').to_string(),
            caps[2].trim().to_string(),
        ));
    }
    if let Some(caps) = DIGIT_SPLIT_RE.captures(line) {
        return Some((
            caps[1].trim().trim_end_matches(':').to_string(),
            caps[2].trim().to_string(),
        ));
    }
    None
}
