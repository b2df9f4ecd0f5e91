//! Biomarker name matching against the catalog.
//!
//! Precedence, first hit wins: exact name, exact alias, then a fixed table
//! of medical synonym groups checked by whole-token containment in both
//! directions. No fuzzy matching: ambiguous partial overlaps outside the
//! synonym table are a no-match, favoring precision over recall.

use crate::models::{Biomarker, Severity};

/// Synonym groups. A group matches when the extracted name contains one
/// member as a whole token (or vice versa) and the catalog name does the
/// same for any member of the group. Token boundaries matter: short
/// abbreviations like "ast" must not hit inside words like "fasting".
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["vitamin d", "25-oh-d", "25-hydroxyvitamin", "cholecalciferol"],
    &["tsh", "thyroid stimulating hormone", "thyrotropin"],
    &["hba1c", "a1c", "hemoglobin a1c", "glycated hemoglobin"],
    &["ldl", "low-density lipoprotein"],
    &["hdl", "high-density lipoprotein"],
    &["crp", "c-reactive protein"],
    &["vitamin b12", "b12", "cobalamin"],
    &["ferritin", "serum ferritin"],
    &["triglycerides", "trigs"],
    &["alt", "alanine aminotransferase", "sgpt"],
    &["ast", "aspartate aminotransferase", "sgot"],
];

/// `needle` occurs in `haystack` with non-alphanumeric characters (or the
/// string ends) on both sides. Group members are all ASCII.
fn contains_token(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let left_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let right_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
        from = end;
    }
    false
}

fn token_either_way(name: &str, member: &str) -> bool {
    contains_token(name, member) || contains_token(member, name)
}

fn synonym_match(extracted: &str, catalog_name: &str) -> bool {
    for group in SYNONYM_GROUPS {
        let hits_extracted = group.iter().any(|s| token_either_way(extracted, s));
        let hits_catalog = group.iter().any(|s| token_either_way(catalog_name, s));
        if hits_extracted && hits_catalog {
            return true;
        }
    }
    false
}

/// Match an extracted biomarker name to a catalog entry.
pub fn match_reading<'a>(extracted_name: &str, catalog: &'a [Biomarker]) -> Option<&'a Biomarker> {
    let needle = extracted_name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    // 1. Case-insensitive exact name match.
    if let Some(hit) = catalog.iter().find(|b| b.name.to_lowercase() == needle) {
        return Some(hit);
    }

    // 2. Case-insensitive exact alias match.
    if let Some(hit) = catalog
        .iter()
        .find(|b| b.aliases.iter().any(|a| a.to_lowercase() == needle))
    {
        return Some(hit);
    }

    // 3. Medical synonym table.
    catalog
        .iter()
        .find(|b| synonym_match(&needle, &b.name.to_lowercase()))
}

/// Classify a reading against the catalog entry's ranges.
pub fn classify_severity(value: f64, entry: Option<&Biomarker>) -> Severity {
    let Some(entry) = entry else {
        return Severity::Normal;
    };

    if let (Some(min), Some(max)) = (entry.conventional_min, entry.conventional_max) {
        let span = (max - min).abs();
        if value < min || value > max {
            let overshoot = if value < min { min - value } else { value - max };
            if span > 0.0 && overshoot > span * 0.5 {
                return Severity::Critical;
            }
            return Severity::Abnormal;
        }
    }

    if let (Some(min), Some(max)) = (entry.optimal_min, entry.optimal_max) {
        if value < min || value > max {
            return Severity::Borderline;
        }
    }

    Severity::Normal
}
