//! Canonical comparison keys and date/money normalization.
//!
//! Every function here is total: malformed input maps to a documented default
//! (`None` or `0.0`) instead of an error, so loaders never reject a row for a
//! bad money or date field.

use chrono::{Datelike, NaiveDate};

/// Tokens dropped from a vendor name before it is used as a wildcard stem.
const CORPORATE_SUFFIXES: &[&str] = &[
    "CORP",
    "CORPORATION",
    "INC",
    "INCORPORATED",
    "LLC",
    "LTD",
    "LLP",
    "CO",
    "COMPANY",
    "PC",
    "PLLC",
];

/// Uppercases and keeps only `[A-Z0-9]`. Missing input, or input with no
/// alphanumeric content, has no key.
pub fn canonicalize_id(raw: Option<&str>) -> Option<String> {
    let key = raw?
        .chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect::<String>();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// `"$12,345.67"` → `12345.67`. Anything unparseable is `0.0`.
pub fn canonicalize_money(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Reorders `M/D/YYYY` into `YYYY-MM-DD`, zero-padding month and day.
pub fn parse_date(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    let parts = raw.split('/').collect::<Vec<_>>();
    let [month, day, year] = parts.as_slice() else {
        return None;
    };
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !(numeric(month) && numeric(day) && numeric(year)) {
        return None;
    }
    Some(format!("{year}-{month:0>2}-{day:0>2}"))
}

/// NYC fiscal years start on July 1 and are named for the year they end in.
pub fn fiscal_year(date: NaiveDate) -> i32 {
    if date.month() >= 7 {
        date.year() + 1
    } else {
        date.year()
    }
}

/// Fiscal year of an ISO (`YYYY-MM-DD…`) or `MM/DD/YYYY` date string.
pub fn fiscal_year_of(raw: &str) -> Option<i32> {
    parse_any_date(raw).map(fiscal_year)
}

/// Sort key for dates from either source: ISO form, or `None` when the
/// value cannot be read as a date.
pub fn sortable_date(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if let Some(date) = parse_iso_prefix(raw) {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    parse_date(Some(raw))
}

/// Vendor name reduced for a contains-match: uppercased, with trailing
/// corporate suffix tokens and their punctuation cut off. The first word is
/// always kept, and the stem is a substring of the uppercased name.
pub fn wildcard_stem(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    let mut stem = trim_suffix_punctuation(&upper);
    while let Some(split) = stem.rfind(char::is_whitespace) {
        let last = trim_suffix_punctuation(&stem[split..]);
        if !CORPORATE_SUFFIXES.contains(&last) {
            break;
        }
        stem = trim_suffix_punctuation(&stem[..split]);
    }
    stem.to_string()
}

fn trim_suffix_punctuation(s: &str) -> &str {
    s.trim_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
}

fn parse_iso_prefix(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn parse_any_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    parse_iso_prefix(raw).or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ids_strip_separators_and_case() {
        assert_eq!(canonicalize_id(Some("ct1-856-20238801234")).as_deref(), Some("CT185620238801234"));
        assert_eq!(canonicalize_id(Some(" 858 26y1251 ")).as_deref(), Some("85826Y1251"));
        assert_eq!(canonicalize_id(Some("Acme Widgets, Inc.")).as_deref(), Some("ACMEWIDGETSINC"));
        assert_eq!(canonicalize_id(Some("")), None);
        assert_eq!(canonicalize_id(Some("--  ")), None);
        assert_eq!(canonicalize_id(None), None);
    }

    #[test]
    fn canonical_ids_are_idempotent_and_class_preserving() {
        let samples = ["CT1-8562-0238", "ct18562 0238", "a.b/c", "Über-Firma GmbH", "ß-1"];
        for raw in samples {
            let once = canonicalize_id(Some(raw));
            assert_eq!(canonicalize_id(once.as_deref()), once, "idempotence for {raw}");
        }
        assert_eq!(canonicalize_id(Some("CT1-8562-0238")), canonicalize_id(Some("ct18562 0238")));
    }

    #[test]
    fn money_is_lossy_but_total() {
        assert_eq!(canonicalize_money(Some("$12,345.67")), 12345.67);
        assert_eq!(canonicalize_money(Some("N/A")), 0.0);
        assert_eq!(canonicalize_money(None), 0.0);
        assert_eq!(canonicalize_money(Some("1.2.3")), 0.0);
        assert_eq!(canonicalize_money(Some("  500 ")), 500.0);
    }

    #[test]
    fn slash_dates_reorder_and_pad() {
        assert_eq!(parse_date(Some("03/07/2024")).as_deref(), Some("2024-03-07"));
        assert_eq!(parse_date(Some("3/7/2024")).as_deref(), Some("2024-03-07"));
        assert_eq!(parse_date(Some("invalid")), None);
        assert_eq!(parse_date(Some("2024-03-07")), None);
        assert_eq!(parse_date(Some("aa/bb/cccc")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn fiscal_year_rolls_over_on_july_first() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).expect("date");
        assert_eq!(fiscal_year(d(2024, 7, 1)), 2025);
        assert_eq!(fiscal_year(d(2024, 6, 30)), 2024);
        assert_eq!(fiscal_year_of("2024-07-01"), Some(2025));
        assert_eq!(fiscal_year_of("2024-06-30T10:00:00"), Some(2024));
        assert_eq!(fiscal_year_of("12/31/2021"), Some(2022));
        assert_eq!(fiscal_year_of("soon"), None);
    }

    #[test]
    fn sortable_dates_accept_both_sources() {
        assert_eq!(sortable_date(Some("07/01/2023")).as_deref(), Some("2023-07-01"));
        assert_eq!(sortable_date(Some("2023-07-01 00:00:00")).as_deref(), Some("2023-07-01"));
        assert_eq!(sortable_date(Some("")), None);
        assert_eq!(sortable_date(None), None);
    }

    #[test]
    fn wildcard_stem_drops_corporate_suffixes() {
        assert_eq!(wildcard_stem("Acme Widgets, Inc."), "ACME WIDGETS");
        assert_eq!(wildcard_stem("BIG APPLE CORP"), "BIG APPLE");
        assert_eq!(wildcard_stem("Acme Widgets Co., Inc."), "ACME WIDGETS");
        assert_eq!(wildcard_stem("Co"), "CO");
        assert_eq!(wildcard_stem("Inc. LLC"), "INC");
    }

    #[test]
    fn wildcard_stem_only_cuts_trailing_suffixes() {
        assert_eq!(wildcard_stem("Harbor Co. Builders LLC"), "HARBOR CO. BUILDERS");
        for name in [
            "Harbor Co. Builders LLC",
            "Acme Widgets, Inc.",
            "Acme,  Widgets Inc",
            " Big Apple Corp ",
            "PC Repair Company LLP",
        ] {
            let stem = wildcard_stem(name);
            assert!(!stem.is_empty());
            assert!(name.to_uppercase().contains(&stem), "{stem:?} not in {name:?}");
        }
    }
}
