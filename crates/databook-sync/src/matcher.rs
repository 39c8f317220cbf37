//! Entity Matcher: links doing-business registrants to vendors by exact
//! canonical-name equality. There is no fuzzy tier; unmatched registrants
//! stay unmatched.

use std::collections::HashMap;

use anyhow::{Context, Result};
use databook_storage::{RegistrantMatch, RelationalStore};
use serde::Serialize;
use tracing::{info, info_span, Instrument};

/// Confidence recorded for a canonical-exact match.
pub const EXACT_MATCH_SCORE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub registrants: usize,
    pub matched: usize,
}

/// Pure matching pass. `vendors` is `(supplier id, canonical name)` ordered by
/// supplier id, so the lowest id wins a shared canonical name.
pub fn match_registrants(
    vendors: &[(String, String)],
    registrants: &[(String, Option<String>)],
) -> Vec<RegistrantMatch> {
    let mut by_name: HashMap<&str, &str> = HashMap::with_capacity(vendors.len());
    for (supplier_id, canonical) in vendors {
        by_name.entry(canonical.as_str()).or_insert(supplier_id.as_str());
    }

    registrants
        .iter()
        .filter_map(|(organization_name, canonical)| {
            let vendor_id = by_name.get(canonical.as_deref()?)?;
            Some(RegistrantMatch {
                organization_name: organization_name.clone(),
                vendor_id: (*vendor_id).to_string(),
                score: EXACT_MATCH_SCORE,
            })
        })
        .collect()
}

/// Recompute every registrant match from scratch.
pub async fn run_entity_match(store: &RelationalStore) -> Result<MatchReport> {
    async {
        let vendors = store.vendor_canonical_names().await?;
        let registrants = store.registrant_names().await?;
        let matches = match_registrants(&vendors, &registrants);
        store
            .replace_registrant_matches(&matches)
            .await
            .context("writing registrant matches")?;
        let report = MatchReport {
            registrants: registrants.len(),
            matched: matches.len(),
        };
        info!(
            vendors = vendors.len(),
            registrants = report.registrants,
            matched = report.matched,
            "entity match complete"
        );
        Ok::<_, anyhow::Error>(report)
    }
    .instrument(info_span!("entity_match"))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn exact_canonical_names_match_and_lowest_id_wins() {
        let vendors = pairs(&[("S1", "ACMEWIDGETSINC"), ("S2", "HARBORLLC"), ("S3", "ACMEWIDGETSINC")]);
        let registrants = vec![
            ("Acme Widgets, Inc.".to_string(), Some("ACMEWIDGETSINC".to_string())),
            ("Harbor L.L.C.".to_string(), Some("HARBORLLC".to_string())),
            ("Acme Widgets".to_string(), Some("ACMEWIDGETS".to_string())),
            ("---".to_string(), None),
        ];
        let matches = match_registrants(&vendors, &registrants);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].vendor_id, "S1");
        assert_eq!(matches[0].score, EXACT_MATCH_SCORE);
        assert_eq!(matches[1].vendor_id, "S2");
    }

    #[tokio::test]
    async fn rerunning_recomputes_from_scratch() {
        use databook_core::{canonicalize_id, Registrant, Vendor};

        let dir = tempfile::tempdir().expect("tempdir");
        let store = RelationalStore::open(&dir.path().join("db.sqlite")).await.expect("open");
        let vendor = |id: &str, name: &str| Vendor {
            passport_supplier_id: id.into(),
            name: Some(name.into()),
            canonical_name: canonicalize_id(Some(name)),
            fms_vendor_code: None,
            duns_number: None,
            certification_type: None,
            ethnicity: None,
            business_category: None,
            corporate_structure: None,
        };
        store
            .insert_vendors(&[vendor("S2", "ACME WIDGETS INC"), vendor("S1", "Acme Widgets, Inc.")])
            .await
            .expect("vendors");
        store
            .insert_registrants(&[Registrant {
                organization_name: "ACME WIDGETS INC.".into(),
                canonical_name: canonicalize_id(Some("ACME WIDGETS INC.")),
                ownership_structure_code: None,
                organization_phone: None,
                start_date: None,
                matched_vendor_id: None,
                match_score: 0.0,
            }])
            .await
            .expect("registrants");

        let first = run_entity_match(&store).await.expect("first run");
        let second = run_entity_match(&store).await.expect("second run");
        assert_eq!(first, second);
        assert_eq!(first.matched, 1);
        let linked = store.registrant_for_vendor("S1").await.expect("lookup").expect("match");
        assert_eq!(linked.match_score, EXACT_MATCH_SCORE);
        assert!(store.registrant_for_vendor("S2").await.expect("lookup").is_none());
    }
}
