//! Pure linking policies: solicitation base keys, contract/transaction merge
//! with provenance, and the notice link report.

use std::collections::{BTreeMap, HashSet};

use databook_core::{sortable_date, Contract, Provenance, Transaction};
use databook_storage::NoticeKeys;
use serde::Serialize;

/// Solicitation base EPINs are the first ten canonical characters.
pub const BASE_EPIN_LEN: usize = 10;

/// Fallback key for a contract EPIN with no exact solicitation match.
pub fn base_epin(canonical_epin: &str) -> Option<&str> {
    if canonical_epin.len() > BASE_EPIN_LEN {
        canonical_epin.get(..BASE_EPIN_LEN)
    } else {
        None
    }
}

/// Canonical contract keys that identify the same contract: equal, or one
/// contains the other.
pub fn contract_keys_overlap(a: &str, b: &str) -> bool {
    a == b || a.contains(b) || b.contains(a)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedContract {
    pub contract: Contract,
    pub provenance: Provenance,
}

/// Contract record built from the transactions that share one canonical
/// contract key. Dates are ISO; the amount is the sum of readable amounts.
pub fn synthesize_contract(canonical_key: &str, rows: &[&Transaction]) -> Contract {
    let dates = rows
        .iter()
        .filter_map(|tx| sortable_date(tx.issue_date.as_deref()))
        .collect::<Vec<_>>();
    let total = rows.iter().filter_map(|tx| tx.amount()).sum::<f64>();
    Contract {
        ctr_id: canonical_key.to_string(),
        contract_id: first_field(rows, |tx| tx.contract_id.as_ref()),
        canonical_contract_id: Some(canonical_key.to_string()),
        epin: None,
        canonical_epin: None,
        title: None,
        agency: first_field(rows, |tx| tx.agency.as_ref()),
        agency_id: None,
        vendor_name: first_field(rows, |tx| tx.payee_name.as_ref()),
        program: None,
        procurement_method: None,
        contract_type: None,
        status: None,
        award_amount: total,
        current_amount: total,
        start_date: dates.iter().min().cloned(),
        end_date: dates.iter().max().cloned(),
        industry: first_field(rows, |tx| tx.industry.as_ref()),
    }
}

fn first_field<'a>(
    rows: &[&'a Transaction],
    pick: impl Fn(&'a Transaction) -> Option<&'a String>,
) -> Option<String> {
    rows.iter().find_map(|tx| pick(*tx).cloned())
}

/// Merge relational contracts with the contracts seen in transactions.
///
/// A relational contract whose canonical id overlaps a transaction-side key
/// is upgraded to both-sources; transaction keys overlapping no relational
/// contract become synthetic second-source-only records. The result is sorted
/// by start date, newest first, undated last.
pub fn merge_contracts(relational: Vec<Contract>, transactions: &[Transaction]) -> Vec<MergedContract> {
    let mut by_key: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        if let Some(key) = tx.canonical_contract_id() {
            by_key.entry(key).or_default().push(tx);
        }
    }

    let mut claimed = HashSet::new();
    let mut merged = relational
        .into_iter()
        .map(|contract| {
            let mut provenance = Provenance::FirstSourceOnly;
            if let Some(own) = contract.canonical_contract_id.as_deref() {
                for key in by_key.keys() {
                    if contract_keys_overlap(own, key) {
                        provenance = Provenance::BothSources;
                        claimed.insert(key.clone());
                    }
                }
            }
            MergedContract { contract, provenance }
        })
        .collect::<Vec<_>>();

    for (key, rows) in &by_key {
        if !claimed.contains(key) {
            merged.push(MergedContract {
                contract: synthesize_contract(key, rows),
                provenance: Provenance::SecondSourceOnly,
            });
        }
    }

    merged.sort_by(|a, b| {
        let a = sortable_date(a.contract.start_date.as_deref());
        let b = sortable_date(b.contract.start_date.as_deref());
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    merged
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeLinkReport {
    pub notices: usize,
    pub solicitations: usize,
    pub contracts: usize,
    /// Solicitations whose canonical EPIN equals some notice PIN.
    pub solicitations_matched: usize,
    /// Contracts whose canonical EPIN equals some notice PIN.
    pub contracts_matched: usize,
    /// Notices with no exact solicitation match whose PIN contains, or is
    /// contained in, some solicitation EPIN. Candidates only; never a link.
    pub partial_overlap_candidates: usize,
    /// Keys shared by a notice and a solicitation, in notice order.
    pub samples: Vec<String>,
}

pub fn notice_link_report(keys: &NoticeKeys, sample_limit: usize) -> NoticeLinkReport {
    let pins = keys.notice_pins.iter().map(String::as_str).collect::<HashSet<_>>();
    let epins = keys
        .solicitation_epins
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>();

    let solicitations_matched = keys
        .solicitation_epins
        .iter()
        .filter(|e| pins.contains(e.as_str()))
        .count();
    let contracts_matched = keys
        .contract_epins
        .iter()
        .filter(|e| pins.contains(e.as_str()))
        .count();
    let partial_overlap_candidates = keys
        .notice_pins
        .iter()
        .filter(|pin| !epins.contains(pin.as_str()))
        .filter(|pin| {
            keys.solicitation_epins
                .iter()
                .any(|epin| epin.contains(pin.as_str()) || pin.contains(epin.as_str()))
        })
        .count();
    let samples = keys
        .notice_pins
        .iter()
        .filter(|pin| epins.contains(pin.as_str()))
        .take(sample_limit)
        .cloned()
        .collect();

    NoticeLinkReport {
        notices: keys.notice_pins.len(),
        solicitations: keys.solicitation_epins.len(),
        contracts: keys.contract_epins.len(),
        solicitations_matched,
        contracts_matched,
        partial_overlap_candidates,
        samples,
    }
}
