use std::path::{Path, PathBuf};

use databook_adapters::{
    contract_from_record, notice_from_record, parse_spending_response, read_extract,
    vendor_from_record, DatasetKind,
};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

#[test]
fn spending_fixture_parses_into_transactions() {
    let xml = std::fs::read(fixtures().join("checkbook/spending_page.xml")).expect("fixture");
    let page = parse_spending_response(&xml).expect("parse");
    assert_eq!(page.total_records, 41237);
    assert_eq!(page.transactions.len(), 3);

    let first = &page.transactions[0];
    assert_eq!(first.partition_year(), Some(2025));
    assert_eq!(first.canonical_contract_id().as_deref(), Some("CT182720248801234"));
    assert_eq!(first.associated_prime_vendor, None);
    assert_eq!(page.transactions[2].amount(), None);
}

#[test]
fn every_extract_fixture_has_its_key_column() {
    for kind in DatasetKind::ALL {
        let path = fixtures().join("extracts").join(kind.default_file());
        let extract = read_extract(&path, kind.key_column())
            .unwrap_or_else(|e| panic!("{kind}: {e}"));
        assert!(!extract.is_empty(), "{kind} fixture is empty");
    }
}

#[test]
fn keyless_rows_in_fixtures_are_dropped_by_mappers() {
    let vendors = read_extract(
        &fixtures().join("extracts/vendor_data.csv"),
        DatasetKind::Vendors.key_column(),
    )
    .expect("vendors");
    let mapped = vendors.records.iter().filter_map(vendor_from_record).count();
    assert_eq!(vendors.len(), 4);
    assert_eq!(mapped, 3);

    let contracts = read_extract(
        &fixtures().join("extracts/contracts_data.csv"),
        DatasetKind::Contracts.key_column(),
    )
    .expect("contracts");
    let mapped = contracts
        .records
        .iter()
        .filter_map(contract_from_record)
        .collect::<Vec<_>>();
    assert_eq!(mapped.len(), 2);
    assert_eq!(mapped[0].award_amount, 250_000.0);
    assert_eq!(mapped[1].current_amount, 0.0);

    let notices = read_extract(
        &fixtures().join("extracts/crol_data.csv"),
        DatasetKind::PublicNotices.key_column(),
    )
    .expect("notices");
    assert_eq!(notices.records.iter().filter_map(notice_from_record).count(), 6);
}
