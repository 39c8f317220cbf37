pub(super) const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vendors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        passport_supplier_id TEXT NOT NULL UNIQUE,
        name TEXT,
        canonical_name TEXT,
        fms_vendor_code TEXT,
        duns_number TEXT,
        certification_type TEXT,
        ethnicity TEXT,
        business_category TEXT,
        corporate_structure TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS agencies (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS solicitations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        epin TEXT NOT NULL UNIQUE,
        canonical_epin TEXT,
        rfp_id TEXT,
        program TEXT,
        industry TEXT,
        procurement_name TEXT,
        agency TEXT,
        agency_id TEXT,
        rfx_status TEXT,
        release_date TEXT,
        due_date TEXT,
        main_commodity TEXT,
        procurement_method TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contracts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ctr_id TEXT NOT NULL UNIQUE,
        contract_id TEXT,
        canonical_contract_id TEXT,
        epin TEXT,
        canonical_epin TEXT,
        title TEXT,
        agency TEXT,
        agency_id TEXT,
        vendor_name TEXT,
        program TEXT,
        procurement_method TEXT,
        contract_type TEXT,
        status TEXT,
        award_amount REAL NOT NULL DEFAULT 0,
        current_amount REAL NOT NULL DEFAULT 0,
        start_date TEXT,
        end_date TEXT,
        industry TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS registrants (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        organization_name TEXT NOT NULL UNIQUE,
        canonical_name TEXT,
        ownership_structure_code TEXT,
        organization_phone TEXT,
        start_date TEXT,
        matched_vendor_id TEXT,
        match_score REAL NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS registrant_people (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_id TEXT NOT NULL UNIQUE,
        organization_name TEXT,
        canonical_org_name TEXT,
        first_name TEXT,
        last_name TEXT,
        relationship_code TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS public_notices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        request_id TEXT NOT NULL UNIQUE,
        pin TEXT NOT NULL,
        canonical_pin TEXT,
        start_date TEXT,
        end_date TEXT,
        agency_name TEXT,
        agency_id TEXT,
        type_of_notice TEXT,
        category TEXT,
        short_title TEXT,
        selection_method TEXT,
        section_name TEXT,
        due_date TEXT,
        contract_amount TEXT,
        vendor_name TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendor_entity_summary (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vendor_name TEXT NOT NULL UNIQUE,
        address_line_1 TEXT,
        address_line_2 TEXT,
        city TEXT,
        state TEXT,
        zip_code TEXT,
        country TEXT,
        telephone TEXT,
        stock_symbol TEXT,
        for_profit TEXT,
        duns_number TEXT,
        gross_revenue TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendor_other_names (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vendor_name TEXT NOT NULL,
        name_type TEXT,
        other_name TEXT,
        from_date TEXT,
        to_date TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendor_evaluations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vendor_name TEXT NOT NULL,
        agency TEXT,
        contract_id TEXT,
        purpose TEXT,
        evaluation_date TEXT,
        period_start TEXT,
        period_end TEXT,
        overall_rating TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendor_principals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vendor_name TEXT NOT NULL,
        principal_name TEXT,
        title TEXT,
        ownership_type TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vendor_related_entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        vendor_name TEXT NOT NULL,
        related_name TEXT,
        address_line_1 TEXT,
        address_line_2 TEXT,
        city TEXT,
        state TEXT,
        zip_code TEXT,
        country TEXT,
        telephone TEXT,
        relationship TEXT
    )
    "#,
    // The vendor reports have no single natural key. These composite keys
    // make re-loading insert-or-ignore; `ifnull` keeps blank cells from
    // counting as distinct.
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_vendor_other_names ON vendor_other_names \
     (vendor_name, ifnull(name_type, ''), ifnull(other_name, ''))",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_vendor_evaluations ON vendor_evaluations \
     (vendor_name, ifnull(contract_id, ''), ifnull(evaluation_date, ''))",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_vendor_principals ON vendor_principals \
     (vendor_name, ifnull(principal_name, ''), ifnull(title, ''))",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_vendor_related_entities ON vendor_related_entities \
     (vendor_name, ifnull(related_name, ''), ifnull(relationship, ''))",
];

/// `(index name, table, column)` for every canonical-key and free-text join column.
pub const LOOKUP_INDEXES: &[(&str, &str, &str)] = &[
    ("idx_vendors_name", "vendors", "name"),
    ("idx_vendors_canonical_name", "vendors", "canonical_name"),
    ("idx_solicitations_canonical_epin", "solicitations", "canonical_epin"),
    ("idx_contracts_vendor_name", "contracts", "vendor_name"),
    ("idx_contracts_canonical_contract_id", "contracts", "canonical_contract_id"),
    ("idx_contracts_canonical_epin", "contracts", "canonical_epin"),
    ("idx_registrants_canonical_name", "registrants", "canonical_name"),
    ("idx_registrants_matched_vendor_id", "registrants", "matched_vendor_id"),
    ("idx_people_canonical_org_name", "registrant_people", "canonical_org_name"),
    ("idx_notices_canonical_pin", "public_notices", "canonical_pin"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Vendors,
    Agencies,
    Solicitations,
    Contracts,
    Registrants,
    RegistrantPeople,
    PublicNotices,
    VendorEntitySummary,
    VendorOtherNames,
    VendorEvaluations,
    VendorPrincipals,
    VendorRelatedEntities,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Vendors => "vendors",
            Table::Agencies => "agencies",
            Table::Solicitations => "solicitations",
            Table::Contracts => "contracts",
            Table::Registrants => "registrants",
            Table::RegistrantPeople => "registrant_people",
            Table::PublicNotices => "public_notices",
            Table::VendorEntitySummary => "vendor_entity_summary",
            Table::VendorOtherNames => "vendor_other_names",
            Table::VendorEvaluations => "vendor_evaluations",
            Table::VendorPrincipals => "vendor_principals",
            Table::VendorRelatedEntities => "vendor_related_entities",
        }
    }
}
