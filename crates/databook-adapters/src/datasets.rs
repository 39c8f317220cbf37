//! Column mappings from the published extracts to typed records.

use std::fmt;

use databook_core::{
    canonicalize_id, canonicalize_money, Contract, PublicNotice, Registrant, RegistrantPerson,
    Solicitation, Vendor, VendorEntitySummary, VendorEvaluation, VendorOtherName, VendorPrincipal,
    VendorRelatedEntity,
};
use serde::{Deserialize, Serialize};

use crate::extract::SourceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Vendors,
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

impl DatasetKind {
    /// Load order: vendors first so the matcher and resolver see them, the
    /// name-keyed vendor reports last.
    pub const ALL: [DatasetKind; 11] = [
        DatasetKind::Vendors,
        DatasetKind::Solicitations,
        DatasetKind::Contracts,
        DatasetKind::Registrants,
        DatasetKind::RegistrantPeople,
        DatasetKind::PublicNotices,
        DatasetKind::VendorEntitySummary,
        DatasetKind::VendorOtherNames,
        DatasetKind::VendorEvaluations,
        DatasetKind::VendorPrincipals,
        DatasetKind::VendorRelatedEntities,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Vendors => "vendors",
            DatasetKind::Solicitations => "solicitations",
            DatasetKind::Contracts => "contracts",
            DatasetKind::Registrants => "registrants",
            DatasetKind::RegistrantPeople => "registrant_people",
            DatasetKind::PublicNotices => "public_notices",
            DatasetKind::VendorEntitySummary => "vendor_entity_summary",
            DatasetKind::VendorOtherNames => "vendor_other_names",
            DatasetKind::VendorEvaluations => "vendor_evaluations",
            DatasetKind::VendorPrincipals => "vendor_principals",
            DatasetKind::VendorRelatedEntities => "vendor_related_entities",
        }
    }

    /// Header of the column holding the natural key.
    pub fn key_column(self) -> &'static str {
        match self {
            DatasetKind::Vendors => "PASSPort Supplier-ID",
            DatasetKind::Solicitations => "EPIN",
            DatasetKind::Contracts => "CTR-ID",
            DatasetKind::Registrants => "organization_name",
            DatasetKind::RegistrantPeople => "mocs_peopleid",
            DatasetKind::PublicNotices => "RequestID",
            DatasetKind::VendorEntitySummary
            | DatasetKind::VendorOtherNames
            | DatasetKind::VendorEvaluations
            | DatasetKind::VendorPrincipals
            | DatasetKind::VendorRelatedEntities => VENDOR_NAME,
        }
    }

    pub fn default_file(self) -> &'static str {
        match self {
            DatasetKind::Vendors => "vendor_data.csv",
            DatasetKind::Solicitations => "solicitations_data.csv",
            DatasetKind::Contracts => "contracts_data.csv",
            DatasetKind::Registrants => "doing_business_entities.csv",
            DatasetKind::RegistrantPeople => "doing_business_people.csv",
            DatasetKind::PublicNotices => "crol_data.csv",
            DatasetKind::VendorEntitySummary => "passport_entity_summary.csv",
            DatasetKind::VendorOtherNames => "passport_other_names.csv",
            DatasetKind::VendorEvaluations => "passport_performance_evaluation.csv",
            DatasetKind::VendorPrincipals => "passport_principals.csv",
            DatasetKind::VendorRelatedEntities => "passport_related_entities.csv",
        }
    }
}

/// Name column shared by every PASSPort vendor report.
const VENDOR_NAME: &str = "Vendor Name";

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn vendor_from_record(rec: &SourceRecord) -> Option<Vendor> {
    let name = rec.get_owned("Vendor Name");
    Some(Vendor {
        passport_supplier_id: rec.get_owned(DatasetKind::Vendors.key_column())?,
        canonical_name: canonicalize_id(name.as_deref()),
        name,
        fms_vendor_code: rec.get_owned("FMS Vendor Code"),
        duns_number: rec.get_owned("DUNS Number"),
        certification_type: rec.get_owned("Certification Type"),
        ethnicity: rec.get_owned("Ethnicity"),
        business_category: rec.get_owned("Business Category"),
        corporate_structure: rec.get_owned("Corporate Structure"),
    })
}

pub fn solicitation_from_record(rec: &SourceRecord) -> Option<Solicitation> {
    let epin = rec.get_owned(DatasetKind::Solicitations.key_column())?;
    Some(Solicitation {
        canonical_epin: canonicalize_id(Some(&epin)),
        epin,
        rfp_id: rec.get_owned("RFP-ID"),
        program: rec.get_owned("Program"),
        industry: rec.get_owned("Industry"),
        procurement_name: rec.get_owned("Procurement Name"),
        agency: rec.get_owned("Agency"),
        agency_id: rec.get_owned("wegov-org-id"),
        rfx_status: rec.get_owned("RFx Status"),
        release_date: rec.get_owned("Release Date"),
        due_date: rec.get_owned("Due Date"),
        main_commodity: rec.get_owned("Main Commodity"),
        procurement_method: rec.get_owned("Procurement Method"),
    })
}

pub fn contract_from_record(rec: &SourceRecord) -> Option<Contract> {
    let contract_id = rec.get_owned("Contract ID");
    let epin = rec.get_owned("EPIN");
    Some(Contract {
        ctr_id: rec.get_owned(DatasetKind::Contracts.key_column())?,
        canonical_contract_id: canonicalize_id(contract_id.as_deref()),
        contract_id,
        canonical_epin: canonicalize_id(epin.as_deref()),
        epin,
        title: rec.get_owned("Contract Title"),
        agency: rec.get_owned("Agency"),
        agency_id: rec.get_owned("wegov-org-id"),
        vendor_name: rec.get_owned("Vendor"),
        program: rec.get_owned("Program"),
        procurement_method: rec.get_owned("Procurement Method"),
        contract_type: rec.get_owned("Contract Type"),
        status: rec.get_owned("Status"),
        award_amount: canonicalize_money(rec.get("Award Amount")),
        current_amount: canonicalize_money(rec.get("Current Contract Amount")),
        start_date: rec.get_owned("Contract Start Date"),
        end_date: rec.get_owned("Contract End Date"),
        industry: rec.get_owned("Industry"),
    })
}

pub fn registrant_from_record(rec: &SourceRecord) -> Option<Registrant> {
    let organization_name = rec.get_owned(DatasetKind::Registrants.key_column())?;
    Some(Registrant {
        canonical_name: canonicalize_id(Some(&organization_name)),
        organization_name,
        ownership_structure_code: rec.get_owned("ownership_structure_code"),
        organization_phone: rec.get_owned("organization_phone"),
        start_date: rec.get_owned("doing_business_start_date"),
        matched_vendor_id: None,
        match_score: 0.0,
    })
}

pub fn person_from_record(rec: &SourceRecord) -> Option<RegistrantPerson> {
    let organization_name = rec.get_owned("organization_name");
    Some(RegistrantPerson {
        person_id: rec.get_owned(DatasetKind::RegistrantPeople.key_column())?,
        canonical_org_name: canonicalize_id(organization_name.as_deref()),
        organization_name,
        first_name: rec.get_owned("person_name_first"),
        last_name: rec.get_owned("person_name_last"),
        relationship_code: rec.get_owned("relationship_type_code"),
    })
}

/// Maps a notice row without judging its PIN; PIN validation belongs to the loader.
pub fn notice_from_record(rec: &SourceRecord) -> Option<PublicNotice> {
    let pin = rec.get_owned("PIN").unwrap_or_default();
    Some(PublicNotice {
        request_id: rec.get_owned(DatasetKind::PublicNotices.key_column())?,
        canonical_pin: canonicalize_id(Some(&pin)),
        pin,
        start_date: rec.get_owned("StartDate"),
        end_date: rec.get_owned("EndDate"),
        agency_name: rec.get_owned("AgencyName"),
        agency_id: rec.get_owned("wegov-org-id"),
        type_of_notice: rec.get_owned("TypeOfNoticeDescription"),
        category: rec.get_owned("CategoryDescription"),
        short_title: rec.get_owned("ShortTitle"),
        selection_method: rec.get_owned("SelectionMethodDescription"),
        section_name: rec.get_owned("SectionName"),
        due_date: rec.get_owned("DueDate"),
        contract_amount: rec.get_owned("ContractAmount"),
        vendor_name: rec.get_owned("VendorName"),
    })
}

/// First non-empty value among header spellings. The vendor reports are
/// published with doubled spaces in some headers.
fn any_of(rec: &SourceRecord, columns: &[&str]) -> Option<String> {
    columns.iter().find_map(|c| rec.get_owned(c))
}

pub fn entity_summary_from_record(rec: &SourceRecord) -> Option<VendorEntitySummary> {
    Some(VendorEntitySummary {
        vendor_name: rec.get_owned(VENDOR_NAME)?,
        address_line_1: any_of(rec, &["Address Line 1", "Address  Line 1"]),
        address_line_2: any_of(rec, &["Address Line 2", "Address  Line 2"]),
        city: rec.get_owned("City"),
        state: rec.get_owned("State"),
        zip_code: rec.get_owned("Zip Code"),
        country: rec.get_owned("Country"),
        telephone: rec.get_owned("Telephone"),
        stock_symbol: rec.get_owned("Stock Exchange Symbol"),
        for_profit: rec.get_owned("For Profit"),
        duns_number: any_of(rec, &["DUNS number", "DUNS Number"]),
        gross_revenue: rec.get_owned("Gross Revenue"),
    })
}

pub fn other_name_from_record(rec: &SourceRecord) -> Option<VendorOtherName> {
    Some(VendorOtherName {
        vendor_name: rec.get_owned(VENDOR_NAME)?,
        name_type: rec.get_owned("Other Name Type"),
        other_name: rec.get_owned("Other Name"),
        from_date: rec.get_owned("From Date"),
        to_date: rec.get_owned("To Date"),
    })
}

pub fn evaluation_from_record(rec: &SourceRecord) -> Option<VendorEvaluation> {
    Some(VendorEvaluation {
        vendor_name: rec.get_owned(VENDOR_NAME)?,
        agency: rec.get_owned("Agency"),
        contract_id: any_of(rec, &["Contract ID", "Contract  ID"]),
        purpose: rec.get_owned("Purpose"),
        evaluation_date: rec.get_owned("Evaluation Date"),
        period_start: rec.get_owned("Evaluation Period Start Date"),
        period_end: rec.get_owned("Evaluation Period End Date"),
        overall_rating: rec.get_owned("Overall Rating"),
    })
}

pub fn principal_from_record(rec: &SourceRecord) -> Option<VendorPrincipal> {
    Some(VendorPrincipal {
        vendor_name: rec.get_owned(VENDOR_NAME)?,
        principal_name: rec.get_owned("Principal Name"),
        title: rec.get_owned("Current Title"),
        ownership_type: rec.get_owned("Principal Ownership Type"),
    })
}

pub fn related_entity_from_record(rec: &SourceRecord) -> Option<VendorRelatedEntity> {
    Some(VendorRelatedEntity {
        vendor_name: rec.get_owned(VENDOR_NAME)?,
        related_name: rec.get_owned("Related Entity Name"),
        address_line_1: any_of(rec, &["Address Line 1", "Address  Line 1"]),
        address_line_2: any_of(rec, &["Address Line 2", "Address  Line 2"]),
        city: rec.get_owned("City"),
        state: rec.get_owned("State"),
        zip_code: rec.get_owned("Zip Code"),
        country: rec.get_owned("Country"),
        telephone: rec.get_owned("Telephone"),
        relationship: rec.get_owned("Relationship to Vendor"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_extract;
    use std::path::Path;

    fn first_record(csv: &str, kind: DatasetKind) -> SourceRecord {
        parse_extract(csv.as_bytes(), Path::new("mem.csv"), kind.key_column())
            .expect("parse")
            .records
            .remove(0)
    }

    #[test]
    fn contract_rows_carry_canonical_keys_and_clean_money() {
        let rec = first_record(
            "CTR-ID,Contract ID,EPIN,Vendor,Award Amount,Current Contract Amount\n\
             CTR-9,CT1-856-20238801234,85826Y1251001,Acme Widgets Inc,\"$12,345.67\",N/A\n",
            DatasetKind::Contracts,
        );
        let c = contract_from_record(&rec).expect("contract");
        assert_eq!(c.ctr_id, "CTR-9");
        assert_eq!(c.canonical_contract_id.as_deref(), Some("CT185620238801234"));
        assert_eq!(c.canonical_epin.as_deref(), Some("85826Y1251001"));
        assert_eq!(c.award_amount, 12345.67);
        assert_eq!(c.current_amount, 0.0);
        assert_eq!(c.title, None);
    }

    #[test]
    fn rows_without_a_natural_key_are_not_mapped() {
        let rec = first_record("CTR-ID,Vendor\n,Acme\n", DatasetKind::Contracts);
        assert!(contract_from_record(&rec).is_none());
    }

    #[test]
    fn registrants_and_people_share_canonical_org_names() {
        let reg = first_record(
            "organization_name,organization_phone\n\"Acme Widgets, Inc.\",555\n",
            DatasetKind::Registrants,
        );
        let person = first_record(
            "mocs_peopleid,organization_name,person_name_first\nP1,ACME WIDGETS INC,Dana\n",
            DatasetKind::RegistrantPeople,
        );
        let reg = registrant_from_record(&reg).expect("registrant");
        let person = person_from_record(&person).expect("person");
        assert_eq!(reg.canonical_name, person.canonical_org_name);
        assert_eq!(reg.match_score, 0.0);
    }

    #[test]
    fn vendor_reports_accept_published_header_spellings() {
        let summary = first_record(
            "Vendor Name,Address  Line 2,DUNS number,Gross Revenue\n\"Acme Widgets, Inc.\",Suite 4,111111111,$2M\n",
            DatasetKind::VendorEntitySummary,
        );
        let summary = entity_summary_from_record(&summary).expect("summary");
        assert_eq!(summary.vendor_name, "Acme Widgets, Inc.");
        assert_eq!(summary.address_line_2.as_deref(), Some("Suite 4"));
        assert_eq!(summary.duns_number.as_deref(), Some("111111111"));

        let other = first_record(
            "Vendor Name,Other Name Type,Other Name,From Date,To Date \nAcme,DBA,Acme NYC,01/01/2020,\n",
            DatasetKind::VendorOtherNames,
        );
        let other = other_name_from_record(&other).expect("other name");
        assert_eq!(other.other_name.as_deref(), Some("Acme NYC"));
        assert_eq!(other.to_date, None);

        let evaluation = first_record(
            "Vendor Name,Contract  ID,Overall Rating\nAcme,CT1-827-001,Excellent\n",
            DatasetKind::VendorEvaluations,
        );
        let evaluation = evaluation_from_record(&evaluation).expect("evaluation");
        assert_eq!(evaluation.contract_id.as_deref(), Some("CT1-827-001"));
    }

    #[test]
    fn vendor_report_rows_need_a_vendor_name() {
        let rec = first_record("Vendor Name,Principal Name\n,Dana Reyes\n", DatasetKind::VendorPrincipals);
        assert!(principal_from_record(&rec).is_none());
        let rec = first_record(
            "Vendor Name,Related Entity Name,Relationship to Vendor\nAcme,Acme Holdings,Parent\n",
            DatasetKind::VendorRelatedEntities,
        );
        let related = related_entity_from_record(&rec).expect("related");
        assert_eq!(related.relationship.as_deref(), Some("Parent"));
    }

    #[test]
    fn notices_keep_raw_pin_for_validation() {
        let rec = first_record("RequestID,PIN\nR1,SEE BELOW\n", DatasetKind::PublicNotices);
        let n = notice_from_record(&rec).expect("notice");
        assert_eq!(n.pin, "SEE BELOW");
        assert_eq!(n.canonical_pin.as_deref(), Some("SEEBELOW"));
    }
}
