//! Parameterized read queries used by the resolver and the entity matcher.

use anyhow::Context;
use databook_core::{
    Agency, Contract, PublicNotice, Registrant, RegistrantPerson, Solicitation, Vendor,
    VendorEntitySummary, VendorEvaluation, VendorOtherName, VendorPrincipal, VendorRelatedEntity,
};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{ContractSortKey, RelationalStore, SortOrder, VendorSortKey};

const CONTRACT_COLUMNS: &str = "ctr_id, contract_id, canonical_contract_id, epin, canonical_epin, \
    title, agency, agency_id, vendor_name, program, procurement_method, contract_type, status, \
    award_amount, current_amount, start_date, end_date, industry";

const SOLICITATION_COLUMNS: &str = "epin, canonical_epin, rfp_id, program, industry, \
    procurement_name, agency, agency_id, rfx_status, release_date, due_date, main_commodity, \
    procurement_method";

const VENDOR_COLUMNS: &str = "v.passport_supplier_id, v.name, v.canonical_name, v.fms_vendor_code, \
    v.duns_number, v.certification_type, v.ethnicity, v.business_category, v.corporate_structure";

/// Vendor row plus its relational contract aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorListing {
    pub vendor: Vendor,
    pub contract_count: i64,
    pub total_awarded: f64,
}

/// PASSPort report rows whose vendor name equals one vendor's name exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VendorEnrichment {
    pub entity_summary: Option<VendorEntitySummary>,
    pub other_names: Vec<VendorOtherName>,
    pub evaluations: Vec<VendorEvaluation>,
    pub principals: Vec<VendorPrincipal>,
    pub related_entities: Vec<VendorRelatedEntity>,
}

/// Canonical join keys for the notice link report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeKeys {
    pub notice_pins: Vec<String>,
    pub solicitation_epins: Vec<String>,
    pub contract_epins: Vec<String>,
}

fn contract_from_row(row: &SqliteRow) -> Result<Contract, sqlx::Error> {
    Ok(Contract {
        ctr_id: row.try_get("ctr_id")?,
        contract_id: row.try_get("contract_id")?,
        canonical_contract_id: row.try_get("canonical_contract_id")?,
        epin: row.try_get("epin")?,
        canonical_epin: row.try_get("canonical_epin")?,
        title: row.try_get("title")?,
        agency: row.try_get("agency")?,
        agency_id: row.try_get("agency_id")?,
        vendor_name: row.try_get("vendor_name")?,
        program: row.try_get("program")?,
        procurement_method: row.try_get("procurement_method")?,
        contract_type: row.try_get("contract_type")?,
        status: row.try_get("status")?,
        award_amount: row.try_get("award_amount")?,
        current_amount: row.try_get("current_amount")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        industry: row.try_get("industry")?,
    })
}

fn solicitation_from_row(row: &SqliteRow) -> Result<Solicitation, sqlx::Error> {
    Ok(Solicitation {
        epin: row.try_get("epin")?,
        canonical_epin: row.try_get("canonical_epin")?,
        rfp_id: row.try_get("rfp_id")?,
        program: row.try_get("program")?,
        industry: row.try_get("industry")?,
        procurement_name: row.try_get("procurement_name")?,
        agency: row.try_get("agency")?,
        agency_id: row.try_get("agency_id")?,
        rfx_status: row.try_get("rfx_status")?,
        release_date: row.try_get("release_date")?,
        due_date: row.try_get("due_date")?,
        main_commodity: row.try_get("main_commodity")?,
        procurement_method: row.try_get("procurement_method")?,
    })
}

fn vendor_from_row(row: &SqliteRow) -> Result<Vendor, sqlx::Error> {
    Ok(Vendor {
        passport_supplier_id: row.try_get("passport_supplier_id")?,
        name: row.try_get("name")?,
        canonical_name: row.try_get("canonical_name")?,
        fms_vendor_code: row.try_get("fms_vendor_code")?,
        duns_number: row.try_get("duns_number")?,
        certification_type: row.try_get("certification_type")?,
        ethnicity: row.try_get("ethnicity")?,
        business_category: row.try_get("business_category")?,
        corporate_structure: row.try_get("corporate_structure")?,
    })
}

fn registrant_from_row(row: &SqliteRow) -> Result<Registrant, sqlx::Error> {
    Ok(Registrant {
        organization_name: row.try_get("organization_name")?,
        canonical_name: row.try_get("canonical_name")?,
        ownership_structure_code: row.try_get("ownership_structure_code")?,
        organization_phone: row.try_get("organization_phone")?,
        start_date: row.try_get("start_date")?,
        matched_vendor_id: row.try_get("matched_vendor_id")?,
        match_score: row.try_get("match_score")?,
    })
}

fn notice_from_row(row: &SqliteRow) -> Result<PublicNotice, sqlx::Error> {
    Ok(PublicNotice {
        request_id: row.try_get("request_id")?,
        pin: row.try_get("pin")?,
        canonical_pin: row.try_get("canonical_pin")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        agency_name: row.try_get("agency_name")?,
        agency_id: row.try_get("agency_id")?,
        type_of_notice: row.try_get("type_of_notice")?,
        category: row.try_get("category")?,
        short_title: row.try_get("short_title")?,
        selection_method: row.try_get("selection_method")?,
        section_name: row.try_get("section_name")?,
        due_date: row.try_get("due_date")?,
        contract_amount: row.try_get("contract_amount")?,
        vendor_name: row.try_get("vendor_name")?,
    })
}

fn entity_summary_from_row(row: &SqliteRow) -> Result<VendorEntitySummary, sqlx::Error> {
    Ok(VendorEntitySummary {
        vendor_name: row.try_get("vendor_name")?,
        address_line_1: row.try_get("address_line_1")?,
        address_line_2: row.try_get("address_line_2")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        country: row.try_get("country")?,
        telephone: row.try_get("telephone")?,
        stock_symbol: row.try_get("stock_symbol")?,
        for_profit: row.try_get("for_profit")?,
        duns_number: row.try_get("duns_number")?,
        gross_revenue: row.try_get("gross_revenue")?,
    })
}

fn other_name_from_row(row: &SqliteRow) -> Result<VendorOtherName, sqlx::Error> {
    Ok(VendorOtherName {
        vendor_name: row.try_get("vendor_name")?,
        name_type: row.try_get("name_type")?,
        other_name: row.try_get("other_name")?,
        from_date: row.try_get("from_date")?,
        to_date: row.try_get("to_date")?,
    })
}

fn evaluation_from_row(row: &SqliteRow) -> Result<VendorEvaluation, sqlx::Error> {
    Ok(VendorEvaluation {
        vendor_name: row.try_get("vendor_name")?,
        agency: row.try_get("agency")?,
        contract_id: row.try_get("contract_id")?,
        purpose: row.try_get("purpose")?,
        evaluation_date: row.try_get("evaluation_date")?,
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        overall_rating: row.try_get("overall_rating")?,
    })
}

fn principal_from_row(row: &SqliteRow) -> Result<VendorPrincipal, sqlx::Error> {
    Ok(VendorPrincipal {
        vendor_name: row.try_get("vendor_name")?,
        principal_name: row.try_get("principal_name")?,
        title: row.try_get("title")?,
        ownership_type: row.try_get("ownership_type")?,
    })
}

fn related_entity_from_row(row: &SqliteRow) -> Result<VendorRelatedEntity, sqlx::Error> {
    Ok(VendorRelatedEntity {
        vendor_name: row.try_get("vendor_name")?,
        related_name: row.try_get("related_name")?,
        address_line_1: row.try_get("address_line_1")?,
        address_line_2: row.try_get("address_line_2")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        country: row.try_get("country")?,
        telephone: row.try_get("telephone")?,
        relationship: row.try_get("relationship")?,
    })
}

impl RelationalStore {
    pub async fn contract_by_ctr_id(&self, ctr_id: &str) -> anyhow::Result<Option<Contract>> {
        let row = sqlx::query(&format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE ctr_id = ?"))
            .bind(ctr_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("loading contract {ctr_id}"))?;
        Ok(row.as_ref().map(contract_from_row).transpose()?)
    }

    /// Contracts whose canonical EPIN starts with `prefix`.
    pub async fn contracts_with_epin_prefix(&self, prefix: &str) -> anyhow::Result<Vec<Contract>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE canonical_epin LIKE ? || '%' ORDER BY id"
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("loading contracts for epin prefix {prefix}"))?;
        Ok(rows.iter().map(contract_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn count_contracts_with_epin_prefix(&self, prefix: &str) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contracts WHERE canonical_epin LIKE ? || '%'")
                .bind(prefix)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("counting contracts for epin prefix {prefix}"))?;
        Ok(count)
    }

    /// Contracts whose free-text vendor name equals `name` exactly.
    pub async fn contracts_by_vendor_name(&self, name: &str) -> anyhow::Result<Vec<Contract>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE vendor_name = ? ORDER BY id"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("loading contracts for vendor {name}"))?;
        Ok(rows.iter().map(contract_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn list_contracts(
        &self,
        sort: ContractSortKey,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Contract>> {
        let statement = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts ORDER BY {} {}, id LIMIT ? OFFSET ?",
            sort.column(),
            order.as_sql()
        );
        let rows = sqlx::query(&statement)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("listing contracts")?;
        Ok(rows.iter().map(contract_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn solicitation_by_canonical_epin(&self, key: &str) -> anyhow::Result<Option<Solicitation>> {
        let row = sqlx::query(&format!(
            "SELECT {SOLICITATION_COLUMNS} FROM solicitations WHERE canonical_epin = ? ORDER BY id LIMIT 1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading solicitation for canonical epin {key}"))?;
        Ok(row.as_ref().map(solicitation_from_row).transpose()?)
    }

    pub async fn solicitation_by_epin(&self, epin: &str) -> anyhow::Result<Option<Solicitation>> {
        let row = sqlx::query(&format!(
            "SELECT {SOLICITATION_COLUMNS} FROM solicitations WHERE epin = ?"
        ))
        .bind(epin)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading solicitation {epin}"))?;
        Ok(row.as_ref().map(solicitation_from_row).transpose()?)
    }

    pub async fn notices_by_canonical_pin(&self, key: &str) -> anyhow::Result<Vec<PublicNotice>> {
        let rows = sqlx::query("SELECT * FROM public_notices WHERE canonical_pin = ? ORDER BY id")
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("loading notices for pin {key}"))?;
        Ok(rows.iter().map(notice_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    /// Canonical keys on both sides of the notice join, non-null only.
    pub async fn notice_keys(&self) -> anyhow::Result<NoticeKeys> {
        Ok(NoticeKeys {
            notice_pins: self
                .key_column("SELECT canonical_pin FROM public_notices WHERE canonical_pin IS NOT NULL ORDER BY id")
                .await?,
            solicitation_epins: self
                .key_column("SELECT canonical_epin FROM solicitations WHERE canonical_epin IS NOT NULL ORDER BY id")
                .await?,
            contract_epins: self
                .key_column("SELECT canonical_epin FROM contracts WHERE canonical_epin IS NOT NULL ORDER BY id")
                .await?,
        })
    }

    async fn key_column(&self, statement: &'static str) -> anyhow::Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(statement)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("loading keys: {statement}"))?;
        Ok(keys)
    }

    /// Lowest-id vendor whose display name equals `name`.
    pub async fn vendor_by_name(&self, name: &str) -> anyhow::Result<Option<Vendor>> {
        let row = sqlx::query(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors v WHERE v.name = ? ORDER BY v.id LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading vendor named {name}"))?;
        Ok(row.as_ref().map(vendor_from_row).transpose()?)
    }

    pub async fn vendor_by_supplier_id(&self, supplier_id: &str) -> anyhow::Result<Option<Vendor>> {
        let row = sqlx::query(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors v WHERE v.passport_supplier_id = ?"
        ))
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading vendor {supplier_id}"))?;
        Ok(row.as_ref().map(vendor_from_row).transpose()?)
    }

    /// `(supplier id, canonical name)` for every named vendor, ordered by
    /// supplier id.
    pub async fn vendor_canonical_names(&self) -> anyhow::Result<Vec<(String, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT passport_supplier_id, canonical_name
              FROM vendors
             WHERE canonical_name IS NOT NULL
             ORDER BY passport_supplier_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("loading vendor canonical names")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push((row.try_get("passport_supplier_id")?, row.try_get("canonical_name")?));
        }
        Ok(out)
    }

    pub async fn list_vendors(
        &self,
        sort: VendorSortKey,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<VendorListing>> {
        let statement = format!(
            r#"
            SELECT {VENDOR_COLUMNS},
                   (SELECT COUNT(*) FROM contracts c WHERE c.vendor_name = v.name) AS contract_count,
                   (SELECT COALESCE(SUM(c.award_amount), 0.0) FROM contracts c WHERE c.vendor_name = v.name) AS total_awarded
              FROM vendors v
             ORDER BY {} {}, v.id
             LIMIT ? OFFSET ?
            "#,
            sort.column(),
            order.as_sql()
        );
        let rows = sqlx::query(&statement)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("listing vendors")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(VendorListing {
                vendor: vendor_from_row(&row)?,
                contract_count: row.try_get("contract_count")?,
                total_awarded: row.try_get("total_awarded")?,
            });
        }
        Ok(out)
    }

    /// `(organization name, canonical name)` for every registrant.
    pub async fn registrant_names(&self) -> anyhow::Result<Vec<(String, Option<String>)>> {
        let rows = sqlx::query("SELECT organization_name, canonical_name FROM registrants ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("loading registrant names")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push((row.try_get("organization_name")?, row.try_get("canonical_name")?));
        }
        Ok(out)
    }

    pub async fn registrant_for_vendor(&self, supplier_id: &str) -> anyhow::Result<Option<Registrant>> {
        let row = sqlx::query(
            "SELECT * FROM registrants WHERE matched_vendor_id = ? ORDER BY id LIMIT 1",
        )
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading registrant for vendor {supplier_id}"))?;
        Ok(row.as_ref().map(registrant_from_row).transpose()?)
    }

    pub async fn people_by_canonical_org(&self, canonical_name: &str) -> anyhow::Result<Vec<RegistrantPerson>> {
        let rows = sqlx::query(
            "SELECT * FROM registrant_people WHERE canonical_org_name = ? ORDER BY last_name, first_name, id",
        )
        .bind(canonical_name)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("loading people for {canonical_name}"))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(RegistrantPerson {
                person_id: row.try_get("person_id")?,
                organization_name: row.try_get("organization_name")?,
                canonical_org_name: row.try_get("canonical_org_name")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                relationship_code: row.try_get("relationship_code")?,
            });
        }
        Ok(out)
    }

    /// Every vendor report row filed under exactly `name`.
    pub async fn vendor_enrichment(&self, name: &str) -> anyhow::Result<VendorEnrichment> {
        let summary = sqlx::query("SELECT * FROM vendor_entity_summary WHERE vendor_name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("loading entity summary for {name}"))?;
        Ok(VendorEnrichment {
            entity_summary: summary.as_ref().map(entity_summary_from_row).transpose()?,
            other_names: self
                .rows_for_vendor("vendor_other_names", name, other_name_from_row)
                .await?,
            evaluations: self
                .rows_for_vendor("vendor_evaluations", name, evaluation_from_row)
                .await?,
            principals: self
                .rows_for_vendor("vendor_principals", name, principal_from_row)
                .await?,
            related_entities: self
                .rows_for_vendor("vendor_related_entities", name, related_entity_from_row)
                .await?,
        })
    }

    async fn rows_for_vendor<T>(
        &self,
        table: &'static str,
        name: &str,
        map: fn(&SqliteRow) -> Result<T, sqlx::Error>,
    ) -> anyhow::Result<Vec<T>> {
        let rows = sqlx::query(&format!("SELECT * FROM {table} WHERE vendor_name = ? ORDER BY id"))
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("loading {table} for {name}"))?;
        Ok(rows.iter().map(map).collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn agencies(&self) -> anyhow::Result<Vec<Agency>> {
        let rows = sqlx::query("SELECT id, name FROM agencies ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("loading agencies")?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Agency {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn epin_prefix_lookup_is_one_to_many() {
        let (_dir, store) = temp_store().await;
        store
            .insert_contracts(&[
                contract("C1", "CT1-1", "ABC123XYZ9001", "Acme", 1.0),
                contract("C2", "CT1-2", "ABC123XYZ9002", "Acme", 2.0),
                contract("C3", "CT1-3", "ZZZ000", "Acme", 3.0),
            ])
            .await
            .expect("insert");
        let linked = store.contracts_with_epin_prefix("ABC123XYZ9").await.expect("prefix");
        let ids = linked.iter().map(|c| c.ctr_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["C1", "C2"]);
        assert_eq!(store.count_contracts_with_epin_prefix("ABC123XYZ9").await.expect("count"), 2);
    }

    #[tokio::test]
    async fn contract_rows_map_back_to_records() {
        let (_dir, store) = temp_store().await;
        let original = contract("C9", "CT1-856-2023", "85826Y1251001", "Acme Widgets Inc", 12345.67);
        store.insert_contracts(&[original.clone()]).await.expect("insert");
        let loaded = store.contract_by_ctr_id("C9").await.expect("load").expect("present");
        assert_eq!(loaded, original);
        assert!(store.contract_by_ctr_id("missing").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn vendor_listing_sorts_by_allow_listed_aggregate() {
        let (_dir, store) = temp_store().await;
        store
            .insert_vendors(&[vendor("S1", "Acme"), vendor("S2", "Harbor")])
            .await
            .expect("vendors");
        store
            .insert_contracts(&[
                contract("C1", "CT1", "E1", "Harbor", 50.0),
                contract("C2", "CT2", "E2", "Harbor", 25.0),
                contract("C3", "CT3", "E3", "Acme", 10.0),
            ])
            .await
            .expect("contracts");

        let by_amount = store
            .list_vendors(VendorSortKey::Amount, SortOrder::Desc, 10, 0)
            .await
            .expect("list");
        assert_eq!(by_amount[0].vendor.passport_supplier_id, "S2");
        assert_eq!(by_amount[0].contract_count, 2);
        assert_eq!(by_amount[0].total_awarded, 75.0);

        let by_name = store
            .list_vendors(VendorSortKey::Name, SortOrder::Asc, 1, 0)
            .await
            .expect("list");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].vendor.name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn vendor_reports_link_by_exact_name_and_reload_idempotently() {
        let (_dir, store) = temp_store().await;
        let principal = |vendor: &str, name: &str| VendorPrincipal {
            vendor_name: vendor.into(),
            principal_name: Some(name.into()),
            title: None,
            ownership_type: None,
        };
        let principals = vec![
            principal("Acme Widgets Inc", "Dana Reyes"),
            principal("Acme Widgets Inc", "Lee Park"),
            principal("ACME WIDGETS INC", "Sam Ortiz"),
        ];
        assert_eq!(store.insert_principals(&principals).await.expect("first"), 3);
        assert_eq!(store.insert_principals(&principals).await.expect("again"), 0);

        let evaluation = VendorEvaluation {
            vendor_name: "Acme Widgets Inc".into(),
            agency: None,
            contract_id: None,
            purpose: None,
            evaluation_date: None,
            period_start: None,
            period_end: None,
            overall_rating: Some("Good".into()),
        };
        let twice = vec![evaluation.clone(), evaluation];
        assert_eq!(store.insert_evaluations(&twice).await.expect("blank keys"), 1);

        let enrichment = store.vendor_enrichment("Acme Widgets Inc").await.expect("enrichment");
        let names = enrichment
            .principals
            .iter()
            .filter_map(|p| p.principal_name.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Dana Reyes", "Lee Park"]);
        assert_eq!(enrichment.evaluations.len(), 1);
        assert!(enrichment.entity_summary.is_none());
        assert_eq!(store.vendor_enrichment("Nobody").await.expect("empty"), VendorEnrichment::default());
    }

    #[tokio::test]
    async fn contract_listing_sorts_dates_chronologically() {
        let (_dir, store) = temp_store().await;
        let mut older = contract("C1", "CT1", "E1", "Acme", 1.0);
        older.start_date = Some("12/01/2019".into());
        let mut newer = contract("C2", "CT2", "E2", "Acme", 1.0);
        newer.start_date = Some("01/15/2021".into());
        store.insert_contracts(&[older, newer]).await.expect("insert");
        let listed = store
            .list_contracts(ContractSortKey::StartDate, SortOrder::Desc, 10, 0)
            .await
            .expect("list");
        assert_eq!(listed[0].ctr_id, "C2");
    }
}
