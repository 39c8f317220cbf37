//! Insert-or-ignore batch writes. Every batch runs in one transaction and
//! reports how many rows were actually new.

use anyhow::Context;
use databook_core::{
    Agency, Contract, PublicNotice, Registrant, RegistrantPerson, Solicitation, Vendor,
    VendorEntitySummary, VendorEvaluation, VendorOtherName, VendorPrincipal, VendorRelatedEntity,
};

use super::RelationalStore;

/// Registrant to vendor link written by the entity matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrantMatch {
    pub organization_name: String,
    pub vendor_id: String,
    pub score: f64,
}

impl RelationalStore {
    pub async fn insert_vendors(&self, rows: &[Vendor]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning vendor batch")?;
        let mut inserted = 0;
        for v in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO vendors (
                    passport_supplier_id, name, canonical_name, fms_vendor_code, duns_number,
                    certification_type, ethnicity, business_category, corporate_structure
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&v.passport_supplier_id)
            .bind(&v.name)
            .bind(&v.canonical_name)
            .bind(&v.fms_vendor_code)
            .bind(&v.duns_number)
            .bind(&v.certification_type)
            .bind(&v.ethnicity)
            .bind(&v.business_category)
            .bind(&v.corporate_structure)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting vendor {}", v.passport_supplier_id))?
            .rows_affected();
        }
        tx.commit().await.context("committing vendor batch")?;
        Ok(inserted)
    }

    pub async fn insert_solicitations(&self, rows: &[Solicitation]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning solicitation batch")?;
        let mut inserted = 0;
        for s in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO solicitations (
                    epin, canonical_epin, rfp_id, program, industry, procurement_name, agency,
                    agency_id, rfx_status, release_date, due_date, main_commodity, procurement_method
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&s.epin)
            .bind(&s.canonical_epin)
            .bind(&s.rfp_id)
            .bind(&s.program)
            .bind(&s.industry)
            .bind(&s.procurement_name)
            .bind(&s.agency)
            .bind(&s.agency_id)
            .bind(&s.rfx_status)
            .bind(&s.release_date)
            .bind(&s.due_date)
            .bind(&s.main_commodity)
            .bind(&s.procurement_method)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting solicitation {}", s.epin))?
            .rows_affected();
        }
        tx.commit().await.context("committing solicitation batch")?;
        Ok(inserted)
    }

    pub async fn insert_contracts(&self, rows: &[Contract]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning contract batch")?;
        let mut inserted = 0;
        for c in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO contracts (
                    ctr_id, contract_id, canonical_contract_id, epin, canonical_epin, title,
                    agency, agency_id, vendor_name, program, procurement_method, contract_type,
                    status, award_amount, current_amount, start_date, end_date, industry
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&c.ctr_id)
            .bind(&c.contract_id)
            .bind(&c.canonical_contract_id)
            .bind(&c.epin)
            .bind(&c.canonical_epin)
            .bind(&c.title)
            .bind(&c.agency)
            .bind(&c.agency_id)
            .bind(&c.vendor_name)
            .bind(&c.program)
            .bind(&c.procurement_method)
            .bind(&c.contract_type)
            .bind(&c.status)
            .bind(c.award_amount)
            .bind(c.current_amount)
            .bind(&c.start_date)
            .bind(&c.end_date)
            .bind(&c.industry)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting contract {}", c.ctr_id))?
            .rows_affected();
        }
        tx.commit().await.context("committing contract batch")?;
        Ok(inserted)
    }

    pub async fn insert_registrants(&self, rows: &[Registrant]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning registrant batch")?;
        let mut inserted = 0;
        for r in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO registrants (
                    organization_name, canonical_name, ownership_structure_code,
                    organization_phone, start_date, matched_vendor_id, match_score
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&r.organization_name)
            .bind(&r.canonical_name)
            .bind(&r.ownership_structure_code)
            .bind(&r.organization_phone)
            .bind(&r.start_date)
            .bind(&r.matched_vendor_id)
            .bind(r.match_score)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting registrant {}", r.organization_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing registrant batch")?;
        Ok(inserted)
    }

    pub async fn insert_people(&self, rows: &[RegistrantPerson]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning people batch")?;
        let mut inserted = 0;
        for p in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO registrant_people (
                    person_id, organization_name, canonical_org_name, first_name, last_name,
                    relationship_code
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&p.person_id)
            .bind(&p.organization_name)
            .bind(&p.canonical_org_name)
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(&p.relationship_code)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting person {}", p.person_id))?
            .rows_affected();
        }
        tx.commit().await.context("committing people batch")?;
        Ok(inserted)
    }

    pub async fn insert_notices(&self, rows: &[PublicNotice]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning notice batch")?;
        let mut inserted = 0;
        for n in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO public_notices (
                    request_id, pin, canonical_pin, start_date, end_date, agency_name, agency_id,
                    type_of_notice, category, short_title, selection_method, section_name,
                    due_date, contract_amount, vendor_name
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&n.request_id)
            .bind(&n.pin)
            .bind(&n.canonical_pin)
            .bind(&n.start_date)
            .bind(&n.end_date)
            .bind(&n.agency_name)
            .bind(&n.agency_id)
            .bind(&n.type_of_notice)
            .bind(&n.category)
            .bind(&n.short_title)
            .bind(&n.selection_method)
            .bind(&n.section_name)
            .bind(&n.due_date)
            .bind(&n.contract_amount)
            .bind(&n.vendor_name)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting notice {}", n.request_id))?
            .rows_affected();
        }
        tx.commit().await.context("committing notice batch")?;
        Ok(inserted)
    }

    /// One summary per vendor name; the first row seen wins.
    pub async fn insert_entity_summaries(&self, rows: &[VendorEntitySummary]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning entity summary batch")?;
        let mut inserted = 0;
        for e in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO vendor_entity_summary (
                    vendor_name, address_line_1, address_line_2, city, state, zip_code, country,
                    telephone, stock_symbol, for_profit, duns_number, gross_revenue
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&e.vendor_name)
            .bind(&e.address_line_1)
            .bind(&e.address_line_2)
            .bind(&e.city)
            .bind(&e.state)
            .bind(&e.zip_code)
            .bind(&e.country)
            .bind(&e.telephone)
            .bind(&e.stock_symbol)
            .bind(&e.for_profit)
            .bind(&e.duns_number)
            .bind(&e.gross_revenue)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting entity summary for {}", e.vendor_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing entity summary batch")?;
        Ok(inserted)
    }

    pub async fn insert_other_names(&self, rows: &[VendorOtherName]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning other name batch")?;
        let mut inserted = 0;
        for o in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO vendor_other_names (
                    vendor_name, name_type, other_name, from_date, to_date
                ) VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&o.vendor_name)
            .bind(&o.name_type)
            .bind(&o.other_name)
            .bind(&o.from_date)
            .bind(&o.to_date)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting other name for {}", o.vendor_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing other name batch")?;
        Ok(inserted)
    }

    pub async fn insert_evaluations(&self, rows: &[VendorEvaluation]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning evaluation batch")?;
        let mut inserted = 0;
        for e in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO vendor_evaluations (
                    vendor_name, agency, contract_id, purpose, evaluation_date, period_start,
                    period_end, overall_rating
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&e.vendor_name)
            .bind(&e.agency)
            .bind(&e.contract_id)
            .bind(&e.purpose)
            .bind(&e.evaluation_date)
            .bind(&e.period_start)
            .bind(&e.period_end)
            .bind(&e.overall_rating)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting evaluation for {}", e.vendor_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing evaluation batch")?;
        Ok(inserted)
    }

    pub async fn insert_principals(&self, rows: &[VendorPrincipal]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning principal batch")?;
        let mut inserted = 0;
        for p in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO vendor_principals (
                    vendor_name, principal_name, title, ownership_type
                ) VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&p.vendor_name)
            .bind(&p.principal_name)
            .bind(&p.title)
            .bind(&p.ownership_type)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting principal for {}", p.vendor_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing principal batch")?;
        Ok(inserted)
    }

    pub async fn insert_related_entities(&self, rows: &[VendorRelatedEntity]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning related entity batch")?;
        let mut inserted = 0;
        for r in rows {
            inserted += sqlx::query(
                r#"
                INSERT OR IGNORE INTO vendor_related_entities (
                    vendor_name, related_name, address_line_1, address_line_2, city, state,
                    zip_code, country, telephone, relationship
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&r.vendor_name)
            .bind(&r.related_name)
            .bind(&r.address_line_1)
            .bind(&r.address_line_2)
            .bind(&r.city)
            .bind(&r.state)
            .bind(&r.zip_code)
            .bind(&r.country)
            .bind(&r.telephone)
            .bind(&r.relationship)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("inserting related entity for {}", r.vendor_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing related entity batch")?;
        Ok(inserted)
    }

    /// First name seen for an agency id wins.
    pub async fn upsert_agencies(&self, rows: &[Agency]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning agency batch")?;
        let mut inserted = 0;
        for a in rows {
            inserted += sqlx::query("INSERT OR IGNORE INTO agencies (id, name) VALUES (?, ?)")
                .bind(&a.id)
                .bind(&a.name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("upserting agency {}", a.id))?
                .rows_affected();
        }
        tx.commit().await.context("committing agency batch")?;
        Ok(inserted)
    }

    /// Clear every registrant match, then write `matches`, all in one
    /// transaction so readers never see a half-recomputed state.
    pub async fn replace_registrant_matches(&self, matches: &[RegistrantMatch]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("beginning match batch")?;
        sqlx::query("UPDATE registrants SET matched_vendor_id = NULL, match_score = 0.0")
            .execute(&mut *tx)
            .await
            .context("resetting registrant matches")?;
        let mut updated = 0;
        for m in matches {
            updated += sqlx::query(
                "UPDATE registrants SET matched_vendor_id = ?, match_score = ? WHERE organization_name = ?",
            )
            .bind(&m.vendor_id)
            .bind(m.score)
            .bind(&m.organization_name)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("matching registrant {}", m.organization_name))?
            .rows_affected();
        }
        tx.commit().await.context("committing match batch")?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::relational::Table;

    #[tokio::test]
    async fn reinserting_the_same_rows_is_ignored() {
        let (_dir, store) = temp_store().await;
        let vendors = vec![vendor("S1", "Acme Widgets Inc"), vendor("S2", "Harbor LLC")];
        assert_eq!(store.insert_vendors(&vendors).await.expect("first"), 2);
        assert_eq!(store.insert_vendors(&vendors).await.expect("second"), 0);
        assert_eq!(store.count(Table::Vendors).await.expect("count"), 2);

        let contracts = vec![contract("CTR1", "CT1-001", "85826Y1251001", "Acme Widgets Inc", 10.0)];
        assert_eq!(store.insert_contracts(&contracts).await.expect("contracts"), 1);
        assert_eq!(store.insert_contracts(&contracts).await.expect("contracts again"), 0);
    }

    #[tokio::test]
    async fn agency_upsert_keeps_first_name() {
        let (_dir, store) = temp_store().await;
        let first = Agency { id: "827".into(), name: "Sanitation".into() };
        let renamed = Agency { id: "827".into(), name: "DSNY".into() };
        store.upsert_agencies(&[first.clone(), renamed]).await.expect("upsert");
        assert_eq!(store.agencies().await.expect("agencies"), vec![first]);
    }

    #[tokio::test]
    async fn replacing_matches_clears_stale_links() {
        let (_dir, store) = temp_store().await;
        let registrant = |name: &str| Registrant {
            organization_name: name.into(),
            canonical_name: databook_core::canonicalize_id(Some(name)),
            ownership_structure_code: None,
            organization_phone: None,
            start_date: None,
            matched_vendor_id: None,
            match_score: 0.0,
        };
        store
            .insert_registrants(&[registrant("Acme"), registrant("Harbor")])
            .await
            .expect("registrants");
        let link = |org: &str, id: &str| RegistrantMatch {
            organization_name: org.into(),
            vendor_id: id.into(),
            score: 1.0,
        };
        store.replace_registrant_matches(&[link("Acme", "S1"), link("Harbor", "S2")]).await.expect("first");
        store.replace_registrant_matches(&[link("Acme", "S1")]).await.expect("second");

        let harbor = store.registrant_for_vendor("S2").await.expect("lookup");
        assert!(harbor.is_none());
        let acme = store.registrant_for_vendor("S1").await.expect("lookup").expect("acme");
        assert_eq!(acme.match_score, 1.0);
    }
}
