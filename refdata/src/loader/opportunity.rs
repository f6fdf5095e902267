use super::{RecordSink, numeric_or_zero};
use crate::errors::StoreError;
use crate::kind::DataKind;
use crate::records::{OpportunityFeed, OpportunityRow};
use crate::store::LoadTransaction;
use crate::transform::{scale_thousands, truncate_date};
use async_trait::async_trait;

const UNSPECIFIED_WORKLOAD: &str = "Unspecified";

/// Stages open and won opportunities and refreshes the master opportunity and
/// workload rows for every record, which is how closed opportunities get closed out.
#[derive(Default)]
pub struct OpportunitySink {
    master_misses: usize,
}

pub(crate) fn to_row(feed: OpportunityFeed, ordinal: usize) -> OpportunityRow {
    let kind = DataKind::Opportunity;
    let amount = |field, raw: &str| scale_thousands(numeric_or_zero(kind, field, ordinal, raw));

    let win_probability: i64 = numeric_or_zero(kind, "opp_probability", ordinal, &feed.opp_probability);
    let mut revenue_probability: i64 =
        numeric_or_zero(kind, "rev_probability", ordinal, &feed.rev_probability);
    if revenue_probability == 0 {
        revenue_probability = win_probability;
    }

    let sales_rep = if feed.opportunity_owner.is_empty() {
        feed.territory_owner.clone()
    } else {
        feed.opportunity_owner
    };
    let product_description = if feed.product_description.trim().is_empty() {
        UNSPECIFIED_WORKLOAD.to_string()
    } else {
        feed.product_description
    };

    let opportunity_value = amount("oppty_amount_k", &feed.oppty_amount_k);
    let revenue_tcv = amount("rev_tcv_k", &feed.rev_tcv_k);

    OpportunityRow {
        summary: feed.opportunity_name,
        sales_rep,
        projected_arr: opportunity_value,
        anticipated_close_date: truncate_date(&feed.close_date).to_string(),
        win_probability,
        projected_tcv: revenue_tcv,
        integration_id: feed.opty_int_id,
        registry_id: feed.registry_id,
        cim_id: feed.cim_id,
        status: feed.opportunity_status,
        customer_name: feed.customer_name,
        territory_owner: feed.territory_owner,
        opportunity_value,
        forecast_type_group: feed.forecast_type_group,
        revenue_line_id: feed.revenue_line_id,
        revenue_type: feed.revenue_type,
        revenue_type_group: feed.revenue_type_group,
        revenue_line_status: feed.revenue_line_status,
        revenue_sales_stage: feed.rev_sales_stage,
        revenue_pipeline: amount("rev_pipeline_k", &feed.rev_pipeline_k),
        revenue_tcv,
        revenue_probability,
        product_class: feed.product_class,
        product_pillar: feed.product_pillar,
        product_line: feed.product_line,
        product_group: feed.product_group,
        product_name: feed.product_name,
        product_description,
        workload_amount: amount("opp_total_workload_k", &feed.opp_total_workload_k),
        consumption_start_date: truncate_date(&feed.consumption_start_date).to_string(),
        consumption_ramp_months: numeric_or_zero(
            kind,
            "cons_ramp_months",
            ordinal,
            &feed.cons_ramp_months,
        ),
        l2_territory_name: feed.level_2_territory_name,
        l3_territory_name: feed.level_3_territory_name,
        l2_territory_email: feed.level_2_territory_owner_email,
        l3_territory_email: feed.level_3_territory_owner_email,
        opportunity_id: feed.opportunity_id,
    }
}

#[async_trait]
impl RecordSink for OpportunitySink {
    type Record = OpportunityFeed;

    const KIND: DataKind = DataKind::Opportunity;

    async fn apply(
        &mut self,
        tx: &mut dyn LoadTransaction,
        ordinal: usize,
        feed: OpportunityFeed,
    ) -> Result<bool, StoreError> {
        let row = to_row(feed, ordinal);

        let staged = row.is_stageable();
        if staged {
            tx.insert_lookup_opportunity(ordinal as i64, &row).await?;
        }

        if tx.update_opportunity(&row).await? == 0 {
            self.master_misses += 1;
        }
        tx.update_workload(&row).await?;
        Ok(staged)
    }

    async fn finish(&mut self) -> Result<Option<usize>, crate::errors::LoadError> {
        if self.master_misses > 0 {
            tracing::debug!(
                misses = self.master_misses,
                "opportunities without a master row"
            );
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, IdentityConfig, SchemaMap};
    use crate::loader::Loader;
    use crate::testutils::{MasterOpportunity, MemoryStore};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    fn loader(dir: &Path, store: &MemoryStore) -> Loader {
        let config = Config {
            chunk_dir: dir.to_path_buf(),
            max_chunk_bytes: 1 << 20,
            identity_target: "cto-common".into(),
            sync_target: "ecal-prod".into(),
            identity: IdentityConfig {
                snapshot_path: dir.join("identities.json"),
                directory_suffix: String::new(),
                manager_leads: Vec::new(),
            },
        };
        let schemas = SchemaMap::from([("cto-common", "CTO_COMMON"), ("ecal-prod", "ECAL")]);
        Loader::new(Arc::new(config), Arc::new(schemas), Arc::new(store.clone()))
    }

    fn feed(id: &str, status: &str) -> serde_json::Value {
        json!({
            "opportunity_id": id,
            "opportunity_name": format!("{id} migration"),
            "opportunity_owner": "",
            "territory_owner": "owner@x.com",
            "opportunity_status": status,
            "close_date": "2021-06-30T00:00:00",
            "opp_probability": "40",
            "rev_probability": "",
            "oppty_amount_k": "12.5",
            "rev_tcv_k": "150",
            "rev_pipeline_k": "7",
            "opp_total_workload_k": "3",
            "cons_ramp_months": "6",
            "revenue_line_id": format!("{id}-RL1"),
            "rev_sales_stage": "Qualify",
            "product_group": "Compute"
        })
    }

    #[test]
    fn row_derivations() {
        let feed: OpportunityFeed = serde_json::from_value(feed("O1", "Open")).unwrap();
        let row = to_row(feed, 3);
        assert_eq!(row.sales_rep, "owner@x.com");
        assert_eq!(row.revenue_probability, 40);
        assert_eq!(row.win_probability, 40);
        assert_eq!(row.projected_tcv, 150000.0);
        assert_eq!(row.revenue_tcv, 150000.0);
        assert_eq!(row.projected_arr, 12500.0);
        assert_eq!(row.opportunity_value, 12500.0);
        assert_eq!(row.revenue_pipeline, 7000.0);
        assert_eq!(row.workload_amount, 3000.0);
        assert_eq!(row.consumption_ramp_months, 6.0);
        assert_eq!(row.anticipated_close_date, "2021-06-30");
        assert_eq!(row.product_description, "Unspecified");
        assert_eq!(row.revenue_sales_stage, "Qualify");
    }

    #[test]
    fn unparseable_amounts_become_zero() {
        let mut value = feed("O1", "Open");
        value["rev_tcv_k"] = json!("abc");
        value["opp_probability"] = json!("n/a");
        value["rev_probability"] = json!("25");
        let row = to_row(serde_json::from_value(value).unwrap(), 1);
        assert_eq!(row.projected_tcv, 0.0);
        assert_eq!(row.win_probability, 0);
        assert_eq!(row.revenue_probability, 25);
    }

    #[tokio::test]
    async fn stages_open_and_won_but_updates_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        for id in ["O1", "O2", "O3"] {
            store.seed_opportunity(
                "ECAL",
                id,
                MasterOpportunity {
                    status: "Open".into(),
                    ..Default::default()
                },
            );
            store.seed_workload("ECAL", id, &format!("{id}-RL1"));
        }
        let body = json!({"items": [feed("O1", "Open"), feed("O2", "Lost"), feed("O3", "Won")]});
        std::fs::write(dir.path().join("opportunity.json"), body.to_string()).unwrap();

        let report = loader(dir.path(), &store)
            .load(DataKind::Opportunity)
            .await
            .unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.staged, 2);
        assert_eq!(report.schema, "ECAL");

        let staged = store.staged_opportunities("ECAL");
        let ids: Vec<_> = staged
            .iter()
            .map(|(id, row)| (*id, row.opportunity_id.as_str()))
            .collect();
        assert_eq!(ids, [(1, "O1"), (3, "O3")]);

        let closed = store.opportunity("ECAL", "O2").unwrap();
        assert_eq!(closed.status, "Lost");
        assert_eq!(closed.projected_tcv, 150000.0);
        assert_eq!(closed.sales_rep, "owner@x.com");
        assert_eq!(closed.close_date, "2021-06-30");

        let workload = store.workload("ECAL", "O2", "O2-RL1").unwrap();
        assert_eq!(workload.description, "Unspecified");
        assert_eq!(workload.workload_type, "Compute");
        assert_eq!(workload.ramp_months, 6.0);
    }

    #[tokio::test]
    async fn rerun_replaces_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let path = dir.path().join("opportunity.json");

        let first = json!({"items": [feed("O1", "Open"), feed("O2", "Open")]});
        std::fs::write(&path, first.to_string()).unwrap();
        loader(dir.path(), &store).load(DataKind::Opportunity).await.unwrap();
        assert_eq!(store.staged_opportunities("ECAL").len(), 2);

        let second = json!({"items": [feed("O9", "Won")]});
        std::fs::write(&path, second.to_string()).unwrap();
        loader(dir.path(), &store).load(DataKind::Opportunity).await.unwrap();

        let staged = store.staged_opportunities("ECAL");
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].1.opportunity_id, "O9");
    }

    #[tokio::test]
    async fn bad_record_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.seed_opportunity("ECAL", "O1", MasterOpportunity::default());
        let path = dir.path().join("opportunity.json");

        std::fs::write(&path, json!({"items": [feed("O5", "Open")]}).to_string()).unwrap();
        loader(dir.path(), &store).load(DataKind::Opportunity).await.unwrap();
        let before = store.staged_opportunities("ECAL");

        let broken = format!(
            r#"{{"items":[{},{{"opportunity_id": }}]}}"#,
            feed("O1", "Lost")
        );
        std::fs::write(&path, broken).unwrap();
        let err = loader(dir.path(), &store)
            .load(DataKind::Opportunity)
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), "decode_failed");

        assert_eq!(store.staged_opportunities("ECAL"), before);
        assert_eq!(store.opportunity("ECAL", "O1").unwrap(), MasterOpportunity::default());
    }
}
