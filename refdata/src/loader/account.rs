use super::RecordSink;
use crate::errors::StoreError;
use crate::kind::DataKind;
use crate::records::{AccountFeed, AccountRow};
use crate::store::LoadTransaction;
use crate::transform::{BusinessSegment, tokenize_se_list};
use async_trait::async_trait;

#[derive(Default)]
pub struct AccountSink;

/// Returns `None` for pay-as-you-go accounts, which are never staged.
pub(crate) fn to_row(feed: AccountFeed) -> Option<AccountRow> {
    let segment = BusinessSegment::collapse(&feed.business_segment);
    if segment.is_excluded() {
        return None;
    }
    Some(AccountRow {
        cim_id: feed.cim_id,
        cim_id_parent: feed.cim_id_parent,
        cim_id_reg: feed.cim_id_reg,
        account_name: feed.account_name,
        business_segment: segment.as_str().to_string(),
        end_user_registry_id: feed.end_user_registry_id,
        global_registry_id: feed.global_registry_id,
        registry_id_list: feed.registry_id_list,
        nac_se_team: tokenize_se_list(&feed.nac_se_team),
        nat_se_team: tokenize_se_list(&feed.nat_se_team),
    })
}

#[async_trait]
impl RecordSink for AccountSink {
    type Record = AccountFeed;

    const KIND: DataKind = DataKind::Account;

    async fn apply(
        &mut self,
        tx: &mut dyn LoadTransaction,
        ordinal: usize,
        feed: AccountFeed,
    ) -> Result<bool, StoreError> {
        match to_row(feed) {
            Some(row) => {
                tx.insert_lookup_account(ordinal as i64, &row).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, IdentityConfig, SchemaMap};
    use crate::loader::Loader;
    use crate::testutils::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn loads_accounts_without_paygo() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let config = Config {
            chunk_dir: dir.path().to_path_buf(),
            max_chunk_bytes: 1 << 20,
            identity_target: "ecal-prod".into(),
            sync_target: "ecal-prod".into(),
            identity: IdentityConfig {
                snapshot_path: dir.path().join("identities.json"),
                directory_suffix: String::new(),
                manager_leads: Vec::new(),
            },
        };
        let loader = Loader::new(
            Arc::new(config),
            Arc::new(SchemaMap::from([("ecal-prod", "ECAL")])),
            Arc::new(store.clone()),
        );

        let body = json!({"items": [
            {"cim_id": "C1", "account_name": "Acme", "bus_segment_str": "NATD ISV:NATD Public Sector",
             "nac_SE_Team": "a@x.com - ECA, b@y.com - Hub SE", "nat_SE_Team": "null"},
            {"cim_id": "C2", "account_name": "HQ", "bus_segment_str": "NAC HQ"},
            {"cim_id": "C3", "account_name": "Foo", "bus_segment_str": "Foo Bar", "nac_SE_Team": null}
        ]});
        std::fs::write(dir.path().join("account.json"), body.to_string()).unwrap();

        let report = loader.load(DataKind::Account).await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.staged, 2);
        assert_eq!(report.snapshot_entries, None);

        let staged = store.staged_accounts("ECAL");
        assert_eq!(staged.len(), 2);
        let (id, acme) = &staged[0];
        assert_eq!(*id, 1);
        assert_eq!(acme.business_segment, "ISV");
        assert_eq!(acme.nac_se_team, "a@x.com-ECA,b@y.com-Hub SE");
        assert_eq!(acme.nat_se_team, "");
        let (id, foo) = &staged[1];
        assert_eq!(*id, 3);
        assert_eq!(foo.business_segment, "SMB");
    }

    #[test]
    fn paygo_is_dropped() {
        let feed = AccountFeed {
            business_segment: "NAC HQ".into(),
            ..Default::default()
        };
        assert!(to_row(feed).is_none());
    }
}
