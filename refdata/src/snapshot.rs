//! The identity snapshot consumed by the directory synchronization job.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

pub use crate::files::replace_file;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: String,
    pub sn: String,
    pub manager: String,
    pub mail: String,
    pub givenname: String,
    pub displayname: String,
    pub mgr_chain: String,
    pub lob: String,
    pub lob_parent: String,
    pub num_directs: i64,
    pub app_map: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub items: Vec<SnapshotEntry>,
}

impl IdentitySnapshot {
    pub async fn write_to(&self, path: &Path) -> io::Result<()> {
        let contents = serde_json::to_vec(self).map_err(io::Error::other)?;
        replace_file(path, &contents).await
    }
}

pub async fn read_raw(path: &Path) -> io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> SnapshotEntry {
        SnapshotEntry {
            id: id.into(),
            sn: "Doe".into(),
            manager: "cn=BOSS,l=amer,dc=oracle,dc=com".into(),
            mail: id.into(),
            givenname: "Jane \"JJ\"".into(),
            displayname: "Jane Doe".into(),
            mgr_chain: "boss@x.com".into(),
            lob: "CTO".into(),
            lob_parent: "CTO".into(),
            num_directs: 3,
            app_map: "ECAL".into(),
        }
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        let snapshot = IdentitySnapshot {
            items: vec![entry("a@x.com")],
        };
        snapshot.write_to(&path).await.unwrap();

        let raw = read_raw(&path).await.unwrap();
        let parsed: IdentitySnapshot = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed, snapshot);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn upload_racing_loader_keeps_a_whole_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        let uploaded = serde_json::to_vec(&IdentitySnapshot {
            items: vec![entry("up@x.com"); 500],
        })
        .unwrap();
        let loaded = IdentitySnapshot {
            items: vec![entry("load@x.com"); 500],
        };

        let upload = {
            let path = path.clone();
            let uploaded = uploaded.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    replace_file(&path, &uploaded).await?;
                }
                Ok::<_, io::Error>(())
            })
        };
        let load = {
            let path = path.clone();
            let loaded = loaded.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    loaded.write_to(&path).await?;
                }
                Ok::<_, io::Error>(())
            })
        };
        upload.await.unwrap().unwrap();
        load.await.unwrap().unwrap();

        let landed: IdentitySnapshot = serde_json::from_slice(&read_raw(&path).await.unwrap()).unwrap();
        assert_eq!(landed.items.len(), 500);
    }

    #[tokio::test]
    async fn empty_snapshot_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        IdentitySnapshot::default().write_to(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"items":[]}"#);
    }

    #[test]
    fn field_order_matches_consumer() {
        let json = serde_json::to_string(&entry("a@x.com")).unwrap();
        assert!(json.starts_with(r#"{"id":"a@x.com","sn":"Doe","manager":"#));
        assert!(json.ends_with(r#""num_directs":3,"app_map":"ECAL"}"#));
    }
}
