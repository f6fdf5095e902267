use super::{RecordSink, numeric_or_zero};
use crate::config::IdentityConfig;
use crate::errors::{LoadError, StoreError};
use crate::kind::DataKind;
use crate::records::Employee;
use crate::snapshot::{IdentitySnapshot, SnapshotEntry};
use crate::store::LoadTransaction;
use crate::transform::{
    Numeric, email_to_directory_name, manager_lead_tag, split_full_name, truncate_date,
};
use async_trait::async_trait;

/// Line-of-business values marking employees who have left the company.
const DEPARTED_LOBS: [&str; 2] = ["X-LEFT ORACLE", "P-LEFT ORACLE"];

/// Loads the employee feed and collects the identity snapshot for employees
/// under a configured manager lead.
pub struct IdentitySink {
    config: IdentityConfig,
    snapshot: IdentitySnapshot,
}

impl IdentitySink {
    pub fn new(config: IdentityConfig) -> Self {
        IdentitySink {
            config,
            snapshot: IdentitySnapshot::default(),
        }
    }
}

/// Rewrites unparseable numeric columns to `0` so the row still inserts.
/// Empty values are kept and stored as NULL.
fn normalize_numerics(employee: &mut Employee, ordinal: usize) {
    for (field, value) in [
        ("num_directs", &mut employee.num_directs),
        ("num_users", &mut employee.num_users),
        ("chain_level", &mut employee.chain_level),
        ("hier_level", &mut employee.hier_level),
        ("top_mgr_seq", &mut employee.top_mgr_seq),
    ] {
        if let Numeric::Unparseable = Numeric::<f64>::parse(value) {
            let zero: i64 = numeric_or_zero(DataKind::Identity, field, ordinal, value);
            *value = zero.to_string();
        }
    }
}

fn normalize(employee: &mut Employee, ordinal: usize) {
    for date in [
        &mut employee.start_date,
        &mut employee.end_date,
        &mut employee.created_on,
        &mut employee.updated_on,
        &mut employee.left_company_on,
        &mut employee.inactive,
    ] {
        let truncated = truncate_date(date).len();
        date.truncate(truncated);
    }
    if employee.lob_tag_parent.is_empty() {
        employee.lob_tag_parent = employee.lob_tag.clone();
    }
    normalize_numerics(employee, ordinal);
}

/// Departed employees and placeholder rows with no numeric id or no address
/// are not loaded.
fn is_excluded(employee: &Employee) -> bool {
    DEPARTED_LOBS.contains(&employee.lob.as_str())
        || !matches!(Numeric::<f64>::parse(&employee.id), Numeric::Parsed(_))
        || employee.employee_email_address.trim().is_empty()
}

fn snapshot_entry(employee: &Employee, app_map: &str, suffix: &str, ordinal: usize) -> SnapshotEntry {
    let (given, surname) = split_full_name(&employee.employee_full_name);
    SnapshotEntry {
        id: employee.employee_email_address.clone(),
        sn: surname.to_string(),
        manager: email_to_directory_name(&employee.mgr, suffix),
        mail: employee.employee_email_address.clone(),
        givenname: given.to_string(),
        displayname: employee.employee_full_name.clone(),
        mgr_chain: employee.mgr_chain.clone(),
        lob: employee.lob_tag.clone(),
        lob_parent: employee.lob_tag_parent.clone(),
        num_directs: numeric_or_zero(DataKind::Identity, "num_directs", ordinal, &employee.num_directs),
        app_map: app_map.to_string(),
    }
}

#[async_trait]
impl RecordSink for IdentitySink {
    type Record = Employee;

    const KIND: DataKind = DataKind::Identity;

    async fn apply(
        &mut self,
        tx: &mut dyn LoadTransaction,
        ordinal: usize,
        mut employee: Employee,
    ) -> Result<bool, StoreError> {
        normalize(&mut employee, ordinal);
        if is_excluded(&employee) {
            tracing::debug!(ordinal, lob = %employee.lob, "skipping employee");
            return Ok(false);
        }

        tx.insert_employee(&employee).await?;

        if let Some(app_map) = manager_lead_tag(&employee.mgr_chain, &self.config.manager_leads) {
            let entry = snapshot_entry(&employee, app_map, &self.config.directory_suffix, ordinal);
            self.snapshot.items.push(entry);
        }
        Ok(true)
    }

    async fn finish(&mut self) -> Result<Option<usize>, LoadError> {
        let path = &self.config.snapshot_path;
        self.snapshot
            .write_to(path)
            .await
            .map_err(|source| LoadError::Snapshot {
                path: path.clone(),
                source,
            })?;
        tracing::info!(
            path = %path.display(),
            entries = self.snapshot.items.len(),
            "identity snapshot written"
        );
        Ok(Some(self.snapshot.items.len()))
    }
}
