//! In-memory [`ReferenceStore`] with transactional semantics: a transaction
//! works on a copy of the tables taken at `begin` and publishes it on commit.

use crate::errors::StoreError;
use crate::kind::StagingTable;
use crate::records::{AccountRow, Employee, OpportunityRow};
use crate::store::{JsonRow, LoadTransaction, ReferenceStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum StagedRow {
    Employee(Employee),
    Opportunity { id: i64, row: OpportunityRow },
    Account { id: i64, row: AccountRow },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterOpportunity {
    pub summary: String,
    pub sales_rep: String,
    pub projected_arr: f64,
    pub projected_tcv: f64,
    pub status: String,
    pub close_date: String,
    pub win_probability: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterWorkload {
    pub description: String,
    pub consumption_start_date: String,
    pub ramp_months: f64,
    pub workload_type: String,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    staging: HashMap<(String, StagingTable), Vec<StagedRow>>,
    opportunities: HashMap<(String, String), MasterOpportunity>,
    workloads: HashMap<(String, String, String), MasterWorkload>,
}

/// A call to `query_json`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub sql: String,
    pub order_by: Option<String>,
    pub binds: Vec<String>,
}

/// Where a [`MemoryStore`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    /// The n-th staging insert (1-based) within a transaction.
    Insert(usize),
    Commit,
}

#[derive(Default)]
struct State {
    tables: Tables,
    fail_point: Option<FailPoint>,
    ping_fails: bool,
    query_rows: Vec<JsonRow>,
    query_error: Option<StoreError>,
    queries: Vec<RecordedQuery>,
    commit_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.state().fail_point = Some(point);
    }

    pub fn clear_failure(&self) {
        self.state().fail_point = None;
    }

    pub fn set_ping_fails(&self, fails: bool) {
        self.state().ping_fails = fails;
    }

    /// Holds every commit for `delay`, widening the window in which overlapping runs would show.
    pub fn set_commit_delay(&self, delay: Duration) {
        self.state().commit_delay = Some(delay);
    }

    pub fn set_query_rows(&self, rows: Vec<JsonRow>) {
        self.state().query_rows = rows;
    }

    pub fn set_query_error(&self, error: StoreError) {
        self.state().query_error = Some(error);
    }

    /// Every query passed to `query_json`, oldest first.
    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.state().queries.clone()
    }

    pub fn seed_opportunity(&self, schema: &str, opportunity_id: &str, master: MasterOpportunity) {
        self.state()
            .tables
            .opportunities
            .insert((schema.into(), opportunity_id.into()), master);
    }

    pub fn seed_workload(&self, schema: &str, opportunity_id: &str, revenue_line_id: &str) {
        self.state().tables.workloads.insert(
            (schema.into(), opportunity_id.into(), revenue_line_id.into()),
            MasterWorkload::default(),
        );
    }

    pub fn seed_staging(&self, schema: &str, table: StagingTable, rows: Vec<StagedRow>) {
        self.state()
            .tables
            .staging
            .insert((schema.into(), table), rows);
    }

    pub fn staged(&self, schema: &str, table: StagingTable) -> Vec<StagedRow> {
        self.state()
            .tables
            .staging
            .get(&(schema.to_string(), table))
            .cloned()
            .unwrap_or_default()
    }

    pub fn staged_employees(&self, schema: &str) -> Vec<Employee> {
        self.staged(schema, StagingTable::Employees)
            .into_iter()
            .filter_map(|row| match row {
                StagedRow::Employee(employee) => Some(employee),
                _ => None,
            })
            .collect()
    }

    pub fn staged_opportunities(&self, schema: &str) -> Vec<(i64, OpportunityRow)> {
        self.staged(schema, StagingTable::LookupOpportunity)
            .into_iter()
            .filter_map(|row| match row {
                StagedRow::Opportunity { id, row } => Some((id, row)),
                _ => None,
            })
            .collect()
    }

    pub fn staged_accounts(&self, schema: &str) -> Vec<(i64, AccountRow)> {
        self.staged(schema, StagingTable::LookupAccount)
            .into_iter()
            .filter_map(|row| match row {
                StagedRow::Account { id, row } => Some((id, row)),
                _ => None,
            })
            .collect()
    }

    pub fn opportunity(&self, schema: &str, opportunity_id: &str) -> Option<MasterOpportunity> {
        self.state()
            .tables
            .opportunities
            .get(&(schema.to_string(), opportunity_id.to_string()))
            .cloned()
    }

    pub fn workload(
        &self,
        schema: &str,
        opportunity_id: &str,
        revenue_line_id: &str,
    ) -> Option<MasterWorkload> {
        self.state()
            .tables
            .workloads
            .get(&(
                schema.to_string(),
                opportunity_id.to_string(),
                revenue_line_id.to_string(),
            ))
            .cloned()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Highest number of transactions that were open at the same time.
    pub fn max_concurrent_transactions(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn begin(&self, schema: &str) -> Result<Box<dyn LoadTransaction>, StoreError> {
        let (tables, fail_point, commit_delay) = {
            let state = self.state();
            if state.fail_point == Some(FailPoint::Begin) {
                return Err(StoreError::Database("injected begin failure".into()));
            }
            (state.tables.clone(), state.fail_point, state.commit_delay)
        };
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            schema: schema.to_string(),
            tables,
            fail_point,
            commit_delay,
            inserts: 0,
            touched_staging: HashSet::new(),
            touched_opportunities: HashSet::new(),
            touched_workloads: HashSet::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.state().ping_fails {
            return Err(StoreError::Database("injected ping failure".into()));
        }
        Ok(())
    }

    async fn staging_count(&self, schema: &str, table: StagingTable) -> Result<i64, StoreError> {
        let state = self.state();
        if state.ping_fails {
            return Err(StoreError::Database("injected count failure".into()));
        }
        let count = state
            .tables
            .staging
            .get(&(schema.to_string(), table))
            .map_or(0, Vec::len);
        Ok(count as i64)
    }

    async fn query_json(
        &self,
        sql: &str,
        order_by: Option<&str>,
        binds: &[String],
    ) -> Result<Vec<JsonRow>, StoreError> {
        let mut state = self.state();
        state.queries.push(RecordedQuery {
            sql: sql.to_string(),
            order_by: order_by.map(str::to_string),
            binds: binds.to_vec(),
        });
        if let Some(error) = state.query_error.clone() {
            return Err(error);
        }
        Ok(state.query_rows.clone())
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    schema: String,
    tables: Tables,
    fail_point: Option<FailPoint>,
    commit_delay: Option<Duration>,
    inserts: usize,
    touched_staging: HashSet<(String, StagingTable)>,
    touched_opportunities: HashSet<(String, String)>,
    touched_workloads: HashSet<(String, String, String)>,
}

impl MemoryTransaction {
    fn stage(&mut self, table: StagingTable, row: StagedRow) -> Result<(), StoreError> {
        self.inserts += 1;
        if self.fail_point == Some(FailPoint::Insert(self.inserts)) {
            return Err(StoreError::Database(format!(
                "injected failure on insert {}",
                self.inserts
            )));
        }
        let key = (self.schema.clone(), table);
        self.touched_staging.insert(key.clone());
        self.tables.staging.entry(key).or_default().push(row);
        Ok(())
    }
}

/// Mirrors the `NULLIF($n, '')::numeric` cast of the Postgres store.
fn check_numeric(value: &str) -> Result<(), StoreError> {
    if value.is_empty() || value.trim().parse::<f64>().is_ok_and(f64::is_finite) {
        return Ok(());
    }
    Err(StoreError::Database(format!(
        "invalid input syntax for type numeric: {value:?}"
    )))
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.store.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LoadTransaction for MemoryTransaction {
    async fn clear_staging(&mut self, table: StagingTable) -> Result<u64, StoreError> {
        let key = (self.schema.clone(), table);
        let removed = self.tables.staging.remove(&key).map_or(0, |rows| rows.len());
        self.touched_staging.insert(key);
        Ok(removed as u64)
    }

    async fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        for value in [
            &employee.id,
            &employee.num_directs,
            &employee.num_users,
            &employee.chain_level,
            &employee.hier_level,
            &employee.top_mgr_seq,
        ] {
            check_numeric(value)?;
        }
        self.stage(StagingTable::Employees, StagedRow::Employee(employee.clone()))
    }

    async fn insert_lookup_opportunity(
        &mut self,
        id: i64,
        row: &OpportunityRow,
    ) -> Result<(), StoreError> {
        self.stage(
            StagingTable::LookupOpportunity,
            StagedRow::Opportunity {
                id,
                row: row.clone(),
            },
        )
    }

    async fn update_opportunity(&mut self, row: &OpportunityRow) -> Result<u64, StoreError> {
        let key = (self.schema.clone(), row.opportunity_id.clone());
        match self.tables.opportunities.get_mut(&key) {
            Some(master) => {
                self.touched_opportunities.insert(key.clone());
                *master = MasterOpportunity {
                    summary: row.summary.clone(),
                    sales_rep: row.sales_rep.clone(),
                    projected_arr: row.projected_arr,
                    projected_tcv: row.projected_tcv,
                    status: row.status.clone(),
                    close_date: row.anticipated_close_date.clone(),
                    win_probability: row.win_probability,
                };
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_workload(&mut self, row: &OpportunityRow) -> Result<u64, StoreError> {
        let key = (
            self.schema.clone(),
            row.opportunity_id.clone(),
            row.revenue_line_id.clone(),
        );
        match self.tables.workloads.get_mut(&key) {
            Some(workload) => {
                self.touched_workloads.insert(key.clone());
                *workload = MasterWorkload {
                    description: row.product_description.clone(),
                    consumption_start_date: row.consumption_start_date.clone(),
                    ramp_months: row.consumption_ramp_months,
                    workload_type: row.product_group.clone(),
                };
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn insert_lookup_account(&mut self, id: i64, row: &AccountRow) -> Result<(), StoreError> {
        self.stage(
            StagingTable::LookupAccount,
            StagedRow::Account {
                id,
                row: row.clone(),
            },
        )
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if let Some(delay) = self.commit_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_point == Some(FailPoint::Commit) {
            return Err(StoreError::Database("injected commit failure".into()));
        }
        // Publish only what this transaction wrote so concurrent runs on other tables survive.
        let mut state = self.store.state();
        for key in self.touched_staging.drain() {
            match self.tables.staging.remove(&key) {
                Some(rows) => state.tables.staging.insert(key, rows),
                None => state.tables.staging.remove(&key),
            };
        }
        for key in self.touched_opportunities.drain() {
            if let Some(master) = self.tables.opportunities.remove(&key) {
                state.tables.opportunities.insert(key, master);
            }
        }
        for key in self.touched_workloads.drain() {
            if let Some(workload) = self.tables.workloads.remove(&key) {
                state.tables.workloads.insert(key, workload);
            }
        }
        drop(state);
        self.store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
