//! Database seam used by the loaders and the report endpoints.

use crate::errors::StoreError;
use crate::kind::StagingTable;
use crate::records::{AccountRow, Employee, OpportunityRow};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type JsonRow = Map<String, Value>;

#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Opens a transaction whose statements target `schema`.
    async fn begin(&self, schema: &str) -> Result<Box<dyn LoadTransaction>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn staging_count(&self, schema: &str, table: StagingTable) -> Result<i64, StoreError>;

    /// Runs a read-only query with positional text parameters and returns each
    /// row as a JSON object keyed by column name. `order_by` names output
    /// columns of `sql` and fixes the order of the returned rows.
    async fn query_json(
        &self,
        sql: &str,
        order_by: Option<&str>,
        binds: &[String],
    ) -> Result<Vec<JsonRow>, StoreError>;
}

/// One load run's unit of work. Dropping it without calling `commit` rolls back.
#[async_trait]
pub trait LoadTransaction: Send {
    /// Removes every row from `table`, returning how many were deleted.
    async fn clear_staging(&mut self, table: StagingTable) -> Result<u64, StoreError>;

    async fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError>;

    async fn insert_lookup_opportunity(
        &mut self,
        id: i64,
        row: &OpportunityRow,
    ) -> Result<(), StoreError>;

    /// Refreshes the master opportunity row, returning the number of rows touched.
    async fn update_opportunity(&mut self, row: &OpportunityRow) -> Result<u64, StoreError>;

    /// Refreshes the workload matching the opportunity's revenue line.
    async fn update_workload(&mut self, row: &OpportunityRow) -> Result<u64, StoreError>;

    async fn insert_lookup_account(&mut self, id: i64, row: &AccountRow) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
