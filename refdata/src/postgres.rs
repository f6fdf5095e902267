use crate::config::DatabaseConfig;
use crate::errors::StoreError;
use crate::kind::StagingTable;
use crate::records::{AccountRow, Employee, OpportunityRow};
use crate::store::{JsonRow, LoadTransaction, ReferenceStore};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;

const AUDIT_USER: &str = "bizlogic_loader";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool without opening a connection; the first query connects.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn begin(&self, schema: &str) -> Result<Box<dyn LoadTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLoadTransaction {
            tx,
            schema: schema.to_string(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn staging_count(&self, schema: &str, table: StagingTable) -> Result<i64, StoreError> {
        let sql = format!("SELECT count(*) FROM {schema}.{}", table.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn query_json(
        &self,
        sql: &str,
        order_by: Option<&str>,
        binds: &[String],
    ) -> Result<Vec<JsonRow>, StoreError> {
        let wrapped = row_to_json(sql, order_by);
        let mut query = sqlx::query_scalar::<_, String>(&wrapped);
        for bind in binds {
            query = query.bind(bind);
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|text| {
                serde_json::from_str::<JsonRow>(&text)
                    .map_err(|e| StoreError::UnexpectedResult(e.to_string()))
            })
            .collect()
    }
}

// Ordering inside the subquery is not preserved by the outer select, so it
// is applied here.
fn row_to_json(sql: &str, order_by: Option<&str>) -> String {
    match order_by {
        Some(order_by) => format!("SELECT row_to_json(q)::text FROM ({sql}) q ORDER BY {order_by}"),
        None => format!("SELECT row_to_json(q)::text FROM ({sql}) q"),
    }
}

struct PgLoadTransaction {
    tx: Transaction<'static, Postgres>,
    schema: String,
}

#[async_trait]
impl LoadTransaction for PgLoadTransaction {
    async fn clear_staging(&mut self, table: StagingTable) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {}.{}", self.schema, table.table_name());
        let result = sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn insert_employee(&mut self, e: &Employee) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {}.employees (
                id, employee_email_address, role, status, record_type, title, mgr, lob,
                cost_center, region, country, start_date, end_date, created_on, created_by,
                updated_on, updated_by, employee_full_name, ldap_status, evp, evp_direct,
                never_process_ldap, do_not_update_from_ldap, lock_region, left_company_on,
                inactive, mgr_level, state, city, mgr_chain, top_mgr_dir_minus_1,
                top_mgr_dir_minus_2, top_mgr_dir_minus_3, top_mgr_dir_minus_4, num_directs,
                num_users, olduid, chain_level, oracle_uid, lob_detail, hier_level,
                top_mgr_seq, lob_tag, lob_tag_parent
            ) VALUES (
                NULLIF($1, '')::numeric, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                NULLIF($12, '')::date, NULLIF($13, '')::date, NULLIF($14, '')::date, $15,
                NULLIF($16, '')::date, $17, $18, $19, $20, $21, $22, $23, $24,
                NULLIF($25, '')::date, NULLIF($26, '')::date, $27, $28, $29, $30, $31,
                $32, $33, $34, NULLIF($35, '')::numeric, NULLIF($36, '')::numeric, $37,
                NULLIF($38, '')::numeric, $39, $40, NULLIF($41, '')::numeric,
                NULLIF($42, '')::numeric, $43, $44
            )",
            self.schema
        );
        sqlx::query(&sql)
            .bind(&e.id)
            .bind(&e.employee_email_address)
            .bind(&e.role)
            .bind(&e.status)
            .bind(&e.record_type)
            .bind(&e.title)
            .bind(&e.mgr)
            .bind(&e.lob)
            .bind(&e.cost_center)
            .bind(&e.region)
            .bind(&e.country)
            .bind(&e.start_date)
            .bind(&e.end_date)
            .bind(&e.created_on)
            .bind(&e.created_by)
            .bind(&e.updated_on)
            .bind(&e.updated_by)
            .bind(&e.employee_full_name)
            .bind(&e.ldap_status)
            .bind(&e.evp)
            .bind(&e.evp_direct)
            .bind(&e.never_process_ldap)
            .bind(&e.do_not_update_from_ldap)
            .bind(&e.lock_region)
            .bind(&e.left_company_on)
            .bind(&e.inactive)
            .bind(&e.mgr_level)
            .bind(&e.state)
            .bind(&e.city)
            .bind(&e.mgr_chain)
            .bind(&e.top_mgr_dir_minus_1)
            .bind(&e.top_mgr_dir_minus_2)
            .bind(&e.top_mgr_dir_minus_3)
            .bind(&e.top_mgr_dir_minus_4)
            .bind(&e.num_directs)
            .bind(&e.num_users)
            .bind(&e.olduid)
            .bind(&e.chain_level)
            .bind(&e.oracle_uid)
            .bind(&e.lob_detail)
            .bind(&e.hier_level)
            .bind(&e.top_mgr_seq)
            .bind(&e.lob_tag)
            .bind(&e.lob_tag_parent)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_lookup_opportunity(
        &mut self,
        id: i64,
        row: &OpportunityRow,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {}.lookupopportunity (
                id, creationdate, lastupdatedate, createdby, lastupdatedby, abcschangenumber,
                opportunityid, summary, salesrep, projectedarr, anticipatedclosedate,
                winprobability, projectedtcv, integrationid, registryid, cimid,
                opportunitystatus, customername, territoryowner, opportunityvalue,
                forecasttypegroup, revenuelineid, revenuetype, revenuetypegroup,
                revenuelinestatus, revenuesalesstage, revenuepipelinek, revenuetcvk,
                revenueprobability, productclass, productpillar, productline, productgroup,
                productname, productdescription, workloadamount, consumptionstartdate,
                consumptionrampmonths, l2territoryname, l3territoryname, l2territoryemail,
                l3territoryemail
            ) VALUES (
                $1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, $2, $2, NULL,
                $3, $4, $5, $6, NULLIF($7, '')::date, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
                $31, $32, NULLIF($33, '')::date, $34, $35, $36, $37, $38
            )",
            self.schema
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(AUDIT_USER)
            .bind(&row.opportunity_id)
            .bind(&row.summary)
            .bind(&row.sales_rep)
            .bind(row.projected_arr)
            .bind(&row.anticipated_close_date)
            .bind(row.win_probability)
            .bind(row.projected_tcv)
            .bind(&row.integration_id)
            .bind(&row.registry_id)
            .bind(&row.cim_id)
            .bind(&row.status)
            .bind(&row.customer_name)
            .bind(&row.territory_owner)
            .bind(row.opportunity_value)
            .bind(&row.forecast_type_group)
            .bind(&row.revenue_line_id)
            .bind(&row.revenue_type)
            .bind(&row.revenue_type_group)
            .bind(&row.revenue_line_status)
            .bind(&row.revenue_sales_stage)
            .bind(row.revenue_pipeline)
            .bind(row.revenue_tcv)
            .bind(row.revenue_probability)
            .bind(&row.product_class)
            .bind(&row.product_pillar)
            .bind(&row.product_line)
            .bind(&row.product_group)
            .bind(&row.product_name)
            .bind(&row.product_description)
            .bind(row.workload_amount)
            .bind(&row.consumption_start_date)
            .bind(row.consumption_ramp_months)
            .bind(&row.l2_territory_name)
            .bind(&row.l3_territory_name)
            .bind(&row.l2_territory_email)
            .bind(&row.l3_territory_email)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_opportunity(&mut self, row: &OpportunityRow) -> Result<u64, StoreError> {
        let sql = format!(
            "UPDATE {}.opportunity SET
                summary = $1, salesrep = $2, projectedarr = $3, projectedtcv = $4,
                opportunitystatus = $5, anticipatedclosedate = NULLIF($6, '')::date,
                winprobability = $7, lastupdatedby = $8, lastupdatedate = CURRENT_TIMESTAMP
             WHERE opportunityid = $9",
            self.schema
        );
        let result = sqlx::query(&sql)
            .bind(&row.summary)
            .bind(&row.sales_rep)
            .bind(row.projected_arr)
            .bind(row.projected_tcv)
            .bind(&row.status)
            .bind(&row.anticipated_close_date)
            .bind(row.win_probability)
            .bind(AUDIT_USER)
            .bind(&row.opportunity_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_workload(&mut self, row: &OpportunityRow) -> Result<u64, StoreError> {
        let schema = &self.schema;
        let sql = format!(
            "UPDATE {schema}.opportunityworkload SET
                workloaddescription = $1, consumptionstartdate = NULLIF($2, '')::date,
                consumptionrampmonths = $3, workloadtype = $4, lastupdatedby = $5,
                lastupdatedate = CURRENT_TIMESTAMP
             WHERE id = (
                SELECT w.id FROM {schema}.opportunityworkload w
                INNER JOIN {schema}.opportunity o ON o.id = w.opportunity
                WHERE o.opportunityid = $6 AND w.workloadidentifier = $7
             )"
        );
        let result = sqlx::query(&sql)
            .bind(&row.product_description)
            .bind(&row.consumption_start_date)
            .bind(row.consumption_ramp_months)
            .bind(&row.product_group)
            .bind(AUDIT_USER)
            .bind(&row.opportunity_id)
            .bind(&row.revenue_line_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_lookup_account(&mut self, id: i64, row: &AccountRow) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {}.lookupaccount (
                id, creationdate, lastupdatedate, createdby, lastupdatedby, abcschangenumber,
                cimid, cimparentid, accountname, businesssegment, enduserregistryid,
                globalregistryid, registryidlist, nacseteam, natseteam, cimidreg
            ) VALUES (
                $1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, $2, $2, NULL,
                $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
            )",
            self.schema
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(AUDIT_USER)
            .bind(&row.cim_id)
            .bind(&row.cim_id_parent)
            .bind(&row.account_name)
            .bind(&row.business_segment)
            .bind(&row.end_user_registry_id)
            .bind(&row.global_registry_id)
            .bind(&row.registry_id_list)
            .bind(&row.nac_se_team)
            .bind(&row.nat_se_team)
            .bind(&row.cim_id_reg)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
