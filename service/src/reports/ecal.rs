use super::{Items, column, int, is_truthy, items, run_report, text};
use crate::errors::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use refdata::store::JsonRow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Managers at or below `$1`, for scoping non-admin queries.
const MANAGER_SCOPE: &str = "
    WITH RECURSIVE hierarchy AS (
        SELECT u.useremail FROM %SCHEMA%.user1 u WHERE u.useremail = $1
        UNION
        SELECT u.useremail FROM %SCHEMA%.user1 u INNER JOIN hierarchy h ON u.manager = h.useremail
    ),
    managers AS (
        SELECT h.useremail
        FROM hierarchy h
        INNER JOIN %SCHEMA%.user1 u ON u.useremail = h.useremail
        INNER JOIN %SCHEMA%.roletype r ON u.rolename = r.id
        WHERE r.rolename = 'Manager'
    )";

const SCOPE_FILTER: &str = "WHERE u.useremail = $1 OR u.manager IN (SELECT useremail FROM managers)";

const ACCOUNTS: &str = "
    SELECT DISTINCT a.id AS account_id,
        l.lookupdescription AS lob,
        a.accountname AS account_name,
        a.createdby AS solution_engineer,
        (SELECT count(*) FROM %SCHEMA%.opportunity o WHERE o.account = a.id) AS num_opportunities
    FROM %SCHEMA%.user1 u
    INNER JOIN %SCHEMA%.useraccount ua ON ua.user1 = u.id
    INNER JOIN %SCHEMA%.account a ON a.id = ua.account
    INNER JOIN %SCHEMA%.lookup l ON l.id = a.accountlob AND l.lookuptype = 'LOB'";

const OPPORTUNITIES: &str = "
    SELECT DISTINCT o.id AS id,
        a.id AS account_id,
        a.accountname AS account_name,
        o.opportunityid AS opportunity_id,
        o.summary AS summary,
        COALESCE(o.projectedarr, 0) AS arr,
        COALESCE(o.ecalpercentcomplete, 0) AS ecal_percent,
        COALESCE(stg.stage, 'None') AS latest_ecal_stage,
        TO_CHAR(o.lastupdatedate, 'MM/DD/YYYY') AS last_activity,
        COALESCE(o.pocrequired, 0) AS poc,
        COALESCE(l.lookupdescription, 'None') AS poc_status,
        COALESCE(o.commercialblockers, 0) AS commercial_blockers,
        COALESCE(o.technicalblockers, 0) AS technical_blockers
    FROM %SCHEMA%.user1 u
    INNER JOIN %SCHEMA%.useraccount ua ON ua.user1 = u.id
    INNER JOIN %SCHEMA%.account a ON a.id = ua.account
    INNER JOIN %SCHEMA%.opportunity o ON o.account = a.id
    LEFT OUTER JOIN %SCHEMA%.ecalstage stg ON stg.id = o.lateststagedone
    LEFT OUTER JOIN %SCHEMA%.lookup l ON l.id = o.pocstatus AND l.lookuptype = 'POC_STATUS'";

const ARTIFACTS: &str = "
    SELECT art.id AS id,
        a.accountname AS account,
        o.opportunityid AS opp_id,
        sf.name AS solution_focus,
        ra.name AS artifact_type,
        art.lastupdatedby AS ce,
        TO_CHAR(art.lastupdatedate, 'MM-DD-YYYY') AS uploaded,
        art.location AS location,
        art.lastupdatedate AS uploaded_at
    FROM %SCHEMA%.opportunityartifacts art
    INNER JOIN %SCHEMA%.opportunity o ON art.opportunity = o.id
    INNER JOIN %SCHEMA%.account a ON o.account = a.id
    INNER JOIN %SCHEMA%.opportunitysolutionfocu osf ON osf.opportunity = o.id
    INNER JOIN %SCHEMA%.solutionfocus sf ON sf.id = osf.solutionfocus
    INNER JOIN %SCHEMA%.requiredartifacts ra ON art.artifact = ra.id
    WHERE art.lastupdatedate > CURRENT_DATE - INTERVAL '180 days'";

const WORKLOADS: &str = "
    SELECT DISTINCT o.id AS ecal_workload_id,
        a.id AS ecal_account_id,
        o.opportunityid AS opportunity_id,
        COALESCE(w.workloadtype, 'None') AS workload_type,
        w.workloadidentifier AS workload_identifier,
        a.accountname AS account_name,
        a.cimid AS cim_id,
        o.summary AS workload_summary,
        COALESCE((SELECT stage FROM %SCHEMA%.ecalstage WHERE id = o.lateststagedone), 'None') AS latest_ecal_stage_done,
        COALESCE(a.currentcsaexecuted, 0) AS csa_executed,
        o.technicallead AS tech_lead,
        u.manager AS tech_manager,
        COALESCE(th.pocrequired, 0) AS poc_required,
        TO_CHAR(th.pocenddate, 'MM-DD-YYYY') AS poc_enddate,
        COALESCE(th.pocstatus, 'Not Started') AS poc_status,
        COALESCE(th.pocresolution, 'None') AS poc_resolution,
        COALESCE(th.securitysignoffdone, 0) AS security_signoff,
        COALESCE(th.technicalsignoffdone, 0) AS technical_signoff,
        COALESCE(th.consumptionplansignoff, 0) AS cons_plan_signoff,
        COALESCE(th.cloudatcustomerinvolved, 0) AS cc_involved,
        COALESCE(th.cloudatcustomersardone, 0) AS cc_done,
        COALESCE(th.technicalblockers, 0) AS tech_blockers,
        COALESCE(th.commercialblockers, 0) AS commercial_blockers,
        COALESCE(th.coronavirusimpact, 0) AS covid_impact,
        COALESCE(th.oracleconsultingengaged, 0) AS ocs_engaged,
        COALESCE(th.expansion, 0) AS expansion,
        th.technicaldecisionmakern AS tech_decider,
        TO_CHAR(th.technicalsignoffdate, 'MM-DD-YYYY') AS tech_signoff_date,
        th.migrationrunby AS migration_by,
        th.tigerseemail AS tiger_se_email,
        th.partnername AS partner_name,
        th.workloadprogressionstage AS workload_progression,
        th.adoptionowneremail AS adopter_email,
        th.adoptionownernametitle AS adopter_name,
        th.implementeremail AS implementer_email,
        th.implementernametitle AS implementer_name,
        (SELECT ora.done FROM %SCHEMA%.opportunityrequiredarti ora
            INNER JOIN %SCHEMA%.requiredartifacts ra ON ora.requiredartifact = ra.id
            WHERE ora.opportunity = o.id AND ra.name = 'Logical Architecture') AS future_state_complete,
        (SELECT ora.done FROM %SCHEMA%.opportunityrequiredarti ora
            INNER JOIN %SCHEMA%.requiredartifacts ra ON ora.requiredartifact = ra.id
            WHERE ora.opportunity = o.id AND ra.name = 'Architecture Diagram') AS architecture_diagram_done,
        COALESCE((
            SELECT ora.done FROM %SCHEMA%.opportunityrequiredarti ora
                INNER JOIN %SCHEMA%.requiredartifacts ra ON ora.requiredartifact = ra.id
                WHERE ora.opportunity = o.id AND ra.name = 'Architecture Diagram'
            INTERSECT
            SELECT ora.done FROM %SCHEMA%.opportunityrequiredarti ora
                INNER JOIN %SCHEMA%.requiredartifacts ra ON ora.requiredartifact = ra.id
                WHERE ora.opportunity = o.id AND ra.name = 'Inventory Spreadsheet'
        ), 0) AS current_state_complete,
        (SELECT ora.done FROM %SCHEMA%.opportunityrequiredarti ora
            INNER JOIN %SCHEMA%.requiredartifacts ra ON ora.requiredartifact = ra.id
            WHERE ora.opportunity = o.id AND ra.name = 'Consumption Plan') AS consumption_plan_complete,
        COALESCE(os.status, 'No Status Entered') AS latest_status,
        TO_CHAR(os.creationdate, 'MM-DD-YYYY') AS latest_status_date,
        os.lastupdatedby AS latest_status_author
    FROM %SCHEMA%.opportunity o
    INNER JOIN %SCHEMA%.account a ON a.id = o.account
    LEFT OUTER JOIN %SCHEMA%.opportunitytechhealth th ON th.opportunity = o.id
    LEFT OUTER JOIN %SCHEMA%.opportunityworkload w ON w.opportunity = o.id
    LEFT OUTER JOIN %SCHEMA%.user1 u ON o.createdby = u.useremail
    LEFT OUTER JOIN %SCHEMA%.opportunitystatus os ON o.id = os.opportunity
        AND NOT EXISTS (
            SELECT 1 FROM %SCHEMA%.opportunitystatus os1
            WHERE os1.opportunity = o.id AND os1.creationdate > os.creationdate
        )";

/// Columns of the workload export, in response order. `color` is computed.
const WORKLOAD_FIELDS: &[&str] = &[
    "ecal_workload_id",
    "ecal_account_id",
    "opportunity_id",
    "workload_type",
    "workload_identifier",
    "account_name",
    "cim_id",
    "workload_summary",
    "color",
    "latest_ecal_stage_done",
    "csa_executed",
    "tech_lead",
    "tech_manager",
    "poc_required",
    "poc_enddate",
    "poc_status",
    "poc_resolution",
    "security_signoff",
    "technical_signoff",
    "cons_plan_signoff",
    "cc_involved",
    "cc_done",
    "tech_blockers",
    "commercial_blockers",
    "covid_impact",
    "ocs_engaged",
    "expansion",
    "tech_decider",
    "tech_signoff_date",
    "migration_by",
    "tiger_se_email",
    "partner_name",
    "workload_progression",
    "adopter_email",
    "adopter_name",
    "implementer_email",
    "implementer_name",
    "future_state_complete",
    "current_state_complete",
    "consumption_plan_complete",
    "latest_status",
    "latest_status_date",
    "latest_status_author",
];

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScopedParams {
    #[serde(default)]
    pub instance_environment: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub is_admin: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentParams {
    #[serde(default)]
    pub instance_environment: String,
}

/// Admins see everything; everyone else sees what they or the managers
/// under them own.
fn scoped(select: &str, is_admin: bool) -> String {
    if is_admin {
        select.to_string()
    } else {
        format!("{MANAGER_SCOPE}\n{select}\n    {SCOPE_FILTER}")
    }
}

fn scope_binds(params: &ScopedParams, is_admin: bool) -> Vec<String> {
    if is_admin {
        Vec::new()
    } else {
        vec![params.user_email.clone()]
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Account {
    #[serde(rename = "AccountID")]
    pub account_id: Value,
    #[serde(rename = "LOB")]
    pub lob: String,
    #[serde(rename = "AccountName")]
    pub account_name: String,
    #[serde(rename = "SolutionEngineer")]
    pub solution_engineer: String,
    #[serde(rename = "NumOpportunities")]
    pub num_opportunities: Value,
}

impl Account {
    fn from_row(row: &JsonRow) -> Self {
        Account {
            account_id: column(row, "account_id"),
            lob: text(row, "lob"),
            account_name: text(row, "account_name"),
            solution_engineer: text(row, "solution_engineer"),
            num_opportunities: column(row, "num_opportunities"),
        }
    }
}

pub async fn get_accounts(
    State(state): State<AppState>,
    Query(params): Query<ScopedParams>,
) -> Result<Json<Items<Account>>, ApiError> {
    let is_admin = is_truthy(&params.is_admin);
    let sql = scoped(ACCOUNTS, is_admin);
    let rows = run_report(
        &state,
        "ecal_accounts",
        &params.instance_environment,
        &sql,
        Some("account_name ASC"),
        &scope_binds(&params, is_admin),
    )
    .await?;
    tracing::info!(
        instance_env = %params.instance_environment,
        user = %params.user_email,
        is_admin,
        results = rows.len(),
        "ecal account query"
    );
    Ok(items(rows, Account::from_row))
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Opportunity {
    #[serde(rename = "ID")]
    pub id: Value,
    #[serde(rename = "AccountID")]
    pub account_id: Value,
    #[serde(rename = "AccountName")]
    pub account_name: String,
    #[serde(rename = "OpportunityID")]
    pub opportunity_id: String,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "ARR")]
    pub arr: Value,
    #[serde(rename = "ECALPercent")]
    pub ecal_percent: Value,
    #[serde(rename = "LatestECALStage")]
    pub latest_ecal_stage: String,
    #[serde(rename = "LastActivity")]
    pub last_activity: String,
    #[serde(rename = "POC")]
    pub poc: bool,
    #[serde(rename = "POCStatus")]
    pub poc_status: String,
    #[serde(rename = "Blockers")]
    pub blockers: bool,
}

impl Opportunity {
    fn from_row(row: &JsonRow) -> Self {
        Opportunity {
            id: column(row, "id"),
            account_id: column(row, "account_id"),
            account_name: text(row, "account_name"),
            opportunity_id: text(row, "opportunity_id"),
            summary: text(row, "summary"),
            arr: column(row, "arr"),
            ecal_percent: column(row, "ecal_percent"),
            latest_ecal_stage: text(row, "latest_ecal_stage"),
            last_activity: text(row, "last_activity"),
            poc: int(row, "poc") == 1,
            poc_status: text(row, "poc_status"),
            blockers: int(row, "commercial_blockers") == 1 || int(row, "technical_blockers") == 1,
        }
    }
}

pub async fn get_opportunities(
    State(state): State<AppState>,
    Query(params): Query<ScopedParams>,
) -> Result<Json<Items<Opportunity>>, ApiError> {
    let is_admin = is_truthy(&params.is_admin);
    let sql = scoped(OPPORTUNITIES, is_admin);
    let rows = run_report(
        &state,
        "ecal_opportunities",
        &params.instance_environment,
        &sql,
        Some("account_name ASC, opportunity_id ASC"),
        &scope_binds(&params, is_admin),
    )
    .await?;
    tracing::info!(
        instance_env = %params.instance_environment,
        user = %params.user_email,
        is_admin,
        results = rows.len(),
        "ecal opportunity query"
    );
    Ok(items(rows, Opportunity::from_row))
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Artifact {
    pub id: String,
    pub account: String,
    pub opp_id: String,
    pub solution_focus: String,
    pub artifact_type: String,
    pub ce: String,
    pub uploaded: String,
    pub location: String,
}

impl Artifact {
    fn from_row(row: &JsonRow) -> Self {
        Artifact {
            id: text(row, "id"),
            account: text(row, "account"),
            opp_id: text(row, "opp_id"),
            solution_focus: text(row, "solution_focus"),
            artifact_type: text(row, "artifact_type"),
            ce: text(row, "ce"),
            uploaded: text(row, "uploaded"),
            location: text(row, "location"),
        }
    }
}

/// Artifacts touched in the last 180 days, newest first.
pub async fn get_artifacts(
    State(state): State<AppState>,
    Query(params): Query<EnvironmentParams>,
) -> Result<Json<Items<Artifact>>, ApiError> {
    let rows = run_report(
        &state,
        "ecal_artifacts",
        &params.instance_environment,
        ARTIFACTS,
        Some("uploaded_at DESC"),
        &[],
    )
    .await?;
    Ok(items(rows, Artifact::from_row))
}

/// Readiness signoff inputs for a workload. Missing inputs count as not done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub csa: i64,
    pub consumption_plan: i64,
    pub current_state: i64,
    pub future_state: i64,
    pub security: i64,
    pub technical: i64,
    pub poc: i64,
    pub cc_involved: i64,
    pub cc_sar: i64,
}

impl Readiness {
    fn from_row(row: &JsonRow) -> Self {
        Readiness {
            csa: int(row, "csa_executed"),
            consumption_plan: int(row, "consumption_plan_complete"),
            current_state: int(row, "architecture_diagram_done"),
            future_state: int(row, "future_state_complete"),
            security: int(row, "security_signoff"),
            technical: int(row, "technical_signoff"),
            poc: int(row, "poc_required"),
            cc_involved: int(row, "cc_involved"),
            cc_sar: int(row, "cc_done"),
        }
    }

    /// `R` at two or fewer signoffs, `G` when every applicable signoff is done, `Y` otherwise.
    /// A required POC and Cloud@Customer involvement each add one applicable signoff.
    pub fn color(&self) -> &'static str {
        let mut total = 6;
        let mut score = self.csa
            + self.consumption_plan
            + self.current_state
            + self.future_state
            + self.security
            + self.technical;
        if self.poc == 1 {
            total += 1;
            score += self.poc;
        }
        if self.cc_involved == 1 {
            total += 1;
            score += self.cc_sar;
        }

        if score <= 2 {
            "R"
        } else if score < total {
            "Y"
        } else {
            "G"
        }
    }
}

fn workload(row: &JsonRow) -> Map<String, Value> {
    WORKLOAD_FIELDS
        .iter()
        .map(|&field| {
            let value = if field == "color" {
                Readiness::from_row(row).color().to_string()
            } else {
                text(row, field)
            };
            (field.to_string(), Value::String(value))
        })
        .collect()
}

/// Workload export with a computed readiness color. Every value is a string.
pub async fn get_workloads(
    State(state): State<AppState>,
    Query(params): Query<EnvironmentParams>,
) -> Result<Json<Items<Map<String, Value>>>, ApiError> {
    let rows = run_report(
        &state,
        "ecal_workloads",
        &params.instance_environment,
        WORKLOADS,
        None,
        &[],
    )
    .await?;
    Ok(items(rows, workload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::row;
    use crate::testutils::{TestApp, body_text};
    use axum::http::StatusCode;
    use serde_json::json;

    async fn json_body(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[test]
    fn readiness_colors() {
        let none = Readiness::default();
        assert_eq!(none.color(), "R");

        let partial = Readiness {
            csa: 1,
            consumption_plan: 1,
            current_state: 1,
            ..Readiness::default()
        };
        assert_eq!(partial.color(), "Y");

        let base_complete = Readiness {
            csa: 1,
            consumption_plan: 1,
            current_state: 1,
            future_state: 1,
            security: 1,
            technical: 1,
            ..Readiness::default()
        };
        assert_eq!(base_complete.color(), "G");

        let pending_poc = Readiness {
            poc: 1,
            ..base_complete
        };
        assert_eq!(pending_poc.color(), "G");

        let pending_cc = Readiness {
            cc_involved: 1,
            ..base_complete
        };
        assert_eq!(pending_cc.color(), "Y");
        assert_eq!(Readiness { cc_sar: 1, ..pending_cc }.color(), "G");
    }

    #[test]
    fn admin_queries_are_unscoped() {
        let admin = scoped(ACCOUNTS, true);
        assert!(!admin.contains("WITH RECURSIVE"));
        assert!(!admin.contains("$1"));

        let user = scoped(ACCOUNTS, false);
        assert!(user.trim_start().starts_with("WITH RECURSIVE"));
        assert!(user.ends_with(SCOPE_FILTER));
    }

    #[tokio::test]
    async fn accounts_for_user() {
        let app = TestApp::new();
        app.store.set_query_rows(vec![row(json!({
            "account_id": 11,
            "lob": "NA Tech",
            "account_name": "Acme",
            "solution_engineer": "se@x.com",
            "num_opportunities": 2
        }))]);

        let response = app
            .get("/getECALAccountQuery?instanceEnvironment=ecal-prod&userEmail=u@x.com&isAdmin=no")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"items": [{
                "AccountID": 11,
                "LOB": "NA Tech",
                "AccountName": "Acme",
                "SolutionEngineer": "se@x.com",
                "NumOpportunities": 2
            }]})
        );
        let queries = app.store.queries();
        assert_eq!(queries[0].binds, vec!["u@x.com".to_string()]);
        assert!(queries[0].sql.contains("ECAL.useraccount"));
        assert_eq!(queries[0].order_by.as_deref(), Some("account_name ASC"));
    }

    #[tokio::test]
    async fn admin_accounts_have_no_binds() {
        let app = TestApp::new();
        let response = app
            .get("/getECALAccountQuery?instanceEnvironment=ecal-prod&userEmail=u@x.com&isAdmin=YES")
            .await;
        assert_eq!(json_body(response).await, json!({"items": []}));
        assert!(app.store.queries()[0].binds.is_empty());
    }

    #[tokio::test]
    async fn opportunity_flags_become_booleans() {
        let app = TestApp::new();
        app.store.set_query_rows(vec![
            row(json!({
                "id": 1, "account_id": 11, "account_name": "Acme", "opportunity_id": "O1",
                "summary": "Move", "arr": 1000, "ecal_percent": 50, "latest_ecal_stage": "None",
                "last_activity": "01/02/2020", "poc": 1, "poc_status": "None",
                "commercial_blockers": 0, "technical_blockers": 1
            })),
            row(json!({
                "id": 2, "account_id": 11, "account_name": "Acme", "opportunity_id": "O2",
                "summary": "Stay", "arr": 0, "ecal_percent": 0, "latest_ecal_stage": "None",
                "last_activity": null, "poc": 0, "poc_status": "None",
                "commercial_blockers": 0, "technical_blockers": 0
            })),
        ]);

        let response = app
            .get("/getECALOpportunityQuery?instanceEnvironment=ecal-prod&isAdmin=true")
            .await;
        let body = json_body(response).await;
        assert_eq!(body["items"][0]["POC"], json!(true));
        assert_eq!(body["items"][0]["Blockers"], json!(true));
        assert_eq!(body["items"][0]["ARR"], json!(1000));
        assert_eq!(body["items"][1]["POC"], json!(false));
        assert_eq!(body["items"][1]["Blockers"], json!(false));
        assert_eq!(body["items"][1]["LastActivity"], json!(""));
    }

    #[tokio::test]
    async fn artifacts_render_as_strings() {
        let app = TestApp::new();
        app.store.set_query_rows(vec![row(json!({
            "id": 5, "account": "Acme", "opp_id": "O1", "solution_focus": "Data",
            "artifact_type": "Consumption Plan", "ce": "ce@x.com", "uploaded": "01-02-2020",
            "location": "https://files/plan.xlsx"
        }))]);

        let response = app
            .get("/getECALArtifactQuery?instanceEnvironment=ecal-prod")
            .await;
        let body = json_body(response).await;
        assert_eq!(body["items"][0]["id"], json!("5"));
        assert_eq!(body["items"][0]["artifact_type"], json!("Consumption Plan"));
        let queries = app.store.queries();
        assert!(queries[0].sql.contains("180 days"));
        assert!(!queries[0].sql.contains("ORDER BY"));
        assert_eq!(queries[0].order_by.as_deref(), Some("uploaded_at DESC"));
    }

    #[tokio::test]
    async fn workloads_carry_computed_color() {
        let app = TestApp::new();
        app.store.set_query_rows(vec![row(json!({
            "ecal_workload_id": 9,
            "opportunity_id": "O1",
            "csa_executed": 1,
            "consumption_plan_complete": 1,
            "architecture_diagram_done": 1,
            "future_state_complete": null,
            "security_signoff": 0,
            "technical_signoff": 0,
            "poc_required": 0,
            "cc_involved": 0,
            "cc_done": 0
        }))]);

        let response = app.get("/getECALDataQuery?instanceEnvironment=ecal-prod").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let item = body["items"][0].as_object().unwrap();
        assert_eq!(item.len(), WORKLOAD_FIELDS.len());
        assert_eq!(item["color"], json!("Y"));
        assert_eq!(item["ecal_workload_id"], json!("9"));
        assert_eq!(item["future_state_complete"], json!(""));
        assert!(!item.contains_key("architecture_diagram_done"));
    }

    #[tokio::test]
    async fn missing_environment_is_rejected() {
        let app = TestApp::new();
        let response = app.get("/getECALDataQuery").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
