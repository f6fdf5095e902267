use super::{Items, column, items, run_report, text};
use crate::errors::ApiError;
use crate::reports::manager::ManagerParams;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use refdata::store::JsonRow;
use serde::Serialize;
use serde_json::Value;

const DASHBOARD_SUMMARY: &str = "
    WITH RECURSIVE hierarchy AS (
        SELECT u.useremail FROM %SCHEMA%.stsuser u WHERE u.useremail = $1
        UNION
        SELECT u.useremail FROM %SCHEMA%.stsuser u INNER JOIN hierarchy h ON u.manager = h.useremail
    ),
    managers AS (
        SELECT h.useremail
        FROM hierarchy h
        INNER JOIN %SCHEMA%.stsuser u ON u.useremail = h.useremail
        INNER JOIN %SCHEMA%.stsrole r ON u.rolename = r.id
        WHERE r.rolename = 'Manager'
    )
    SELECT su.id AS id,
        su.firstname || ' ' || su.lastname AS name,
        su.useremail AS email,
        p.id AS path_id,
        p.pathname AS path_name,
        (SELECT count(pr.id) FROM %SCHEMA%.stsapathreq pr WHERE pr.pathname = su.path) AS total_tasks_in_path,
        (SELECT count(stat.id)
            FROM %SCHEMA%.stsauserstatus stat
            INNER JOIN %SCHEMA%.ststask t ON stat.taskname = t.id
            INNER JOIN %SCHEMA%.stsapathreq pr ON t.id = pr.taskname AND pr.pathname = su.path
            WHERE stat.useremail = su.id AND stat.taskstatus = 2) AS tasks_completed,
        (SELECT count(stat.id)
            FROM %SCHEMA%.stsauserstatus stat
            INNER JOIN %SCHEMA%.ststask t ON stat.taskname = t.id
            INNER JOIN %SCHEMA%.stsapathreq pr ON t.id = pr.taskname AND pr.pathname = su.path
            WHERE stat.useremail = su.id AND stat.taskstatus = 3) AS tasks_validated,
        TO_CHAR(COALESCE(
            (SELECT max(stat.lastupdatedate) FROM %SCHEMA%.stsauserstatus stat WHERE stat.useremail = su.id),
            su.lastupdatedate), 'MM/DD/YYYY') AS last_activity
    FROM %SCHEMA%.stsuser su
    INNER JOIN %SCHEMA%.stspath p ON su.path = p.id
    WHERE su.manager IN (SELECT useremail FROM managers)";

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionEngineer {
    pub id: Value,
    pub name: String,
    pub email: String,
    pub path_id: Value,
    pub path_name: String,
    pub total_tasks_in_path: Value,
    pub tasks_completed: Value,
    pub tasks_validated: Value,
    pub last_activity: String,
}

impl SolutionEngineer {
    fn from_row(row: &JsonRow) -> Self {
        SolutionEngineer {
            id: column(row, "id"),
            name: text(row, "name"),
            email: text(row, "email"),
            path_id: column(row, "path_id"),
            path_name: text(row, "path_name"),
            total_tasks_in_path: column(row, "total_tasks_in_path"),
            tasks_completed: column(row, "tasks_completed"),
            tasks_validated: column(row, "tasks_validated"),
            last_activity: text(row, "last_activity"),
        }
    }
}

/// Solution engineers reporting into any manager under `managerEmail`, with
/// their learning path progress.
pub async fn get_dashboard_summary(
    State(state): State<AppState>,
    Query(params): Query<ManagerParams>,
) -> Result<Json<Items<SolutionEngineer>>, ApiError> {
    let rows = run_report(
        &state,
        "sts_dashboard_summary",
        &params.instance_environment,
        DASHBOARD_SUMMARY,
        Some("name ASC"),
        &[params.manager_email],
    )
    .await?;
    Ok(items(rows, SolutionEngineer::from_row))
}

#[cfg(test)]
mod tests {
    use crate::reports::row;
    use crate::testutils::{TestApp, body_text};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn projects_solution_engineers() {
        let app = TestApp::new();
        app.store.set_query_rows(vec![row(json!({
            "id": 7,
            "name": "Ada Lovelace",
            "email": "ada@x.com",
            "path_id": 3,
            "path_name": "Cloud Native",
            "total_tasks_in_path": 10,
            "tasks_completed": 4,
            "tasks_validated": 2,
            "last_activity": "03/14/2020"
        }))]);

        let response = app
            .get("/getSTSManagerDashboardSummary?managerEmail=m@x.com&instanceEnvironment=sts-prod")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            body,
            json!({"items": [{
                "id": 7,
                "name": "Ada Lovelace",
                "email": "ada@x.com",
                "pathId": 3,
                "pathName": "Cloud Native",
                "totalTasksInPath": 10,
                "tasksCompleted": 4,
                "tasksValidated": 2,
                "lastActivity": "03/14/2020"
            }]})
        );

        let queries = app.store.queries();
        assert!(queries[0].sql.contains("FROM STS.stsuser su"));
        assert!(!queries[0].sql.contains("%SCHEMA%"));
        assert!(!queries[0].sql.contains("ORDER BY"));
        assert_eq!(queries[0].order_by.as_deref(), Some("name ASC"));
    }

    #[tokio::test]
    async fn database_failure_is_generic() {
        let app = TestApp::new();
        app.store
            .set_query_error(refdata::StoreError::Database("relation does not exist".into()));
        let response = app
            .get("/getSTSManagerDashboardSummary?managerEmail=m@x.com&instanceEnvironment=sts-prod")
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_text(response).await.contains("relation"));
    }
}
