use super::{run_report, text};
use crate::errors::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ManagerParams {
    #[serde(default)]
    pub manager_email: String,
    #[serde(default)]
    pub instance_environment: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ManagerQuery {
    pub query: String,
}

/// Builds a filter expression matching every manager under `managerEmail`.
/// ECAL environments (`ecal-` prefix) use the ECAL hierarchy, all others the STS one.
pub async fn get_manager_query(
    State(state): State<AppState>,
    Query(params): Query<ManagerParams>,
) -> Result<Json<ManagerQuery>, ApiError> {
    let template = if params.instance_environment.starts_with("ecal-") {
        &state.queries.ecal_manager_hierarchy
    } else {
        &state.queries.sts_manager_hierarchy
    };
    let rows = run_report(
        &state,
        "manager_query",
        &params.instance_environment,
        template,
        None,
        &[params.manager_email.clone()],
    )
    .await?;

    let managers: Vec<String> = rows.iter().map(|row| text(row, "useremail")).collect();
    let query = filter_expression(&managers, &params.manager_email);
    tracing::info!(
        instance_env = %params.instance_environment,
        manager = %params.manager_email,
        query = %query,
        "manager query built"
    );
    Ok(Json(ManagerQuery { query }))
}

fn filter_expression(managers: &[String], fallback: &str) -> String {
    if managers.is_empty() {
        return format!("manager = '{fallback}'");
    }
    managers
        .iter()
        .map(|m| format!("manager = '{m}'"))
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::row;
    use crate::testutils::{TestApp, body_text};
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn joins_managers() {
        assert_eq!(
            filter_expression(&["a@x.com".into(), "b@x.com".into()], "m@x.com"),
            "manager = 'a@x.com' or manager = 'b@x.com'"
        );
        assert_eq!(filter_expression(&[], "m@x.com"), "manager = 'm@x.com'");
    }

    #[tokio::test]
    async fn ecal_environment_uses_ecal_hierarchy() {
        let app = TestApp::new();
        app.store.set_query_rows(vec![
            row(json!({"useremail": "a@x.com"})),
            row(json!({"useremail": "b@x.com"})),
        ]);

        let response = app
            .get("/getManagerQuery?managerEmail=m@x.com&instanceEnvironment=ecal-prod")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body, json!({"query": "manager = 'a@x.com' or manager = 'b@x.com'"}));

        let queries = app.store.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].sql.contains("ECAL.roletype"));
        assert_eq!(queries[0].binds, vec!["m@x.com".to_string()]);
    }

    #[tokio::test]
    async fn no_rows_falls_back_to_requested_manager() {
        let app = TestApp::new();
        let response = app
            .get("/getManagerQuery?managerEmail=m@x.com&instanceEnvironment=sts-prod")
            .await;
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body, json!({"query": "manager = 'm@x.com'"}));
        assert!(app.store.queries()[0].sql.contains("STS.stsrole"));
    }

    #[tokio::test]
    async fn unknown_environment_is_rejected() {
        let app = TestApp::new();
        for uri in [
            "/getManagerQuery?managerEmail=m@x.com",
            "/getManagerQuery?managerEmail=m@x.com&instanceEnvironment=nowhere",
        ] {
            let response = app.get(uri).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                body_text(response).await,
                "Error in input parameters or processing; please contact your service administrator"
            );
        }
        assert!(app.store.queries().is_empty());
    }
}
