use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use refdata::{StagingTable, snapshot};

/// Runs every check and reports all failures at once:
/// `HEALTH_OK`, or `HEALTH_NOT_OK:<CODE>:<CODE>...`.
pub async fn health(State(state): State<AppState>) -> Response {
    let mut failures: Vec<&'static str> = Vec::new();

    let sync_target = &state.reference_data.sync_target;
    let schema = state.schemas.resolve(sync_target);
    if schema.is_none() {
        tracing::warn!(instance_env = %sync_target, "config healthcheck failed: sync target not mappable");
        failures.push("CONFIG");
    }

    if let Err(error) = state.store.ping().await {
        tracing::warn!(error = %error, "database healthcheck failed");
        failures.push("DB_ACCESS");
    }

    for (table, data_code, count_code) in [
        (StagingTable::LookupAccount, "ACCOUNT_DATA", "ACCOUNT_COUNT"),
        (StagingTable::LookupOpportunity, "OPPORTUNITY_DATA", "OPPORTUNITY_COUNT"),
    ] {
        let Some(schema) = schema else {
            failures.push(data_code);
            continue;
        };
        match state.store.staging_count(schema, table).await {
            Ok(0) => {
                tracing::warn!(table = table.table_name(), "staging healthcheck failed: table is empty");
                failures.push(count_code);
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(table = table.table_name(), error = %error, "staging healthcheck failed");
                failures.push(data_code);
            }
        }
    }

    let snapshot_path = &state.reference_data.identity.snapshot_path;
    if let Err(error) = snapshot::read_raw(snapshot_path).await {
        tracing::warn!(path = %snapshot_path.display(), error = %error, "identity snapshot healthcheck failed");
        failures.push("IDENTITY_DATA");
    }

    let (status, body) = if failures.is_empty() {
        (StatusCode::OK, "HEALTH_OK".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("HEALTH_NOT_OK:{}", failures.join(":")),
        )
    };
    (status, [(CONTENT_TYPE, "text/html")], body).into_response()
}

#[cfg(test)]
mod tests {
    use crate::testutils::{TestApp, body_text};
    use axum::http::StatusCode;
    use refdata::StagingTable;
    use refdata::testutils::StagedRow;
    use refdata::records::{AccountRow, OpportunityRow};

    #[tokio::test]
    async fn empty_deployment_reports_every_gap() {
        let app = TestApp::new();
        let response = app.get_unauthenticated("/health").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_text(response).await,
            "HEALTH_NOT_OK:ACCOUNT_COUNT:OPPORTUNITY_COUNT:IDENTITY_DATA"
        );
    }

    #[tokio::test]
    async fn database_down() {
        let app = TestApp::new();
        app.store.set_ping_fails(true);
        let response = app.get_unauthenticated("/health").await;
        assert_eq!(
            body_text(response).await,
            "HEALTH_NOT_OK:DB_ACCESS:ACCOUNT_DATA:OPPORTUNITY_DATA:IDENTITY_DATA"
        );
    }

    #[tokio::test]
    async fn healthy() {
        let app = TestApp::new();
        app.store.seed_staging(
            "ECAL",
            StagingTable::LookupAccount,
            vec![StagedRow::Account {
                id: 1,
                row: AccountRow::default(),
            }],
        );
        app.store.seed_staging(
            "ECAL",
            StagingTable::LookupOpportunity,
            vec![StagedRow::Opportunity {
                id: 1,
                row: OpportunityRow::default(),
            }],
        );
        std::fs::write(app.snapshot_path(), r#"{"items":[]}"#).unwrap();

        let response = app.get_unauthenticated("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "HEALTH_OK");
    }
}
