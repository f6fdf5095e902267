//! HTTP surface of the bizlogic helper: chunked reference data ingestion,
//! identity snapshot access, health, and read-only report queries.

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod identities;
pub mod metrics_defs;
pub mod reference_data;
pub mod reports;
pub mod state;

#[cfg(test)]
mod testutils;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use errors::ServiceError;
use hyper_util::service::TowerToHyperService;
use shared::http::run_http_service;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/postReferenceData", post(reference_data::post_reference_data))
        .route("/getIdentities", get(identities::get_identities))
        .route("/postIdentities", post(identities::post_identities))
        .route("/getManagerQuery", get(reports::manager::get_manager_query))
        .route(
            "/getSTSManagerDashboardSummary",
            get(reports::sts::get_dashboard_summary),
        )
        .route("/getECALAccountQuery", get(reports::ecal::get_accounts))
        .route("/getECALOpportunityQuery", get(reports::ecal::get_opportunities))
        .route("/getECALArtifactQuery", get(reports::ecal::get_artifacts))
        .route("/getECALDataQuery", get(reports::ecal::get_workloads))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(protected)
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: &config::Listener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServiceError> {
    let service = TowerToHyperService::new(router(state));
    run_http_service(&listener.host, listener.port, service, shutdown).await?;
    Ok(())
}
