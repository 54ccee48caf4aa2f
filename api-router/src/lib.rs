use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    analysis::analyze_company,
    company::{create_report, get_evidence, get_metrics, get_status},
    liveness::live,
    readiness::ready,
    upload::upload_filing,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Health checks for k8s/systemd
    let health = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let api = Router::new()
        .route(
            "/upload",
            post(upload_filing).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/analyze", post(analyze_company))
        .route("/company/{company_id}/status", get(get_status))
        .route("/company/{company_id}/metrics", get(get_metrics))
        .route("/company/{company_id}/evidence", get(get_evidence))
        .route("/company/{company_id}/report", post(create_report));

    health.merge(api)
}
