/// Metric ledger endpoints
///
/// # Endpoints
///
/// - `POST /metrics` - Ingest one observation
/// - `GET /metrics?skip=&limit=&mine=` - Page of metrics; `mine=true` scopes to the caller
/// - `POST /metrics/sample-data` - Generate sample metrics (admin or developer)
///
/// Metrics are append-only; there is no update or delete.

use super::auth::MessageResponse;
use crate::{
    app::AppState,
    error::{validate_request, ApiResult},
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use ecometer_shared::{
    auth::guard::Principal,
    models::metric::{MetricRecord, NewMetric},
    services::ledger::SAMPLE_BATCH,
    store::Page,
};
use serde::Deserialize;
use validator::Validate;

/// Metric ingestion request
///
/// Quantities are checked for sign by the ledger.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMetricRequest {
    /// Project name, created on first use
    #[validate(length(min = 1, max = 255, message = "Project name must be 1-255 characters"))]
    pub project: String,

    /// Optional team name inside the project
    #[validate(length(min = 1, max = 255, message = "Team name must be 1-255 characters"))]
    pub team: Option<String>,

    pub energy_consumed: f64,
    pub emissions: f64,
    pub duration: f64,
    pub gpu_energy: Option<f64>,
    pub cpu_energy: Option<f64>,
    pub water_usage: Option<f64>,

    #[validate(length(max = 64, message = "Environment must be at most 64 characters"))]
    pub environment: Option<String>,
}

impl From<CreateMetricRequest> for NewMetric {
    fn from(req: CreateMetricRequest) -> Self {
        NewMetric {
            project: req.project,
            team: req.team,
            energy_consumed: req.energy_consumed,
            emissions: req.emissions,
            duration: req.duration,
            gpu_energy: req.gpu_energy,
            cpu_energy: req.cpu_energy,
            water_usage: req.water_usage,
            environment: req.environment,
            user_id: None,
        }
    }
}

/// `GET /metrics` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,

    /// Only the caller's metrics, newest first
    #[serde(default)]
    pub mine: bool,
}

/// Ingest one observation
///
/// # Request
///
/// ```json
/// {
///   "project": "nlp-model",
///   "team": "research",
///   "energy_consumed": 4.2,
///   "emissions": 2.1,
///   "duration": 1800,
///   "gpu_energy": 3.5,
///   "environment": "production"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Blank names or negative quantities
pub async fn create_metric(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateMetricRequest>,
) -> ApiResult<Json<MetricRecord>> {
    validate_request(&req)?;

    let record = state.ledger.ingest(&principal, req.into()).await?;

    Ok(Json(record))
}

pub async fn list_metrics(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<MetricsQuery>,
) -> ApiResult<Json<Vec<MetricRecord>>> {
    let page = Page::new(query.skip, query.limit);

    let records = if query.mine {
        state.ledger.list_for_user(&principal, page).await?
    } else {
        state.ledger.list(page).await?
    };

    Ok(Json(records))
}

/// Generate sample metrics owned by the caller
///
/// Restricted to admins and developers. Viewers may ingest and read
/// metrics but cannot generate sample data.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is a viewer
pub async fn generate_sample_data(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<MessageResponse>> {
    let written = state
        .ledger
        .generate_sample_data(&principal, SAMPLE_BATCH)
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Generated {} sample metrics", written),
    }))
}
