/// Aggregate insights
///
/// # Endpoint
///
/// ```text
/// GET /insights
/// ```
///
/// # Response
///
/// ```json
/// {
///   "metric_count": 3,
///   "total_energy": 12.5,
///   "total_emissions": 6.25,
///   "total_water_usage": 1.2,
///   "projects": [
///     { "project_id": 1, "project": "nlp-model", "metric_count": 2, ... }
///   ]
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use ecometer_shared::services::ledger::Insights;

pub async fn get_insights(State(state): State<AppState>) -> ApiResult<Json<Insights>> {
    let insights = state.ledger.insights().await?;
    Ok(Json(insights))
}
