/// Project and team listings
///
/// Both are created implicitly by metric ingestion; these endpoints only
/// read them.
///
/// - `GET /projects?skip=&limit=`
/// - `GET /teams?skip=&limit=`

use super::PageQuery;
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use ecometer_shared::models::{project::Project, team::Team};

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    let projects = state.ledger.projects(query.page()).await?;
    Ok(Json(projects))
}

pub async fn list_teams(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Team>>> {
    let teams = state.ledger.teams(query.page()).await?;
    Ok(Json(teams))
}
