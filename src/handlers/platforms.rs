use axum::{extract::State, Json};
use std::sync::Arc;

use crate::facts::catalog::PlatformSummary;
use crate::AppState;

/// List supported platforms with their subsets and default gather_subset
pub async fn list_platforms(State(state): State<Arc<AppState>>) -> Json<Vec<PlatformSummary>> {
    Json(state.catalogs.all().iter().map(|c| c.summary()).collect())
}
