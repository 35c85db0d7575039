use axum::extract::State;
use axum::Json;
use harness_core::types::HarnessSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/actions: registry, controls and forced-action state as seen by
/// the dispatch loop.
pub async fn get_snapshot(State(app): State<AppState>) -> Result<Json<HarnessSnapshot>, AppError> {
    let snapshot = app.harness.snapshot().await?;
    Ok(Json(snapshot))
}
