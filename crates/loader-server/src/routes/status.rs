use axum::extract::State;
use axum::Json;
use loader_core::StatusSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status (also served at `/`): the loader's current snapshot.
///
/// Host metrics are sampled on every request, so the projection runs on the
/// blocking pool.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<StatusSnapshot>, AppError> {
    let projector = app.projector.clone();
    let include_output = app.include_output;
    let snapshot = tokio::task::spawn_blocking(move || {
        let snapshot = projector.snapshot();
        if include_output {
            snapshot
        } else {
            snapshot.without_output()
        }
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok(Json(snapshot))
}
