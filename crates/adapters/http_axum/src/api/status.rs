//! Controller status endpoint.

use axum::Json;
use axum::extract::State;

use verdant_app::control::Status;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/status` — devices with their current states, the
/// emergency-stop and degraded flags, and the active overrides.
///
/// # Errors
///
/// `503` when the control loop is gone.
pub async fn get(State(state): State<AppState>) -> Result<Json<Status>, ApiError> {
    let status = state.control.status().await?;
    Ok(Json(status))
}
