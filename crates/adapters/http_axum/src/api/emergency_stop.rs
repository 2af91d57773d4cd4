//! Emergency stop endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EmergencyStopRequest {
    pub active: bool,
}

/// `POST /api/emergency-stop` — engage or clear the emergency stop.
/// Engaging forces every output OFF immediately; clearing lets the next
/// evaluation start from scratch. Idempotent.
///
/// # Errors
///
/// `503` when the control loop is gone.
pub async fn set(
    State(state): State<AppState>,
    Json(body): Json<EmergencyStopRequest>,
) -> Result<StatusCode, ApiError> {
    state.control.set_emergency_stop(body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}
