//! Manual override endpoints.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use verdant_domain::device::DeviceState;
use verdant_domain::id::DeviceId;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for installing an override.
#[derive(Deserialize)]
pub struct SetOverrideRequest {
    pub state: DeviceState,
    /// Seconds until the override lapses; the server default applies
    /// when omitted.
    pub duration_secs: Option<u64>,
}

/// `PUT /api/devices/{id}/override` — force a device into a state for a
/// bounded time. Actuated immediately, replacing any existing override
/// for the device.
///
/// # Errors
///
/// `404` for an unknown device.
pub async fn set(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetOverrideRequest>,
) -> Result<StatusCode, ApiError> {
    let ttl = body
        .duration_secs
        .map_or(state.default_override_ttl, Duration::from_secs);
    state
        .control
        .set_override(DeviceId::new(id), body.state, ttl)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/devices/{id}/override` — return the device to
/// automation.
///
/// # Errors
///
/// `404` when the device has no active override.
pub async fn clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.control.clear_override(DeviceId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
