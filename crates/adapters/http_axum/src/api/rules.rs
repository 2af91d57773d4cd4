//! Rule reload endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use verdant_domain::rule::Rule;

use crate::error::ApiError;
use crate::state::AppState;

/// `PUT /api/rules` — replace the whole active rule set.
///
/// The set is validated before it is swapped in; on rejection the
/// previous rules stay active. The new rules apply from the next tick.
///
/// # Errors
///
/// `422` for duplicate rule names, unknown devices, or invalid rules.
pub async fn reload(
    State(state): State<AppState>,
    Json(rules): Json<Vec<Rule>>,
) -> Result<StatusCode, ApiError> {
    state.control.reload_rules(rules).await?;
    Ok(StatusCode::NO_CONTENT)
}
