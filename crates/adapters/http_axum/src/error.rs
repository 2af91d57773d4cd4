//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use verdant_domain::error::VerdantError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`VerdantError`] to an HTTP response with the matching status.
pub struct ApiError(VerdantError);

impl From<VerdantError> for ApiError {
    fn from(err: VerdantError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VerdantError::Validation(_) | VerdantError::Configuration(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            VerdantError::NotFound(_) | VerdantError::NoActiveOverride { .. } => {
                StatusCode::NOT_FOUND
            }
            VerdantError::Conflict(_) => StatusCode::CONFLICT,
            VerdantError::Actuation(_) => StatusCode::BAD_GATEWAY,
            VerdantError::ControlUnavailable => {
                tracing::error!("control loop unavailable while serving a request");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let message = match &self.0 {
            VerdantError::Validation(err) => err.to_string(),
            VerdantError::Configuration(err) => err.to_string(),
            VerdantError::NotFound(err) => err.to_string(),
            VerdantError::Actuation(err) => err.to_string(),
            VerdantError::Conflict(err) => err.to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_domain::error::{NotFoundError, ValidationError};
    use verdant_domain::id::DeviceId;

    #[test]
    fn should_map_not_found_to_404() {
        let err: VerdantError = NotFoundError {
            entity: "Device",
            id: "led_missing".to_string(),
        }
        .into();
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_map_no_active_override_to_404() {
        let err = VerdantError::NoActiveOverride {
            device: DeviceId::new("heater"),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_map_validation_to_422() {
        let err: VerdantError = ValidationError::EmptyRuleName.into();
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn should_map_control_unavailable_to_503() {
        let response = ApiError::from(VerdantError::ControlUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
