use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::dto::ErrorResponse;
use crate::domain::{errors::DomainError, gate::NOT_A_LEAF_MESSAGE};

/// Mensaje para el usuario final. Nunca incluye trazas internas.
pub fn user_message(e: &DomainError) -> String {
    match e {
        DomainError::InvalidInput(m) | DomainError::NotFound(m) | DomainError::ModelUnavailable(m) => m.clone(),
        DomainError::NotALeaf => NOT_A_LEAF_MESSAGE.to_string(),
        DomainError::OperationFailed(m) => format!("Error processing image: {m}"),
    }
}

pub fn status_of(e: &DomainError) -> StatusCode {
    match e {
        DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::NotALeaf => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error de la API JSON: `{ "error": "..." }` con el estado correspondiente.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let DomainError::OperationFailed(m) = &self.0 {
            tracing::error!("Fallo interno atendiendo la petición: {m}");
        }
        let body = ErrorResponse {
            error: user_message(&self.0),
        };
        (status_of(&self.0), Json(body)).into_response()
    }
}
