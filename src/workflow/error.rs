use axum::http::StatusCode;
use thiserror::Error;

use crate::utils::api_response::ApiResponse;
use crate::utils::validation::FieldErrors;

/// Ways a lifecycle action can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Actor lacks the role or ownership the action needs.
    #[error("{0}")]
    Forbidden(String),
    /// The record is not in a state that allows the action.
    #[error("{0}")]
    Conflict(String),
    #[error("The given data was invalid")]
    Invalid(FieldErrors),
}

impl From<WorkflowError> for ApiResponse<()> {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Forbidden(message) => ApiResponse::forbidden(message),
            WorkflowError::Conflict(message) => {
                ApiResponse::error(StatusCode::CONFLICT, message, None)
            }
            WorkflowError::Invalid(errors) => errors.into(),
        }
    }
}
