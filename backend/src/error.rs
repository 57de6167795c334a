use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::{InferenceError, PreprocessError};

pub const SANITIZED_PROCESSING_MESSAGE: &str = "Failed to process image";

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Model is not loaded!")]
    ModelUnavailable,
    #[error("No file part")]
    MissingFilePart,
    #[error("No selected file")]
    EmptyFilename,
    #[error("{0}")]
    MalformedUpload(String),
    #[error("File too large")]
    UploadTooLarge,
    #[error("{0}")]
    Processing(String),
}

impl PredictError {
    /// Replaces processing detail with a fixed message; client errors keep
    /// their text since it only describes the request.
    pub fn sanitized(self) -> Self {
        match self {
            PredictError::Processing(_) => {
                PredictError::Processing(SANITIZED_PROCESSING_MESSAGE.to_string())
            }
            other => other,
        }
    }
}

impl From<PreprocessError> for PredictError {
    fn from(err: PreprocessError) -> Self {
        PredictError::Processing(err.to_string())
    }
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        PredictError::Processing(err.to_string())
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFilePart
            | PredictError::EmptyFilename
            | PredictError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            PredictError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::ModelUnavailable | PredictError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
