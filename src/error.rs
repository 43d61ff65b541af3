//! Error taxonomy for the unfold pipeline.
//!
//! Only two variants surface as HTTP errors: a malformed request (400) and a
//! downstream gateway failure (500). Writer rejections and allow-list skips
//! are not errors — they pass the writer's status/body through verbatim and
//! are handled structurally in the orchestrator. Publish failures are logged
//! and never alter the response.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnfolderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("gateway error: {0}")]
    Gateway(String),
}

impl UnfolderError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_validation() {
        let err = UnfolderError::Validation("bad uuid".into());
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn http_status_gateway() {
        let err = UnfolderError::Gateway("writer unreachable".into());
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn display_carries_context() {
        let err = UnfolderError::Gateway("relations api responded with 503".into());
        assert_eq!(
            err.to_string(),
            "gateway error: relations api responded with 503"
        );
    }
}
