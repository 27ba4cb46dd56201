//! Conversion des erreurs d'action en réponses HTTP

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use landuse_shp::ShpError;
use tracing::{error, warn};

use crate::calculator::PrepareError;
use crate::error::AppError;
use crate::present::render_message;
use crate::store::StoreError;

/// Erreur renvoyée par un handler, affichée comme une page lisible
#[derive(Debug)]
pub struct WebError(pub AppError);

impl From<AppError> for WebError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::EmptyResult { .. } => StatusCode::OK,
            AppError::Source(e) => match e {
                ShpError::MissingFile(_) => StatusCode::NOT_FOUND,
                ShpError::MissingField { .. } | ShpError::UnknownProjection(_) => {
                    StatusCode::BAD_REQUEST
                }
                ShpError::InvalidGeometry { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Prepare(e) => match e {
                PrepareError::GeographicStorage(_) | PrepareError::Reprojection(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppError::Store(e) => match e {
                StoreError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::LockConflict(_) => StatusCode::CONFLICT,
                StoreError::MalformedGeometry { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Present(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn title(&self) -> &'static str {
        match &self.0 {
            AppError::EmptyResult { .. } => "No data",
            AppError::Source(_) => "Source file error",
            AppError::Prepare(_) => "Geometry preparation error",
            AppError::Store(StoreError::Connection(_)) => "Database unavailable",
            AppError::Store(StoreError::LockConflict(_)) => "Load already in progress",
            AppError::Store(_) => "Database error",
            _ => "Internal error",
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else if status != StatusCode::OK {
            warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        let body = render_message(self.title(), &self.0.to_string());
        (status, Html(body)).into_response()
    }
}
