//! Domain error kinds shared by every component. Recoverable errors are
//! handled by the nearest caller and logged; only the ones that cross an
//! API boundary (registry, solver, pan resolver, aiming) are typed here.
//! `main` and background tasks fall back to `anyhow` at the edges.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpotlightError {
    #[error("pan/tilt {value}° is outside range [{min}°, {max}°]")]
    RangeError { value: f64, min: f64, max: f64 },

    #[error("no 360°-equivalent of {target}° lies within [{min}°, {max}°]")]
    Unreachable { target: f64, min: f64, max: f64 },

    #[error("solver did not converge: {reason}")]
    SolverFailed { reason: String },

    #[error("channel '{channel}' has only {have}/{need} calibrated sensor anchors")]
    NotCalibrated { channel: String, have: usize, need: usize },

    #[error("channel '{0}' not found in fixture registry")]
    NotFound(String),

    #[error("malformed sensor frame: {0}")]
    BadFrame(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP-facing mapping for the two handlers that surface these directly
/// (`/fixtures/:channel/aim` and `/fixtures/:channel/calibrate`).
impl IntoResponse for SpotlightError {
    fn into_response(self) -> Response {
        let status = match &self {
            SpotlightError::RangeError { .. } => StatusCode::BAD_REQUEST,
            SpotlightError::Unreachable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SpotlightError::SolverFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SpotlightError::NotCalibrated { .. } => StatusCode::CONFLICT,
            SpotlightError::NotFound(_) => StatusCode::NOT_FOUND,
            SpotlightError::BadFrame(_) => StatusCode::BAD_REQUEST,
            SpotlightError::Io(_) | SpotlightError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
