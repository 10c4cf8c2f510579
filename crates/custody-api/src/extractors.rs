//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers to extract
//! and validate JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Business rules beyond what serde checks.
pub trait Validate {
    /// Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and run [`Validate::validate`] on it.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}
