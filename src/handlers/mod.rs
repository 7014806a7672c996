pub mod admin;
pub mod attachment;
pub mod moderation;
pub mod report;

use crate::error::{AppError, AppResult};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Json,
};
use chrono::NaiveDateTime;

/// Unwrap a JSON body, reporting malformed input as a validation error.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// Unwrap a query string, reporting malformed input as a validation error.
pub(crate) fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params
        .map(|Query(params)| params)
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// Unwrap a path parameter, reporting malformed ids as a validation error.
pub(crate) fn path_param<T>(param: Result<Path<T>, PathRejection>) -> AppResult<T> {
    param
        .map(|Path(value)| value)
        .map_err(|e| AppError::Validation(e.body_text()))
}

/// Stored timestamps are naive UTC; expose them as RFC 3339.
pub(crate) fn timestamp(t: NaiveDateTime) -> String {
    t.and_utc().to_rfc3339()
}
