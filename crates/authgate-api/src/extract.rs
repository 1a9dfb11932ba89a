//! Request body extraction

use axum::extract::FromRequest;

use crate::error::ApiError;

/// JSON request body whose rejections use the validation error shape
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
