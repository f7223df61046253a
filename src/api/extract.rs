//! Extractors whose rejections use the JSON error body.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::FromRequestParts;

use crate::error::DetectiveError;

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(DetectiveError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(DetectiveError))]
pub struct ApiPath<T>(pub T);

impl From<QueryRejection> for DetectiveError {
    fn from(rejection: QueryRejection) -> Self {
        DetectiveError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for DetectiveError {
    fn from(rejection: PathRejection) -> Self {
        DetectiveError::InvalidInput(rejection.body_text())
    }
}
