//! HTTP surface: JSON DTOs, error mapping and the axum router.

pub mod dto;
mod error;
mod extract;
mod http;

pub use error::ErrorResponse;
pub use extract::{ApiPath, ApiQuery};
pub use http::{create_router, Access, AppState, HttpServer};
