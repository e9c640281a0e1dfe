//! HTTP surface: handlers, DTOs, request identity and error responses.

pub mod auth;
pub mod error;
pub mod movie;
pub mod types;
pub mod user;

pub use auth::{auth_middleware, authorize, Identity};
pub use error::{ApiError, ApiJson, ApiResult};
pub use types::{AccountDto, LoginRequest, LoginResponse, MovieDto};
