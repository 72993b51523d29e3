pub mod auth;
pub mod response;

pub use auth::{caller_identity_middleware, Caller};
pub use response::{ApiResponse, ApiResult};
