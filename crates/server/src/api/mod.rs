pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod telegram;
pub mod validation;

pub use error::{ApiError, FieldError};
pub use middleware::RequestId;
pub use routes::create_router;
