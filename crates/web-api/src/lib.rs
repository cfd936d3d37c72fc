//! Web API 层。
//!
//! 提供 Axum 路由，解析凭据后把 HTTP 请求委托给应用层的 `MessagingService`。

mod auth;
mod error;
mod routes;
mod state;

pub use auth::Caller;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
