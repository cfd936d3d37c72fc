//! Bearer 凭据解析
//!
//! 凭据由 `IdentityResolver` 解析为用户标识后放进请求扩展，处理函数通过
//! [`Caller`] 取出并显式传给服务层。

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use domain::UserId;

use crate::{error::ApiError, state::AppState};

/// 已认证的调用者
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer credential"))?;

    let user = state
        .identity
        .resolve_credential(token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("unknown credential"))?;

    req.extensions_mut().insert(Caller(user));
    Ok(next.run(req).await)
}
