use async_trait::async_trait;
use domain::UserId;

use crate::error::ApplicationError;

/// 凭据解析器：把客户端携带的不透明凭据映射为用户标识。
/// 凭据无效或对应用户不存在时返回 `Ok(None)`。
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_credential(&self, token: &str) -> Result<Option<UserId>, ApplicationError>;
}
