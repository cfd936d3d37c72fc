use std::sync::Arc;

use application::{error::ApplicationError, identity::IdentityResolver, repository::UserRepository};
use async_trait::async_trait;
use domain::UserId;
use uuid::Uuid;

/// 登录时颁发的凭据就是用户标识；只有能解析为 UUID 且用户存在时才有效。
pub struct DirectoryIdentityResolver {
    users: Arc<dyn UserRepository>,
}

impl DirectoryIdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl IdentityResolver for DirectoryIdentityResolver {
    async fn resolve_credential(&self, token: &str) -> Result<Option<UserId>, ApplicationError> {
        let Ok(id) = Uuid::parse_str(token.trim()) else {
            return Ok(None);
        };
        let user = self.users.find_by_id(UserId::from(id)).await?;
        Ok(user.map(|user| user.id))
    }
}
