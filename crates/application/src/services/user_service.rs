use std::sync::Arc;

use domain::{DomainError, PhotoLocator, User, UserId, Username};

use crate::{clock::Clock, error::ApplicationError, locks::KeyedLocks, repository::UserRepository};

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
    // 同名登录和改名按用户名串行，保证用户名唯一
    name_locks: KeyedLocks<String>,
    // 同一用户的资料修改按用户串行；需要两把锁时先取用户锁
    user_locks: KeyedLocks<UserId>,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self {
            deps,
            name_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    /// 按用户名登录，不存在则注册。返回用户以及是否为新注册。
    pub async fn login(&self, name: String) -> Result<(User, bool), ApplicationError> {
        let name = Username::parse(name)?;
        let _guard = self.name_locks.lock(name.as_str().to_owned()).await;

        if let Some(user) = self
            .deps
            .user_repository
            .find_by_name(name.as_str().to_owned())
            .await?
        {
            return Ok((user, false));
        }

        let user = User::register(UserId::generate(), name, self.deps.clock.now());
        let stored = self.deps.user_repository.save(user).await?;
        tracing::info!(user_id = %stored.id, name = %stored.name, "新用户已注册");
        Ok((stored, true))
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound.into())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApplicationError> {
        Ok(self.deps.user_repository.list_all().await?)
    }

    pub async fn update_username(
        &self,
        id: UserId,
        name: String,
    ) -> Result<User, ApplicationError> {
        let name = Username::parse(name)?;
        let _user_guard = self.user_locks.lock(id).await;
        let _name_guard = self.name_locks.lock(name.as_str().to_owned()).await;

        if let Some(owner) = self
            .deps
            .user_repository
            .find_by_name(name.as_str().to_owned())
            .await?
        {
            if owner.id != id {
                return Err(DomainError::UsernameTaken(name.as_str().to_owned()).into());
            }
        }

        let mut user = self.get_user(id).await?;
        if user.name == name {
            return Ok(user);
        }
        user.rename(name, self.deps.clock.now());
        let stored = self.deps.user_repository.save(user).await?;
        tracing::info!(user_id = %stored.id, name = %stored.name, "用户名已修改");
        Ok(stored)
    }

    pub async fn set_user_photo(
        &self,
        id: UserId,
        photo: PhotoLocator,
    ) -> Result<User, ApplicationError> {
        let _guard = self.user_locks.lock(id).await;

        let mut user = self.get_user(id).await?;
        user.set_photo(photo, self.deps.clock.now());
        let stored = self.deps.user_repository.save(user).await?;
        tracing::info!(user_id = %stored.id, "用户头像已更新");
        Ok(stored)
    }
}
