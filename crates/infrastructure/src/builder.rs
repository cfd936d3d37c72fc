use std::sync::Arc;

use application::{
    clock::Clock,
    identity::IdentityResolver,
    memory::InMemoryStore,
    photo::PhotoStore,
    repository::{ConversationRepository, MessageRepository, ReactionRepository, UserRepository},
    services::MessagingServiceDependencies,
};
use config::AppConfig;
use thiserror::Error;

use crate::{
    identity::DirectoryIdentityResolver,
    migrations::MIGRATOR,
    photo_store::FsPhotoStore,
    postgres::{create_pg_pool, PgStorage},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("photo directory error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// 组装好的全部适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub backend: StorageBackend,
    pub user_repository: Arc<dyn UserRepository>,
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub reaction_repository: Arc<dyn ReactionRepository>,
    pub photo_store: Arc<dyn PhotoStore>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl Infrastructure {
    /// 配置了数据库地址时连接 PostgreSQL 并执行迁移，否则使用内存存储。
    pub async fn build(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let photo_store = FsPhotoStore::new(
            config.storage.photo_dir.clone(),
            config.storage.max_photo_bytes,
        );
        photo_store.ensure_root().await?;
        let photo_store: Arc<dyn PhotoStore> = Arc::new(photo_store);

        match &config.database.url {
            Some(url) => {
                let pool = create_pg_pool(url, config.database.max_connections).await?;
                MIGRATOR.run(&pool).await?;
                tracing::info!("已连接 PostgreSQL 并完成迁移");

                let storage = PgStorage::new(pool);
                Ok(Self::assemble(
                    StorageBackend::Postgres,
                    storage.user_repository,
                    storage.conversation_repository,
                    storage.message_repository,
                    storage.reaction_repository,
                    photo_store,
                ))
            }
            None => {
                tracing::warn!("未配置数据库，使用内存存储，重启后数据会丢失");
                Ok(Self::in_memory(InMemoryStore::new(), photo_store))
            }
        }
    }

    pub fn in_memory(store: InMemoryStore, photo_store: Arc<dyn PhotoStore>) -> Self {
        let store = Arc::new(store);
        Self::assemble(
            StorageBackend::Memory,
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            photo_store,
        )
    }

    fn assemble(
        backend: StorageBackend,
        user_repository: Arc<dyn UserRepository>,
        conversation_repository: Arc<dyn ConversationRepository>,
        message_repository: Arc<dyn MessageRepository>,
        reaction_repository: Arc<dyn ReactionRepository>,
        photo_store: Arc<dyn PhotoStore>,
    ) -> Self {
        let identity = Arc::new(DirectoryIdentityResolver::new(user_repository.clone()));
        Self {
            backend,
            user_repository,
            conversation_repository,
            message_repository,
            reaction_repository,
            photo_store,
            identity,
        }
    }

    pub fn messaging_dependencies(&self, clock: Arc<dyn Clock>) -> MessagingServiceDependencies {
        MessagingServiceDependencies {
            user_repository: self.user_repository.clone(),
            conversation_repository: self.conversation_repository.clone(),
            message_repository: self.message_repository.clone(),
            reaction_repository: self.reaction_repository.clone(),
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_memory_without_database_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.photo_dir = dir.path().join("photos");

        let infra = Infrastructure::build(&config).await.unwrap();

        assert_eq!(infra.backend, StorageBackend::Memory);
        assert!(config.storage.photo_dir.is_dir());
    }
}
