//! 基础设施层实现。
//!
//! 提供 PostgreSQL 仓储、本地图片存储和凭据解析等适配器，实现应用层定义的端口。

pub mod builder;
pub mod identity;
pub mod migrations;
pub mod photo_store;
pub mod postgres;

pub use builder::{Infrastructure, InfrastructureError, StorageBackend};
pub use identity::DirectoryIdentityResolver;
pub use migrations::MIGRATOR;
pub use photo_store::FsPhotoStore;
pub use postgres::{
    create_pg_pool, PgConversationRepository, PgMessageRepository, PgReactionRepository,
    PgStorage, PgUserRepository,
};
