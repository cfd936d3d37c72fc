//! 持久化端口
//!
//! 按聚合拆分的仓储接口。涉及多条记录的写入（消息 + 会话指针、
//! 删除消息 + 回应 + 会话指针）都是单个原子方法，实现方必须保证
//! 要么全部生效要么全部不生效。

use async_trait::async_trait;
use domain::{
    Conversation, ConversationId, Message, MessageId, Reaction, RepositoryError, User, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_name(&self, name: String) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<User, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;
    async fn save(&self, conversation: Conversation) -> Result<Conversation, RepositoryError>;
    async fn list_by_participant(&self, user: UserId)
        -> Result<Vec<Conversation>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;

    // 按时间正序返回会话内全部消息
    async fn list_by_conversation(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError>;

    // 原子地写入新消息并更新会话（最后一条消息指针）
    async fn insert(
        &self,
        message: Message,
        conversation: Conversation,
    ) -> Result<Message, RepositoryError>;

    // 更新已有消息（投递状态变化）
    async fn save(&self, message: Message) -> Result<Message, RepositoryError>;

    // 原子地删除消息及其全部回应，并写回重新计算过的会话
    async fn delete(
        &self,
        id: MessageId,
        conversation: Conversation,
    ) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReactionRepository: Send + Sync {
    async fn upsert(&self, reaction: Reaction) -> Result<Reaction, RepositoryError>;
    async fn delete(&self, message: MessageId, user: UserId) -> Result<(), RepositoryError>;
    async fn list_by_message(&self, message: MessageId) -> Result<Vec<Reaction>, RepositoryError>;
}
