use std::sync::Arc;

use domain::{ConversationId, DomainError, Emoji, MessageId, Reaction, UserId};

use crate::{
    access::require_participant,
    clock::Clock,
    error::ApplicationError,
    locks::KeyedLocks,
    repository::{ConversationRepository, MessageRepository, ReactionRepository},
    services::message_manager::lock_message,
};

pub struct ReactionManagerDependencies {
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub reaction_repository: Arc<dyn ReactionRepository>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<KeyedLocks<ConversationId>>,
}

pub struct ReactionManager {
    deps: ReactionManagerDependencies,
}

impl ReactionManager {
    pub fn new(deps: ReactionManagerDependencies) -> Self {
        Self { deps }
    }

    /// 添加或替换回应。与删除消息共用会话锁，回应不会比消息活得更久。
    pub async fn add_reaction(
        &self,
        user: UserId,
        message_id: MessageId,
        emoji: String,
    ) -> Result<Reaction, ApplicationError> {
        let (_guard, message) = lock_message(
            &self.deps.locks,
            self.deps.message_repository.as_ref(),
            message_id,
        )
        .await?;

        let conversation = self
            .deps
            .conversation_repository
            .find_by_id(message.conversation_id)
            .await?
            .ok_or(DomainError::ConversationNotFound)?;
        require_participant(&conversation, user)?;

        let emoji = Emoji::parse(emoji)?;
        let reaction = Reaction::new(message.id, user, emoji, self.deps.clock.now());
        let stored = self.deps.reaction_repository.upsert(reaction).await?;
        tracing::info!(
            message_id = %stored.message_id,
            user_id = %user,
            emoji = stored.emoji.as_str(),
            "回应已记录"
        );
        Ok(stored)
    }

    /// 幂等：消息或回应不存在都视为成功
    pub async fn remove_reaction(
        &self,
        user: UserId,
        message_id: MessageId,
    ) -> Result<(), ApplicationError> {
        let Some(message) = self.deps.message_repository.find_by_id(message_id).await? else {
            return Ok(());
        };

        let _guard = self.deps.locks.lock(message.conversation_id).await;
        self.deps
            .reaction_repository
            .delete(message_id, user)
            .await?;
        tracing::debug!(message_id = %message_id, user_id = %user, "回应已移除");
        Ok(())
    }

    pub async fn list_reactions(
        &self,
        message_id: MessageId,
    ) -> Result<Vec<Reaction>, ApplicationError> {
        Ok(self
            .deps
            .reaction_repository
            .list_by_message(message_id)
            .await?)
    }
}
