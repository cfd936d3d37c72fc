use std::sync::Arc;

use domain::{
    Conversation, ConversationId, DomainError, Message, MessageContent, MessageId, MessageStatus,
    UserId,
};

use crate::{
    access::require_participant,
    clock::Clock,
    error::ApplicationError,
    locks::{KeyGuard, KeyedLocks},
    repository::{ConversationRepository, MessageRepository},
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub conversation_id: ConversationId,
    pub content: MessageContent,
    pub reply_to: Option<MessageId>,
}

pub struct MessageManagerDependencies {
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<KeyedLocks<ConversationId>>,
}

pub struct MessageManager {
    deps: MessageManagerDependencies,
}

/// 锁住消息所在会话后重新读取消息。
///
/// 先读一次是为了拿到会话标识；加锁期间消息可能已被删除，所以加锁后必须再读一次。
pub(crate) async fn lock_message(
    locks: &KeyedLocks<ConversationId>,
    messages: &dyn MessageRepository,
    id: MessageId,
) -> Result<(KeyGuard, Message), ApplicationError> {
    let conversation_id = messages
        .find_by_id(id)
        .await?
        .ok_or(DomainError::MessageNotFound)?
        .conversation_id;

    let guard = locks.lock(conversation_id).await;
    let message = messages
        .find_by_id(id)
        .await?
        .ok_or(DomainError::MessageNotFound)?;
    Ok((guard, message))
}

impl MessageManager {
    pub fn new(deps: MessageManagerDependencies) -> Self {
        Self { deps }
    }

    async fn load_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        self.deps
            .conversation_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ConversationNotFound.into())
    }

    pub async fn authorize_send(
        &self,
        sender: UserId,
        conversation: ConversationId,
    ) -> Result<(), ApplicationError> {
        let conversation = self.load_conversation(conversation).await?;
        require_participant(&conversation, sender)?;
        Ok(())
    }

    pub async fn find_message(&self, id: MessageId) -> Result<Option<Message>, ApplicationError> {
        Ok(self.deps.message_repository.find_by_id(id).await?)
    }

    pub async fn send_message(
        &self,
        sender: UserId,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let _guard = self.deps.locks.lock(request.conversation_id).await;

        let mut conversation = self.load_conversation(request.conversation_id).await?;
        require_participant(&conversation, sender)?;

        if let Some(target) = request.reply_to {
            let in_conversation = self
                .deps
                .message_repository
                .find_by_id(target)
                .await?
                .is_some_and(|message| message.conversation_id == conversation.id);
            if !in_conversation {
                return Err(DomainError::ReplyTargetOutsideConversation(target).into());
            }
        }

        let message = Message::new(
            MessageId::generate(),
            conversation.id,
            sender,
            request.content,
            request.reply_to,
            self.deps.clock.now(),
        );
        conversation.record_message(&message);

        let stored = self
            .deps
            .message_repository
            .insert(message, conversation)
            .await?;
        tracing::info!(
            conversation_id = %stored.conversation_id,
            message_id = %stored.id,
            user_id = %sender,
            kind = %stored.kind(),
            "消息已发送"
        );
        Ok(stored)
    }

    pub async fn forward_message(
        &self,
        user: UserId,
        message_id: MessageId,
        target: ConversationId,
    ) -> Result<Message, ApplicationError> {
        let source = self
            .deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound)?;
        let source_conversation = self.load_conversation(source.conversation_id).await?;
        require_participant(&source_conversation, user)?;

        let _guard = self.deps.locks.lock(target).await;
        let mut target_conversation = self.load_conversation(target).await?;
        require_participant(&target_conversation, user)?;

        let copy = source.forward_to(
            MessageId::generate(),
            target_conversation.id,
            user,
            self.deps.clock.now(),
        );
        target_conversation.record_message(&copy);

        let stored = self
            .deps
            .message_repository
            .insert(copy, target_conversation)
            .await?;
        tracing::info!(
            source_message_id = %source.id,
            message_id = %stored.id,
            conversation_id = %stored.conversation_id,
            user_id = %user,
            "消息已转发"
        );
        Ok(stored)
    }

    pub async fn delete_message(
        &self,
        user: UserId,
        message_id: MessageId,
    ) -> Result<(), ApplicationError> {
        let (_guard, message) = lock_message(
            &self.deps.locks,
            self.deps.message_repository.as_ref(),
            message_id,
        )
        .await?;

        if message.sender != user {
            return Err(DomainError::NotMessageOwner.into());
        }

        let mut conversation = self.load_conversation(message.conversation_id).await?;
        let remaining = self
            .deps
            .message_repository
            .list_by_conversation(conversation.id)
            .await?;
        conversation.recompute_last_message(remaining.iter().filter(|m| m.id != message.id));

        self.deps
            .message_repository
            .delete(message.id, conversation)
            .await?;
        tracing::info!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            user_id = %user,
            "消息已删除"
        );
        Ok(())
    }

    pub async fn update_status(
        &self,
        user: UserId,
        message_id: MessageId,
        status: MessageStatus,
    ) -> Result<Message, ApplicationError> {
        let (_guard, mut message) = lock_message(
            &self.deps.locks,
            self.deps.message_repository.as_ref(),
            message_id,
        )
        .await?;

        let conversation = self.load_conversation(message.conversation_id).await?;
        require_participant(&conversation, user)?;

        if !message.advance_status(status)? {
            return Ok(message);
        }

        let stored = self.deps.message_repository.save(message).await?;
        tracing::info!(
            message_id = %stored.id,
            status = %stored.status,
            user_id = %user,
            "消息状态已更新"
        );
        Ok(stored)
    }
}
