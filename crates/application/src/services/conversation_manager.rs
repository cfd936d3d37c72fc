use std::sync::Arc;

use domain::{
    Conversation, ConversationId, ConversationKind, DomainError, GroupName, Message, UserId,
};

use crate::{
    clock::Clock,
    error::ApplicationError,
    repository::{ConversationRepository, MessageRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct CreateConversationRequest {
    pub kind: ConversationKind,
    pub participants: Vec<UserId>,
    pub name: Option<String>,
}

/// 会话及其按时间正序排列的全部消息
#[derive(Debug, Clone)]
pub struct ConversationDetails {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

pub struct ConversationManagerDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct ConversationManager {
    deps: ConversationManagerDependencies,
}

impl ConversationManager {
    pub fn new(deps: ConversationManagerDependencies) -> Self {
        Self { deps }
    }

    pub async fn create_conversation(
        &self,
        creator: UserId,
        request: CreateConversationRequest,
    ) -> Result<Conversation, ApplicationError> {
        // 空白名称视为未提供
        let name = request
            .name
            .filter(|name| !name.trim().is_empty())
            .map(GroupName::parse)
            .transpose()?;

        let conversation = Conversation::open(
            ConversationId::generate(),
            request.kind,
            creator,
            &request.participants,
            name,
            self.deps.clock.now(),
        )?;

        for participant in &conversation.participants {
            let exists = self
                .deps
                .user_repository
                .find_by_id(*participant)
                .await?
                .is_some();
            if !exists {
                return Err(DomainError::UnknownParticipant(*participant).into());
            }
        }

        let stored = self.deps.conversation_repository.save(conversation).await?;
        tracing::info!(
            conversation_id = %stored.id,
            kind = %stored.kind,
            participants = stored.participants.len(),
            "会话已创建"
        );
        Ok(stored)
    }

    pub async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        self.deps
            .conversation_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ConversationNotFound.into())
    }

    pub async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<ConversationDetails, ApplicationError> {
        let conversation = self.find_conversation(id).await?;
        let messages = self
            .deps
            .message_repository
            .list_by_conversation(conversation.id)
            .await?;
        Ok(ConversationDetails {
            conversation,
            messages,
        })
    }

    pub async fn list_conversations(
        &self,
        user: UserId,
    ) -> Result<Vec<Conversation>, ApplicationError> {
        let mut conversations = self
            .deps
            .conversation_repository
            .list_by_participant(user)
            .await?;
        // 不依赖存储层的排序实现
        conversations.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }
}
