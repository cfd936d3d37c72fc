//! 内存仓储
//!
//! 用一把读写锁保护全部状态，因此每个原子方法天然满足“全部生效或全部不生效”。
//! 未配置数据库时作为运行时后端，同时也是服务层测试的默认存储。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use domain::{
    Conversation, ConversationId, Message, MessageId, Reaction, RepositoryError, User, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{
    ConversationRepository, MessageRepository, ReactionRepository, UserRepository,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<MessageId, Message>,
    reactions: HashMap<(MessageId, UserId), Reaction>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的回应数量，供测试断言使用
    pub async fn reaction_count(&self) -> usize {
        self.state.read().await.reactions.len()
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_name(&self, name: String) -> Result<Option<User>, RepositoryError> {
        let guard = self.state.read().await;
        Ok(guard
            .users
            .values()
            .find(|user| user.name.as_str() == name)
            .cloned())
    }

    async fn save(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.state.write().await;
        let name_taken = guard
            .users
            .values()
            .any(|other| other.id != user.id && other.name == user.name);
        if name_taken {
            return Err(RepositoryError::Conflict);
        }
        guard.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let guard = self.state.read().await;
        let mut users: Vec<User> = guard.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(users)
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn save(&self, conversation: Conversation) -> Result<Conversation, RepositoryError> {
        let mut guard = self.state.write().await;
        guard
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn list_by_participant(
        &self,
        user: UserId,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let guard = self.state.read().await;
        let mut conversations: Vec<Conversation> = guard
            .conversations
            .values()
            .filter(|conversation| conversation.is_participant(user))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn list_by_conversation(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let guard = self.state.read().await;
        let mut messages: Vec<Message> = guard
            .messages
            .values()
            .filter(|message| message.conversation_id == conversation)
            .cloned()
            .collect();
        messages.sort_by_key(Message::chronological_key);
        Ok(messages)
    }

    async fn insert(
        &self,
        message: Message,
        conversation: Conversation,
    ) -> Result<Message, RepositoryError> {
        let mut guard = self.state.write().await;
        if !guard.conversations.contains_key(&conversation.id) {
            return Err(RepositoryError::NotFound);
        }
        if guard.messages.contains_key(&message.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.messages.insert(message.id, message.clone());
        guard.conversations.insert(conversation.id, conversation);
        Ok(message)
    }

    async fn save(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut guard = self.state.write().await;
        match guard.messages.get_mut(&message.id) {
            Some(stored) => {
                *stored = message.clone();
                Ok(message)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete(
        &self,
        id: MessageId,
        conversation: Conversation,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.state.write().await;
        if guard.messages.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        guard.reactions.retain(|(message_id, _), _| *message_id != id);
        guard.conversations.insert(conversation.id, conversation);
        Ok(())
    }
}

#[async_trait]
impl ReactionRepository for InMemoryStore {
    async fn upsert(&self, reaction: Reaction) -> Result<Reaction, RepositoryError> {
        let mut guard = self.state.write().await;
        // 与外键约束一致：消息不存在时拒绝写入
        if !guard.messages.contains_key(&reaction.message_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.reactions.insert(reaction.key(), reaction.clone());
        Ok(reaction)
    }

    async fn delete(&self, message: MessageId, user: UserId) -> Result<(), RepositoryError> {
        self.state.write().await.reactions.remove(&(message, user));
        Ok(())
    }

    async fn list_by_message(&self, message: MessageId) -> Result<Vec<Reaction>, RepositoryError> {
        let guard = self.state.read().await;
        let mut reactions: Vec<Reaction> = guard
            .reactions
            .values()
            .filter(|reaction| reaction.message_id == message)
            .cloned()
            .collect();
        reactions.sort_by_key(|reaction| reaction.reacted_at);
        Ok(reactions)
    }
}
