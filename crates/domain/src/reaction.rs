use crate::value_objects::{Emoji, MessageId, Timestamp, UserId};

/// 表情回应，以 (消息, 用户) 为键，每个键最多一条记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: Emoji,
    pub reacted_at: Timestamp,
}

impl Reaction {
    pub fn new(message_id: MessageId, user_id: UserId, emoji: Emoji, reacted_at: Timestamp) -> Self {
        Self {
            message_id,
            user_id,
            emoji,
            reacted_at,
        }
    }

    pub fn key(&self) -> (MessageId, UserId) {
        (self.message_id, self.user_id)
    }
}
