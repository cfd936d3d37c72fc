//! 成员身份校验
//!
//! 所有需要成员身份的操作都通过这里的谓词检查，避免各处各写一遍。

use domain::{Conversation, DomainError, UserId};

pub fn is_participant(conversation: &Conversation, user: UserId) -> bool {
    conversation.is_participant(user)
}

pub fn require_participant(conversation: &Conversation, user: UserId) -> Result<(), DomainError> {
    if is_participant(conversation, user) {
        Ok(())
    } else {
        Err(DomainError::NotParticipant)
    }
}
