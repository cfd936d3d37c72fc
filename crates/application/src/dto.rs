//! 对外传输结构
//!
//! 字段名与客户端约定一致（camelCase），由 web-api 直接序列化输出。

use chrono::{DateTime, Utc};
use domain::{Conversation, Message, Reaction, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub identifier: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            identifier: user.id.into(),
            name: user.name.as_str().to_owned(),
            photo: user.photo.as_ref().map(|photo| photo.as_str().to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub identifier: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDto {
    pub message_id: Uuid,
    pub user: Uuid,
    pub emoji: String,
}

impl From<&Reaction> for ReactionDto {
    fn from(reaction: &Reaction) -> Self {
        Self {
            message_id: reaction.message_id.into(),
            user: reaction.user_id.into(),
            emoji: reaction.emoji.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub sender: Uuid,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionDto>,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.into(),
            sender: message.sender.into(),
            timestamp: message.created_at,
            content: message.content.as_str().to_owned(),
            kind: message.kind().as_str().to_owned(),
            status: message.status.as_str().to_owned(),
            reply_to: message.reply_to.map(Uuid::from),
            reactions: Vec::new(),
        }
    }
}

impl MessageDto {
    pub fn with_reactions(mut self, reactions: &[Reaction]) -> Self {
        self.reactions = reactions.iter().map(ReactionDto::from).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub id: Uuid,
    pub name: String,
}

impl From<&User> for ParticipantDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            name: user.name.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub participants: Vec<ParticipantDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageDto>,
    /// 仅详情视图返回
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageDto>>,
}

impl ConversationDto {
    /// `name` 由调用方决定：群聊取群名，单聊取对方用户名。
    pub fn summary(
        conversation: &Conversation,
        name: String,
        participants: Vec<ParticipantDto>,
        last_message: Option<MessageDto>,
    ) -> Self {
        Self {
            id: conversation.id.into(),
            name,
            kind: conversation.kind.as_str().to_owned(),
            photo: conversation
                .photo
                .as_ref()
                .map(|photo| photo.as_str().to_owned()),
            participants,
            last_message,
            messages: None,
        }
    }

    pub fn with_messages(mut self, messages: Vec<MessageDto>) -> Self {
        self.messages = Some(messages);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ConversationId, MessageContent, MessageId, UserId};
    use serde_json::json;

    #[test]
    fn message_uses_client_field_names() {
        let message = Message::new(
            MessageId::generate(),
            ConversationId::generate(),
            UserId::generate(),
            MessageContent::text("hello").unwrap(),
            None,
            Utc::now(),
        );

        let value = serde_json::to_value(MessageDto::from(&message)).unwrap();
        assert_eq!(value["type"], json!("text"));
        assert_eq!(value["status"], json!("sent"));
        assert_eq!(value["content"], json!("hello"));
        assert!(value.get("replyTo").is_none());
        assert!(value.get("reactions").is_none());
    }

    #[test]
    fn reply_and_reactions_are_emitted_when_present() {
        let target = MessageId::generate();
        let mut message = Message::new(
            MessageId::generate(),
            ConversationId::generate(),
            UserId::generate(),
            MessageContent::text("re").unwrap(),
            Some(target),
            Utc::now(),
        );
        message.status = domain::MessageStatus::Read;
        let reaction = Reaction::new(
            message.id,
            UserId::generate(),
            domain::Emoji::parse("🔥").unwrap(),
            Utc::now(),
        );

        let value =
            serde_json::to_value(MessageDto::from(&message).with_reactions(&[reaction])).unwrap();
        assert_eq!(value["replyTo"], json!(target.0));
        assert_eq!(value["status"], json!("read"));
        assert_eq!(value["reactions"][0]["emoji"], json!("🔥"));
        assert_eq!(value["reactions"][0]["messageId"], json!(message.id.0));
    }

    #[test]
    fn empty_conversation_omits_photo_and_last_message() {
        let creator = UserId::generate();
        let conversation = Conversation::open(
            ConversationId::generate(),
            domain::ConversationKind::Group,
            creator,
            &[UserId::generate()],
            None,
            Utc::now(),
        )
        .unwrap();

        let value = serde_json::to_value(ConversationDto::summary(
            &conversation,
            "team".to_owned(),
            Vec::new(),
            None,
        ))
        .unwrap();
        assert_eq!(value["type"], json!("group"));
        assert!(value.get("photo").is_none());
        assert!(value.get("lastMessage").is_none());
        assert!(value.get("messages").is_none());
    }
}
