use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ConversationId, MessageId, PhotoLocator, Timestamp, UserId};

/// 文本消息的最大长度（字符数）
pub const MAX_TEXT_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Photo,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "photo" => Ok(Self::Photo),
            other => Err(DomainError::UnknownMessageKind(other.to_owned())),
        }
    }
}

/// 消息投递状态，只能单调前进：sent → received → read。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Received,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            "read" => Ok(Self::Read),
            _ => Err(DomainError::invalid_argument("status", "unknown status")),
        }
    }
}

/// 消息正文。消息类型由变体本身决定，不单独存储。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Photo(PhotoLocator),
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument("content", "cannot be empty"));
        }
        if value.chars().count() > MAX_TEXT_CHARS {
            return Err(DomainError::invalid_argument("content", "too long"));
        }
        Ok(Self::Text(value))
    }

    pub fn photo(locator: PhotoLocator) -> Self {
        Self::Photo(locator)
    }

    /// 从类型标签和原始内容构造，存储层和传输层共用。
    pub fn from_parts(kind: MessageKind, raw: impl Into<String>) -> Result<Self, DomainError> {
        match kind {
            MessageKind::Text => Self::text(raw),
            MessageKind::Photo => Ok(Self::Photo(PhotoLocator::new(raw)?)),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Photo(_) => MessageKind::Photo,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Photo(locator) => locator.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserId,
    pub content: MessageContent,
    pub status: MessageStatus,
    pub reply_to: Option<MessageId>,
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        sender: UserId,
        content: MessageContent,
        reply_to: Option<MessageId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender,
            content,
            status: MessageStatus::Sent,
            reply_to,
            created_at,
        }
    }

    /// 转发生成的是内容副本：新的标识、时间和状态，不保留回复关系。
    pub fn forward_to(
        &self,
        id: MessageId,
        target: ConversationId,
        sender: UserId,
        created_at: Timestamp,
    ) -> Self {
        Self::new(id, target, sender, self.content.clone(), None, created_at)
    }

    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }

    /// 推进投递状态。状态不变时返回 `Ok(false)`，回退则拒绝。
    pub fn advance_status(&mut self, next: MessageStatus) -> Result<bool, DomainError> {
        if next < self.status {
            return Err(DomainError::StatusRegression {
                from: self.status,
                to: next,
            });
        }
        if next == self.status {
            return Ok(false);
        }
        self.status = next;
        Ok(true)
    }

    /// 按 (时间, 标识) 排序的键，时间相同时仍然有确定顺序。
    pub fn chronological_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id)
    }
}
