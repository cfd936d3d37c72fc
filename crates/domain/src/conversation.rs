//! 会话聚合
//!
//! 会话拥有自己的成员列表和“最后一条消息”指针。该指针是派生字段，
//! 只能通过 [`Conversation::record_message`] 和
//! [`Conversation::recompute_last_message`] 修改。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::message::Message;
use crate::value_objects::{ConversationId, GroupName, MessageId, PhotoLocator, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "direct" => Ok(Self::Direct),
            "group" => Ok(Self::Group),
            _ => Err(DomainError::invalid_argument("type", "unknown conversation type")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub name: Option<GroupName>,
    pub photo: Option<PhotoLocator>,
    /// 按加入顺序排列，不含重复
    pub participants: Vec<UserId>,
    pub last_message: Option<MessageId>,
    pub last_activity_at: Timestamp,
    pub created_at: Timestamp,
}

impl Conversation {
    /// 创建会话。成员集合为 `{creator} ∪ invited`，去重且创建者在首位。
    pub fn open(
        id: ConversationId,
        kind: ConversationKind,
        creator: UserId,
        invited: &[UserId],
        name: Option<GroupName>,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        if invited.is_empty() {
            return Err(DomainError::EmptyParticipantList);
        }

        let mut participants = Vec::with_capacity(invited.len() + 1);
        for user in std::iter::once(&creator).chain(invited) {
            if !participants.contains(user) {
                participants.push(*user);
            }
        }

        if kind == ConversationKind::Direct && participants.len() != 2 {
            return Err(DomainError::DirectParticipantCount {
                actual: participants.len(),
            });
        }

        Ok(Self {
            id,
            kind,
            name,
            photo: None,
            participants,
            last_message: None,
            last_activity_at: now,
            created_at: now,
        })
    }

    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    pub fn ensure_group(&self) -> Result<(), DomainError> {
        if self.is_group() {
            Ok(())
        } else {
            Err(DomainError::NotAGroup(self.id))
        }
    }

    pub fn add_participant(&mut self, user: UserId) -> Result<(), DomainError> {
        self.ensure_group()?;
        if self.is_participant(user) {
            return Err(DomainError::AlreadyParticipant(user));
        }
        self.participants.push(user);
        Ok(())
    }

    /// 移除成员，返回成员列表是否发生变化。
    pub fn remove_participant(&mut self, user: UserId) -> Result<bool, DomainError> {
        self.ensure_group()?;
        let before = self.participants.len();
        self.participants.retain(|member| *member != user);
        Ok(self.participants.len() != before)
    }

    pub fn rename(&mut self, name: GroupName) -> Result<(), DomainError> {
        self.ensure_group()?;
        self.name = Some(name);
        Ok(())
    }

    pub fn set_photo(&mut self, photo: PhotoLocator) -> Result<(), DomainError> {
        self.ensure_group()?;
        self.photo = Some(photo);
        Ok(())
    }

    /// 单聊中对方的标识，用于派生显示名称。
    pub fn peer_of(&self, user: UserId) -> Option<UserId> {
        match self.kind {
            ConversationKind::Direct => self.participants.iter().copied().find(|p| *p != user),
            ConversationKind::Group => None,
        }
    }

    /// 仅当新消息按 (时间, 标识) 排在当前最后一条之后时才移动指针，
    /// 与 [`Conversation::recompute_last_message`] 使用同一排序规则。
    pub fn record_message(&mut self, message: &Message) {
        let advances = match self.last_message {
            Some(current) => message.chronological_key() > (self.last_activity_at, current),
            None => true,
        };
        if advances {
            self.point_to(message);
        }
    }

    fn point_to(&mut self, message: &Message) {
        self.last_message = Some(message.id);
        self.last_activity_at = message.created_at.max(self.created_at);
    }

    /// 根据剩余消息重新计算最后一条消息指针，没有消息时清空。
    pub fn recompute_last_message<'a>(&mut self, remaining: impl IntoIterator<Item = &'a Message>) {
        let latest = remaining
            .into_iter()
            .filter(|message| message.conversation_id == self.id)
            .max_by_key(|message| message.chronological_key());

        match latest {
            Some(message) => self.point_to(message),
            None => {
                self.last_message = None;
                self.last_activity_at = self.created_at;
            }
        }
    }
}
