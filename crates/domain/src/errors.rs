//! 领域模型错误定义
//!
//! 每个错误都归入一个 [`ErrorKind`]，传输层据此决定对外的状态码，
//! 领域层本身不关心具体映射。

use thiserror::Error;

use crate::message::MessageStatus;
use crate::value_objects::{ConversationId, MessageId, UserId};

/// 错误大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 输入格式错误或语义上不合法
    Validation,
    /// 调用者缺少成员身份或所有权
    Authorization,
    /// 引用的用户、会话或消息不存在
    NotFound,
    /// 持久化层失败，由调用方决定是否重试
    Storage,
    /// 调用方在提交前取消了操作
    Cancelled,
}

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("participant list cannot be empty")]
    EmptyParticipantList,

    #[error("direct conversation requires exactly 2 participants, got {actual}")]
    DirectParticipantCount { actual: usize },

    #[error("participant {0} does not exist")]
    UnknownParticipant(UserId),

    #[error("reply target {0} is not a message of this conversation")]
    ReplyTargetOutsideConversation(MessageId),

    #[error("conversation {0} is not a group")]
    NotAGroup(ConversationId),

    #[error("user {0} is already a participant")]
    AlreadyParticipant(UserId),

    #[error("username {0} is already taken")]
    UsernameTaken(String),

    #[error("message status cannot move from {from} back to {to}")]
    StatusRegression {
        from: MessageStatus,
        to: MessageStatus,
    },

    #[error("unknown message type: {0}")]
    UnknownMessageKind(String),

    /// 调用者不是会话成员
    #[error("user is not a participant of this conversation")]
    NotParticipant,

    /// 只有发送者可以删除自己的消息
    #[error("only the sender may delete this message")]
    NotMessageOwner,

    #[error("user not found")]
    UserNotFound,

    #[error("conversation not found")]
    ConversationNotFound,

    #[error("message not found")]
    MessageNotFound,
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. }
            | Self::EmptyParticipantList
            | Self::DirectParticipantCount { .. }
            | Self::UnknownParticipant(_)
            | Self::ReplyTargetOutsideConversation(_)
            | Self::NotAGroup(_)
            | Self::AlreadyParticipant(_)
            | Self::UsernameTaken(_)
            | Self::StatusRegression { .. }
            | Self::UnknownMessageKind(_) => ErrorKind::Validation,
            Self::NotParticipant | Self::NotMessageOwner => ErrorKind::Authorization,
            Self::UserNotFound | Self::ConversationNotFound | Self::MessageNotFound => {
                ErrorKind::NotFound
            }
        }
    }
}

/// 仓储层错误，由持久化适配器产生并原样向上传递。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record conflicts with an existing one")]
    Conflict,
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Conflict => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
