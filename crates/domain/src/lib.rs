//! 消息系统核心领域模型
//!
//! 包含用户、会话、消息、表情回应等核心实体，以及它们各自的不变量。

pub mod conversation;
pub mod errors;
pub mod message;
pub mod reaction;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use conversation::{Conversation, ConversationKind};
pub use errors::{DomainError, DomainResult, ErrorKind, RepositoryError};
pub use message::{Message, MessageContent, MessageKind, MessageStatus};
pub use reaction::Reaction;
pub use user::User;
pub use value_objects::{
    ConversationId, Emoji, GroupName, MessageId, PhotoLocator, Timestamp, UserId, Username,
};
