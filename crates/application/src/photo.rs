use std::fmt;

use async_trait::async_trait;
use domain::{ConversationId, ErrorKind, PhotoLocator, UserId};
use thiserror::Error;

/// 图片归属，用于生成可读的存储文件名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSubject {
    User(UserId),
    Conversation(ConversationId),
}

impl fmt::Display for PhotoSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoSubject::User(id) => write!(f, "user-{id}"),
            PhotoSubject::Conversation(id) => write!(f, "conversation-{id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PhotoStoreError {
    #[error("photo is empty")]
    Empty,
    #[error("photo exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("photo storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhotoStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PhotoStoreError::Empty
            | PhotoStoreError::TooLarge { .. }
            | PhotoStoreError::UnsupportedFormat => ErrorKind::Validation,
            PhotoStoreError::Io(_) => ErrorKind::Storage,
        }
    }
}

/// 二进制图片存储。核心只接收它返回的定位符，从不接触原始字节。
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn store(
        &self,
        subject: PhotoSubject,
        bytes: Vec<u8>,
    ) -> Result<PhotoLocator, PhotoStoreError>;
}
