use domain::{DomainError, ErrorKind, RepositoryError};
use thiserror::Error;

use crate::photo::PhotoStoreError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("photo storage error: {0}")]
    Photo(#[from] PhotoStoreError),
    #[error("operation cancelled before commit")]
    Cancelled,
}

impl ApplicationError {
    /// 错误大类，传输层据此映射状态码
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::Domain(err) => err.kind(),
            ApplicationError::Repository(err) => err.kind(),
            ApplicationError::Photo(err) => err.kind(),
            ApplicationError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
