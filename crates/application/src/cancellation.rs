use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ApplicationError;

/// 让操作与取消信号竞争。取消优先，被取消的操作整体丢弃；
/// 由于每次写入都是单个原子的仓储调用，丢弃不会留下部分写入。
pub async fn run_cancellable<T, F>(
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, ApplicationError>
where
    F: Future<Output = Result<T, ApplicationError>>,
{
    if cancel.is_cancelled() {
        return Err(ApplicationError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApplicationError::Cancelled),
        result = operation => result,
    }
}
