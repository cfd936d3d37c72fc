use std::sync::Arc;

use application::{CancellationToken, IdentityResolver, MessagingService, PhotoStore};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MessagingService>,
    pub identity: Arc<dyn IdentityResolver>,
    pub photo_store: Arc<dyn PhotoStore>,
    /// 服务器关闭时取消，每个请求从它派生自己的令牌
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        service: Arc<MessagingService>,
        identity: Arc<dyn IdentityResolver>,
        photo_store: Arc<dyn PhotoStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            identity,
            photo_store,
            shutdown,
        }
    }

    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
