//! 服务层测试共用的构造工具

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::{Duration, Utc};
use domain::{
    Conversation, ConversationId, ConversationKind, Timestamp, User, UserId, Username,
};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    memory::InMemoryStore,
    repository::{ConversationRepository, UserRepository},
    services::{MessagingService, MessagingServiceDependencies},
};

/// 每次读取前进一秒，避免测试中出现相同时间戳
pub struct SteppingClock {
    base: Timestamp,
    ticks: AtomicI64,
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            base: Utc::now(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.base + Duration::seconds(tick)
    }
}

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(SteppingClock::default())
}

pub fn dependencies(store: &InMemoryStore) -> MessagingServiceDependencies {
    MessagingServiceDependencies {
        user_repository: Arc::new(store.clone()),
        conversation_repository: Arc::new(store.clone()),
        message_repository: Arc::new(store.clone()),
        reaction_repository: Arc::new(store.clone()),
        clock: clock(),
    }
}

/// 直接写入仓储的用户，不经过登录流程
pub async fn register(store: &InMemoryStore, name: &str) -> UserId {
    let user = User::register(
        UserId::generate(),
        Username::parse(name).unwrap(),
        Utc::now(),
    );
    UserRepository::save(store, user).await.unwrap().id
}

pub async fn open(
    store: &InMemoryStore,
    kind: ConversationKind,
    creator: UserId,
    invited: &[UserId],
) -> Conversation {
    let conversation = Conversation::open(
        ConversationId::generate(),
        kind,
        creator,
        invited,
        None,
        Utc::now(),
    )
    .unwrap();
    ConversationRepository::save(store, conversation)
        .await
        .unwrap()
}

/// 基于内存存储的完整门面
pub struct Harness {
    pub store: InMemoryStore,
    pub service: MessagingService,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let service = MessagingService::new(dependencies(&store));
        Self {
            store,
            service,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn login(&self, name: &str) -> UserId {
        let response = self
            .service
            .login(name.to_owned(), &self.cancel)
            .await
            .unwrap();
        UserId::from(response.identifier)
    }
}
