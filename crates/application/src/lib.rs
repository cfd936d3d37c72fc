pub mod access;
pub mod cancellation;
pub mod clock;
pub mod dto;
pub mod error;
pub mod identity;
pub mod locks;
pub mod memory;
pub mod photo;
pub mod repository;
pub mod services;

pub use cancellation::run_cancellable;
pub use clock::{Clock, SystemClock};
pub use dto::{
    ConversationDto, LoginResponse, MessageDto, ParticipantDto, ReactionDto, UserDto,
};
pub use error::ApplicationError;
pub use identity::IdentityResolver;
pub use locks::KeyedLocks;
pub use memory::InMemoryStore;
pub use photo::{PhotoStore, PhotoStoreError, PhotoSubject};
pub use repository::{
    ConversationRepository, MessageRepository, ReactionRepository, UserRepository,
};
pub use services::{
    ConversationDetails, ConversationManager, CreateConversationRequest, MembershipManager,
    MessageManager, MessagingService, MessagingServiceDependencies, ReactionManager,
    SendMessageRequest, SendTextMessageRequest, UserService,
};
pub use tokio_util::sync::CancellationToken;
