mod conversation_manager;
mod membership_manager;
mod message_manager;
mod messaging_service;
mod reaction_manager;
mod user_service;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod membership_manager_tests;
#[cfg(test)]
mod messaging_service_tests;

pub use conversation_manager::{
    ConversationDetails, ConversationManager, ConversationManagerDependencies,
    CreateConversationRequest,
};
pub use membership_manager::{MembershipManager, MembershipManagerDependencies};
pub use message_manager::{MessageManager, MessageManagerDependencies, SendMessageRequest};
pub use messaging_service::{
    MessagingService, MessagingServiceDependencies, SendTextMessageRequest,
};
pub use reaction_manager::{ReactionManager, ReactionManagerDependencies};
pub use user_service::{UserService, UserServiceDependencies};
