//! 消息服务门面
//!
//! 对传输层暴露的唯一入口。每个方法显式接收调用者身份和取消令牌，
//! 把请求分派给各个管理器，并把结果整理为传输结构。

use std::sync::Arc;

use domain::{
    Conversation, ConversationId, DomainError, ErrorKind, Message, MessageContent, MessageId,
    MessageKind, MessageStatus, PhotoLocator, UserId,
};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    access::require_participant,
    cancellation::run_cancellable,
    clock::Clock,
    dto::{ConversationDto, LoginResponse, MessageDto, ParticipantDto, ReactionDto, UserDto},
    error::ApplicationError,
    locks::KeyedLocks,
    repository::{ConversationRepository, MessageRepository, ReactionRepository, UserRepository},
    services::{
        conversation_manager::{
            ConversationManager, ConversationManagerDependencies, CreateConversationRequest,
        },
        membership_manager::{MembershipManager, MembershipManagerDependencies},
        message_manager::{MessageManager, MessageManagerDependencies, SendMessageRequest},
        reaction_manager::{ReactionManager, ReactionManagerDependencies},
        user_service::{UserService, UserServiceDependencies},
    },
};

#[derive(Debug, Clone)]
pub struct SendTextMessageRequest {
    pub conversation_id: ConversationId,
    pub content: String,
    pub reply_to: Option<MessageId>,
}

pub struct MessagingServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub reaction_repository: Arc<dyn ReactionRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessagingService {
    users: UserService,
    conversations: ConversationManager,
    messages: MessageManager,
    reactions: ReactionManager,
    membership: MembershipManager,
}

fn log_failure(err: &ApplicationError) {
    match err.kind() {
        ErrorKind::Storage => tracing::error!(error = %err, "存储层失败"),
        ErrorKind::Cancelled => tracing::debug!("操作已取消"),
        _ => tracing::warn!(error = %err, "操作被拒绝"),
    }
}

impl MessagingService {
    pub fn new(deps: MessagingServiceDependencies) -> Self {
        let locks = Arc::new(KeyedLocks::new());

        Self {
            users: UserService::new(UserServiceDependencies {
                user_repository: deps.user_repository.clone(),
                clock: deps.clock.clone(),
            }),
            conversations: ConversationManager::new(ConversationManagerDependencies {
                user_repository: deps.user_repository.clone(),
                conversation_repository: deps.conversation_repository.clone(),
                message_repository: deps.message_repository.clone(),
                clock: deps.clock.clone(),
            }),
            messages: MessageManager::new(MessageManagerDependencies {
                conversation_repository: deps.conversation_repository.clone(),
                message_repository: deps.message_repository.clone(),
                clock: deps.clock.clone(),
                locks: locks.clone(),
            }),
            reactions: ReactionManager::new(ReactionManagerDependencies {
                conversation_repository: deps.conversation_repository.clone(),
                message_repository: deps.message_repository.clone(),
                reaction_repository: deps.reaction_repository,
                clock: deps.clock,
                locks: locks.clone(),
            }),
            membership: MembershipManager::new(MembershipManagerDependencies {
                user_repository: deps.user_repository,
                conversation_repository: deps.conversation_repository,
                locks,
            }),
        }
    }

    async fn message_view(&self, message: &Message) -> Result<MessageDto, ApplicationError> {
        let reactions = self.reactions.list_reactions(message.id).await?;
        Ok(MessageDto::from(message).with_reactions(&reactions))
    }

    async fn participant_views(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<ParticipantDto>, ApplicationError> {
        let mut views = Vec::with_capacity(conversation.participants.len());
        for participant in &conversation.participants {
            let user = self.users.get_user(*participant).await?;
            views.push(ParticipantDto::from(&user));
        }
        Ok(views)
    }

    /// 群聊显示群名；单聊未命名时显示对方的用户名
    fn display_name(
        conversation: &Conversation,
        viewer: UserId,
        participants: &[ParticipantDto],
    ) -> String {
        if let Some(name) = &conversation.name {
            return name.as_str().to_owned();
        }
        conversation
            .peer_of(viewer)
            .and_then(|peer| participants.iter().find(|p| p.id == peer.0))
            .map(|peer| peer.name.clone())
            .unwrap_or_default()
    }

    async fn conversation_summary(
        &self,
        conversation: &Conversation,
        viewer: UserId,
    ) -> Result<ConversationDto, ApplicationError> {
        let participants = self.participant_views(conversation).await?;
        let last_message = match conversation.last_message {
            Some(id) => match self.messages.find_message(id).await? {
                Some(message) => Some(self.message_view(&message).await?),
                None => None,
            },
            None => None,
        };
        let name = Self::display_name(conversation, viewer, &participants);
        Ok(ConversationDto::summary(
            conversation,
            name,
            participants,
            last_message,
        ))
    }

    #[instrument(skip_all)]
    pub async fn login(
        &self,
        name: String,
        cancel: &CancellationToken,
    ) -> Result<LoginResponse, ApplicationError> {
        run_cancellable(cancel, async {
            let (user, _created) = self.users.login(name).await?;
            Ok(LoginResponse {
                identifier: user.id.into(),
            })
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn get_user(
        &self,
        caller: UserId,
        user: UserId,
        cancel: &CancellationToken,
    ) -> Result<UserDto, ApplicationError> {
        run_cancellable(cancel, async {
            let user = self.users.get_user(user).await?;
            Ok(UserDto::from(&user))
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn list_users(
        &self,
        caller: UserId,
        cancel: &CancellationToken,
    ) -> Result<Vec<UserDto>, ApplicationError> {
        run_cancellable(cancel, async {
            let users = self.users.list_users().await?;
            Ok(users.iter().map(UserDto::from).collect())
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn update_username(
        &self,
        caller: UserId,
        name: String,
        cancel: &CancellationToken,
    ) -> Result<UserDto, ApplicationError> {
        run_cancellable(cancel, async {
            let user = self.users.update_username(caller, name).await?;
            Ok(UserDto::from(&user))
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn set_user_photo(
        &self,
        caller: UserId,
        photo: PhotoLocator,
        cancel: &CancellationToken,
    ) -> Result<UserDto, ApplicationError> {
        run_cancellable(cancel, async {
            let user = self.users.set_user_photo(caller, photo).await?;
            Ok(UserDto::from(&user))
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller, kind = %request.kind))]
    pub async fn create_conversation(
        &self,
        caller: UserId,
        request: CreateConversationRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversationDto, ApplicationError> {
        run_cancellable(cancel, async {
            let conversation = self
                .conversations
                .create_conversation(caller, request)
                .await?;
            self.conversation_summary(&conversation, caller).await
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn get_conversations(
        &self,
        caller: UserId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConversationDto>, ApplicationError> {
        run_cancellable(cancel, async {
            let conversations = self.conversations.list_conversations(caller).await?;
            let mut views = Vec::with_capacity(conversations.len());
            for conversation in &conversations {
                views.push(self.conversation_summary(conversation, caller).await?);
            }
            Ok(views)
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn get_conversation(
        &self,
        caller: UserId,
        id: ConversationId,
        cancel: &CancellationToken,
    ) -> Result<ConversationDto, ApplicationError> {
        run_cancellable(cancel, async {
            let details = self.conversations.get_conversation(id).await?;
            require_participant(&details.conversation, caller)?;

            let mut messages = Vec::with_capacity(details.messages.len());
            for message in &details.messages {
                messages.push(self.message_view(message).await?);
            }
            let summary = self
                .conversation_summary(&details.conversation, caller)
                .await?;
            Ok(summary.with_messages(messages))
        })
        .await
        .inspect_err(log_failure)
    }

    async fn dispatch_message(
        &self,
        caller: UserId,
        request: SendMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<MessageDto, ApplicationError> {
        run_cancellable(cancel, async {
            let message = self.messages.send_message(caller, request).await?;
            Ok(MessageDto::from(&message))
        })
        .await
        .inspect_err(log_failure)
    }

    /// 按类型标签分派。标签来自客户端，未知标签属于校验错误；
    /// 图片消息只能走上传接口，不接受客户端自带的定位符。
    #[instrument(skip_all, fields(caller = %caller, conversation_id = %conversation_id))]
    pub async fn send_message(
        &self,
        caller: UserId,
        conversation_id: ConversationId,
        kind: &str,
        content: String,
        reply_to: Option<MessageId>,
        cancel: &CancellationToken,
    ) -> Result<MessageDto, ApplicationError> {
        let content = kind
            .parse::<MessageKind>()
            .and_then(|kind| match kind {
                MessageKind::Text => MessageContent::text(content),
                MessageKind::Photo => Err(DomainError::invalid_argument(
                    "type",
                    "photo messages must be uploaded",
                )),
            })
            .map_err(ApplicationError::from)
            .inspect_err(log_failure)?;

        let request = SendMessageRequest {
            conversation_id,
            content,
            reply_to,
        };
        self.dispatch_message(caller, request, cancel).await
    }

    #[instrument(skip_all, fields(caller = %caller, conversation_id = %request.conversation_id))]
    pub async fn send_text_message(
        &self,
        caller: UserId,
        request: SendTextMessageRequest,
        cancel: &CancellationToken,
    ) -> Result<MessageDto, ApplicationError> {
        let content = MessageContent::text(request.content)
            .map_err(ApplicationError::from)
            .inspect_err(log_failure)?;

        let request = SendMessageRequest {
            conversation_id: request.conversation_id,
            content,
            reply_to: request.reply_to,
        };
        self.dispatch_message(caller, request, cancel).await
    }

    /// 只校验调用者是会话成员，在保存上传的图片之前调用。
    #[instrument(skip_all, fields(caller = %caller, conversation_id = %conversation_id))]
    pub async fn authorize_message_send(
        &self,
        caller: UserId,
        conversation_id: ConversationId,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, self.messages.authorize_send(caller, conversation_id))
            .await
            .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller, conversation_id = %conversation_id))]
    pub async fn send_photo_message(
        &self,
        caller: UserId,
        conversation_id: ConversationId,
        photo: PhotoLocator,
        reply_to: Option<MessageId>,
        cancel: &CancellationToken,
    ) -> Result<MessageDto, ApplicationError> {
        let request = SendMessageRequest {
            conversation_id,
            content: MessageContent::photo(photo),
            reply_to,
        };
        self.dispatch_message(caller, request, cancel).await
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn forward_message(
        &self,
        caller: UserId,
        message: MessageId,
        target: ConversationId,
        cancel: &CancellationToken,
    ) -> Result<MessageDto, ApplicationError> {
        run_cancellable(cancel, async {
            let copy = self
                .messages
                .forward_message(caller, message, target)
                .await?;
            Ok(MessageDto::from(&copy))
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn add_reaction(
        &self,
        caller: UserId,
        message: MessageId,
        emoji: String,
        cancel: &CancellationToken,
    ) -> Result<ReactionDto, ApplicationError> {
        run_cancellable(cancel, async {
            let reaction = self.reactions.add_reaction(caller, message, emoji).await?;
            Ok(ReactionDto::from(&reaction))
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn remove_reaction(
        &self,
        caller: UserId,
        message: MessageId,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, self.reactions.remove_reaction(caller, message))
            .await
            .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn delete_message(
        &self,
        caller: UserId,
        message: MessageId,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, self.messages.delete_message(caller, message))
            .await
            .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn update_message_status(
        &self,
        caller: UserId,
        message: MessageId,
        status: &str,
        cancel: &CancellationToken,
    ) -> Result<MessageDto, ApplicationError> {
        run_cancellable(cancel, async {
            let status: MessageStatus = status.parse()?;
            let message = self.messages.update_status(caller, message, status).await?;
            self.message_view(&message).await
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn add_to_group(
        &self,
        caller: UserId,
        group: ConversationId,
        user: UserId,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, async {
            self.membership.add_member(caller, group, user).await?;
            Ok(())
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn leave_group(
        &self,
        caller: UserId,
        group: ConversationId,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, self.membership.leave_group(group, caller))
            .await
            .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn set_group_name(
        &self,
        caller: UserId,
        group: ConversationId,
        name: String,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, async {
            self.membership.set_group_name(caller, group, name).await?;
            Ok(())
        })
        .await
        .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn authorize_group_edit(
        &self,
        caller: UserId,
        group: ConversationId,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, self.membership.authorize_group_edit(caller, group))
            .await
            .inspect_err(log_failure)
    }

    #[instrument(skip_all, fields(caller = %caller))]
    pub async fn set_group_photo(
        &self,
        caller: UserId,
        group: ConversationId,
        photo: PhotoLocator,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        run_cancellable(cancel, async {
            self.membership.set_group_photo(caller, group, photo).await?;
            Ok(())
        })
        .await
        .inspect_err(log_failure)
    }
}
