use std::sync::Arc;

use domain::{Conversation, ConversationId, DomainError, GroupName, PhotoLocator, UserId};

use crate::{
    access::require_participant,
    error::ApplicationError,
    locks::KeyedLocks,
    repository::{ConversationRepository, UserRepository},
};

pub struct MembershipManagerDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub locks: Arc<KeyedLocks<ConversationId>>,
}

/// 群组成员与资料管理。单聊的成员关系不可变，所有操作对单聊都会被拒绝。
pub struct MembershipManager {
    deps: MembershipManagerDependencies,
}

impl MembershipManager {
    pub fn new(deps: MembershipManagerDependencies) -> Self {
        Self { deps }
    }

    async fn load_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        self.deps
            .conversation_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ConversationNotFound.into())
    }

    pub async fn add_member(
        &self,
        requester: UserId,
        group: ConversationId,
        new_user: UserId,
    ) -> Result<Conversation, ApplicationError> {
        let _guard = self.deps.locks.lock(group).await;

        let mut conversation = self.load_conversation(group).await?;
        require_participant(&conversation, requester)?;
        conversation.ensure_group()?;
        if conversation.is_participant(new_user) {
            return Err(DomainError::AlreadyParticipant(new_user).into());
        }
        if self
            .deps
            .user_repository
            .find_by_id(new_user)
            .await?
            .is_none()
        {
            return Err(DomainError::UnknownParticipant(new_user).into());
        }

        conversation.add_participant(new_user)?;
        let stored = self.deps.conversation_repository.save(conversation).await?;
        tracing::info!(
            conversation_id = %group,
            user_id = %new_user,
            requester = %requester,
            "成员已加入群组"
        );
        Ok(stored)
    }

    /// 幂等；最后一名成员离开后保留空群组
    pub async fn leave_group(
        &self,
        group: ConversationId,
        user: UserId,
    ) -> Result<(), ApplicationError> {
        let _guard = self.deps.locks.lock(group).await;

        let mut conversation = self.load_conversation(group).await?;
        if !conversation.remove_participant(user)? {
            return Ok(());
        }

        let stored = self.deps.conversation_repository.save(conversation).await?;
        tracing::info!(
            conversation_id = %group,
            user_id = %user,
            remaining = stored.participants.len(),
            "成员已离开群组"
        );
        Ok(())
    }

    /// 只检查调用者能否修改群资料，不加锁也不写入。
    pub async fn authorize_group_edit(
        &self,
        requester: UserId,
        group: ConversationId,
    ) -> Result<(), ApplicationError> {
        let conversation = self.load_conversation(group).await?;
        require_participant(&conversation, requester)?;
        conversation.ensure_group()?;
        Ok(())
    }

    pub async fn set_group_name(
        &self,
        requester: UserId,
        group: ConversationId,
        name: String,
    ) -> Result<Conversation, ApplicationError> {
        let _guard = self.deps.locks.lock(group).await;

        let mut conversation = self.load_conversation(group).await?;
        require_participant(&conversation, requester)?;
        conversation.ensure_group()?;
        conversation.rename(GroupName::parse(name)?)?;

        let stored = self.deps.conversation_repository.save(conversation).await?;
        tracing::info!(conversation_id = %group, requester = %requester, "群组名称已修改");
        Ok(stored)
    }

    pub async fn set_group_photo(
        &self,
        requester: UserId,
        group: ConversationId,
        photo: PhotoLocator,
    ) -> Result<Conversation, ApplicationError> {
        let _guard = self.deps.locks.lock(group).await;

        let mut conversation = self.load_conversation(group).await?;
        require_participant(&conversation, requester)?;
        conversation.set_photo(photo)?;

        let stored = self.deps.conversation_repository.save(conversation).await?;
        tracing::info!(conversation_id = %group, requester = %requester, "群组头像已修改");
        Ok(stored)
    }
}
