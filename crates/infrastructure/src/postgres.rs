//! PostgreSQL 仓储实现
//!
//! 多记录写入（消息 + 会话指针、删除消息 + 回应 + 会话指针）在同一个事务中完成。

use std::{collections::HashMap, sync::Arc};

use application::repository::{
    ConversationRepository, MessageRepository, ReactionRepository, UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Conversation, ConversationId, ConversationKind, Emoji, GroupName, Message, MessageContent,
    MessageId, MessageKind, MessageStatus, PhotoLocator, Reaction, RepositoryError, User, UserId,
    Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgConnection, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

fn optional_photo(photo: Option<String>) -> Result<Option<PhotoLocator>, RepositoryError> {
    photo
        .map(PhotoLocator::new)
        .transpose()
        .map_err(|err| invalid_data(err.to_string()))
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    photo: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let name = Username::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        Ok(User {
            id: UserId::from(value.id),
            name,
            photo: optional_photo(value.photo)?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ConversationRecord {
    id: Uuid,
    kind: String,
    name: Option<String>,
    photo: Option<String>,
    last_message_id: Option<Uuid>,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl ConversationRecord {
    fn into_conversation(self, participants: Vec<UserId>) -> Result<Conversation, RepositoryError> {
        let kind: ConversationKind = self
            .kind
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        let name = self
            .name
            .map(GroupName::parse)
            .transpose()
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Conversation {
            id: ConversationId::from(self.id),
            kind,
            name,
            photo: optional_photo(self.photo)?,
            participants,
            last_message: self.last_message_id.map(MessageId::from),
            last_activity_at: self.last_activity_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ParticipantRecord {
    conversation_id: Uuid,
    user_id: Uuid,
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    kind: String,
    content: String,
    status: String,
    reply_to: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let kind: MessageKind = value
            .kind
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        let status: MessageStatus = value
            .status
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        let content = MessageContent::from_parts(kind, value.content)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message {
            id: MessageId::from(value.id),
            conversation_id: ConversationId::from(value.conversation_id),
            sender: UserId::from(value.sender_id),
            content,
            status,
            reply_to: value.reply_to.map(MessageId::from),
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReactionRecord {
    message_id: Uuid,
    user_id: Uuid,
    emoji: String,
    reacted_at: DateTime<Utc>,
}

impl TryFrom<ReactionRecord> for Reaction {
    type Error = RepositoryError;

    fn try_from(value: ReactionRecord) -> Result<Self, Self::Error> {
        let emoji = Emoji::parse(value.emoji).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Reaction::new(
            MessageId::from(value.message_id),
            UserId::from(value.user_id),
            emoji,
            value.reacted_at,
        ))
    }
}

const USER_COLUMNS: &str = "id, name, photo, created_at, updated_at";
const CONVERSATION_COLUMNS: &str =
    "id, kind, name, photo, last_message_id, last_activity_at, created_at";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, kind, content, status, reply_to, created_at";

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_name(&self, name: String) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn save(&self, user: User) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (id, name, photo, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, photo = EXCLUDED.photo, updated_at = EXCLUDED.updated_at
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::from(user.id))
        .bind(user.name.as_str())
        .bind(user.photo.as_ref().map(|photo| photo.as_str()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }
}

pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_participants(
        &self,
        records: Vec<ConversationRecord>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();
        let rows = sqlx::query_as::<_, ParticipantRecord>(
            r#"
            SELECT conversation_id, user_id
            FROM conversation_participants
            WHERE conversation_id = ANY($1)
            ORDER BY conversation_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut members: HashMap<Uuid, Vec<UserId>> = HashMap::new();
        for row in rows {
            members
                .entry(row.conversation_id)
                .or_default()
                .push(UserId::from(row.user_id));
        }

        records
            .into_iter()
            .map(|record| {
                let participants = members.remove(&record.id).unwrap_or_default();
                record.into_conversation(participants)
            })
            .collect()
    }
}

/// 写入会话行并整体替换成员列表
async fn write_conversation(
    conn: &mut PgConnection,
    conversation: &Conversation,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO conversations (id, kind, name, photo, last_message_id, last_activity_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name,
            photo = EXCLUDED.photo,
            last_message_id = EXCLUDED.last_message_id,
            last_activity_at = EXCLUDED.last_activity_at
        "#,
    )
    .bind(Uuid::from(conversation.id))
    .bind(conversation.kind.as_str())
    .bind(conversation.name.as_ref().map(|name| name.as_str()))
    .bind(conversation.photo.as_ref().map(|photo| photo.as_str()))
    .bind(conversation.last_message.map(Uuid::from))
    .bind(conversation.last_activity_at)
    .bind(conversation.created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = $1")
        .bind(Uuid::from(conversation.id))
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_err)?;

    let participants: Vec<Uuid> = conversation
        .participants
        .iter()
        .copied()
        .map(Uuid::from)
        .collect();
    sqlx::query(
        r#"
        INSERT INTO conversation_participants (conversation_id, user_id, position)
        SELECT $1, member.user_id, (member.ord - 1)::INTEGER
        FROM UNNEST($2::UUID[]) WITH ORDINALITY AS member(user_id, ord)
        "#,
    )
    .bind(Uuid::from(conversation.id))
    .bind(&participants)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    Ok(())
}

/// 只更新最后一条消息指针；成员变化与消息写入共用同一把会话锁
async fn write_last_message(
    conn: &mut PgConnection,
    conversation: &Conversation,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE conversations SET last_message_id = $2, last_activity_at = $3 WHERE id = $1",
    )
    .bind(Uuid::from(conversation.id))
    .bind(conversation.last_message.map(Uuid::from))
    .bind(conversation.last_activity_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        match record {
            Some(record) => Ok(self.attach_participants(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation: Conversation) -> Result<Conversation, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        write_conversation(&mut tx, &conversation).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(conversation)
    }

    async fn list_by_participant(
        &self,
        user: UserId,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE id IN (
                SELECT conversation_id FROM conversation_participants WHERE user_id = $1
            )
            ORDER BY last_activity_at DESC, id
            "#
        ))
        .bind(Uuid::from(user))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        self.attach_participants(records).await
    }
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Message::try_from).transpose()
    }

    async fn list_by_conversation(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 ORDER BY created_at, id"
        ))
        .bind(Uuid::from(conversation))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn insert(
        &self,
        message: Message,
        conversation: Conversation,
    ) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, kind, content, status, reply_to, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.conversation_id))
        .bind(Uuid::from(message.sender))
        .bind(message.kind().as_str())
        .bind(message.content.as_str())
        .bind(message.status.as_str())
        .bind(message.reply_to.map(Uuid::from))
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        write_last_message(&mut tx, &conversation).await?;
        tx.commit().await.map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn save(&self, message: Message) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "UPDATE messages SET status = $2 WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::from(message.id))
        .bind(message.status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        Message::try_from(record)
    }

    async fn delete(
        &self,
        id: MessageId,
        conversation: Conversation,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query("DELETE FROM reactions WHERE message_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        let deleted = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        write_last_message(&mut tx, &conversation).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }
}

pub struct PgReactionRepository {
    pool: PgPool,
}

impl PgReactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReactionRepository for PgReactionRepository {
    async fn upsert(&self, reaction: Reaction) -> Result<Reaction, RepositoryError> {
        let record = sqlx::query_as::<_, ReactionRecord>(
            r#"
            INSERT INTO reactions (message_id, user_id, emoji, reacted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (message_id, user_id) DO UPDATE
            SET emoji = EXCLUDED.emoji, reacted_at = EXCLUDED.reacted_at
            RETURNING message_id, user_id, emoji, reacted_at
            "#,
        )
        .bind(Uuid::from(reaction.message_id))
        .bind(Uuid::from(reaction.user_id))
        .bind(reaction.emoji.as_str())
        .bind(reaction.reacted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Reaction::try_from(record)
    }

    async fn delete(&self, message: MessageId, user: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM reactions WHERE message_id = $1 AND user_id = $2")
            .bind(Uuid::from(message))
            .bind(Uuid::from(user))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list_by_message(&self, message: MessageId) -> Result<Vec<Reaction>, RepositoryError> {
        let records = sqlx::query_as::<_, ReactionRecord>(
            r#"
            SELECT message_id, user_id, emoji, reacted_at
            FROM reactions
            WHERE message_id = $1
            ORDER BY reacted_at
            "#,
        )
        .bind(Uuid::from(message))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Reaction::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub conversation_repository: Arc<PgConversationRepository>,
    pub message_repository: Arc<PgMessageRepository>,
    pub reaction_repository: Arc<PgReactionRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            conversation_repository: Arc::new(PgConversationRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            reaction_repository: Arc::new(PgReactionRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
