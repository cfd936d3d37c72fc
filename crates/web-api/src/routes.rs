use std::{collections::HashMap, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use application::{
    ApplicationError, ConversationDto, CreateConversationRequest, LoginResponse, MessageDto,
    PhotoSubject, ReactionDto, UserDto,
};
use config::AppConfig;
use domain::{ConversationKind, PhotoLocator};
use infrastructure::photo_store::PUBLIC_PREFIX;

use crate::{
    auth::{require_auth, Caller},
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct LoginPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NamePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateConversationPayload {
    participants: Vec<Uuid>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessagePayload {
    conversation_id: Uuid,
    content: String,
    #[serde(rename = "type", default = "default_message_type")]
    kind: String,
    #[serde(default)]
    reply_to: Option<Uuid>,
}

fn default_message_type() -> String {
    "text".to_owned()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardPayload {
    message_id: Uuid,
    target_conversation_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ReactionPayload {
    emoji: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberPayload {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct PhotoResponse {
    photo: PhotoLocator,
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let protected = api_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .route("/session", post(login))
        .merge(protected)
        // multipart 的边界和字段头需要少量额外空间
        .layer(DefaultBodyLimit::max(config.storage.max_photo_bytes + 64 * 1024));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&config.storage.photo_dir))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{user_id}", get(get_user))
        .route("/users/me/username", put(update_username))
        .route("/users/me/photo", put(set_user_photo))
        .route(
            "/conversations",
            post(create_conversation).get(get_conversations),
        )
        .route("/conversations/{conversation_id}", get(get_conversation))
        .route("/messages", post(send_message))
        .route("/messages/photo", post(send_photo_message))
        .route("/messages/forward", post(forward_message))
        .route("/messages/{message_id}", delete(delete_message))
        .route(
            "/messages/{message_id}/comment",
            post(add_reaction).delete(remove_reaction),
        )
        .route("/messages/{message_id}/status", put(update_status))
        .route("/groups/{group_id}/members", post(add_member))
        .route("/groups/{group_id}/leave", post(leave_group))
        .route("/groups/{group_id}/name", put(set_group_name))
        .route("/groups/{group_id}/photo", put(set_group_photo))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "忽略无法解析的 CORS 来源");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 上传表单：一个 `photo` 文件字段，其余字段按文本读取
struct PhotoForm {
    photo: Vec<u8>,
    fields: HashMap<String, String>,
}

impl PhotoForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut photo = None;
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "photo" {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(err.to_string()))?;
                photo = Some(bytes.to_vec());
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(err.to_string()))?;
                fields.insert(name, text);
            }
        }

        let photo =
            photo.ok_or_else(|| ApiError::bad_request("multipart field `photo` is required"))?;
        Ok(Self { photo, fields })
    }

    fn uuid(&self, name: &str) -> Result<Option<Uuid>, ApiError> {
        self.fields
            .get(name)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|_| ApiError::bad_request(format!("field `{name}` is not a valid id")))
            })
            .transpose()
    }

    async fn store(
        self,
        state: &AppState,
        subject: PhotoSubject,
    ) -> Result<PhotoLocator, ApiError> {
        Ok(state.photo_store.store(subject, self.photo).await?)
    }
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let response = state
        .service
        .login(payload.name, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let users = state
        .service
        .list_users(caller, &state.request_token())
        .await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .service
        .get_user(caller, user_id.into(), &state.request_token())
        .await?;
    Ok(Json(user))
}

async fn update_username(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .service
        .update_username(caller, payload.name, &state.request_token())
        .await?;
    Ok(Json(user))
}

async fn set_user_photo(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    multipart: Multipart,
) -> Result<Json<PhotoResponse>, ApiError> {
    let photo = PhotoForm::read(multipart)
        .await?
        .store(&state, PhotoSubject::User(caller))
        .await?;
    state
        .service
        .set_user_photo(caller, photo.clone(), &state.request_token())
        .await?;
    Ok(Json(PhotoResponse { photo }))
}

async fn create_conversation(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(payload): Json<CreateConversationPayload>,
) -> Result<(StatusCode, Json<ConversationDto>), ApiError> {
    let kind: ConversationKind = payload.kind.parse().map_err(ApplicationError::from)?;
    let request = CreateConversationRequest {
        kind,
        participants: payload.participants.into_iter().map(Into::into).collect(),
        name: payload.name,
    };
    let conversation = state
        .service
        .create_conversation(caller, request, &state.request_token())
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn get_conversations(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let conversations = state
        .service
        .get_conversations(caller, &state.request_token())
        .await?;
    Ok(Json(conversations))
}

async fn get_conversation(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ConversationDto>, ApiError> {
    let conversation = state
        .service
        .get_conversation(caller, conversation_id.into(), &state.request_token())
        .await?;
    Ok(Json(conversation))
}

async fn send_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let message = state
        .service
        .send_message(
            caller,
            payload.conversation_id.into(),
            &payload.kind,
            payload.content,
            payload.reply_to.map(Into::into),
            &state.request_token(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// 图片消息：multipart 表单携带 `conversationId`、可选的 `replyTo` 和 `photo` 文件
async fn send_photo_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let form = PhotoForm::read(multipart).await?;
    let conversation_id = form
        .uuid("conversationId")?
        .ok_or_else(|| ApiError::bad_request("multipart field `conversationId` is required"))?
        .into();
    let reply_to = form.uuid("replyTo")?.map(Into::into);

    state
        .service
        .authorize_message_send(caller, conversation_id, &state.request_token())
        .await?;
    let photo = form
        .store(&state, PhotoSubject::Conversation(conversation_id))
        .await?;
    let message = state
        .service
        .send_photo_message(
            caller,
            conversation_id,
            photo,
            reply_to,
            &state.request_token(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn forward_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(payload): Json<ForwardPayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let message = state
        .service
        .forward_message(
            caller,
            payload.message_id.into(),
            payload.target_conversation_id.into(),
            &state.request_token(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn delete_message(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_message(caller, message_id.into(), &state.request_token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_reaction(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<ReactionPayload>,
) -> Result<Json<ReactionDto>, ApiError> {
    let reaction = state
        .service
        .add_reaction(
            caller,
            message_id.into(),
            payload.emoji,
            &state.request_token(),
        )
        .await?;
    Ok(Json(reaction))
}

async fn remove_reaction(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .remove_reaction(caller, message_id.into(), &state.request_token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_status(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<StatusPayload>,
) -> Result<Json<MessageDto>, ApiError> {
    let message = state
        .service
        .update_message_status(
            caller,
            message_id.into(),
            &payload.status,
            &state.request_token(),
        )
        .await?;
    Ok(Json(message))
}

async fn add_member(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<AddMemberPayload>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .add_to_group(
            caller,
            group_id.into(),
            payload.user_id.into(),
            &state.request_token(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_group(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .leave_group(caller, group_id.into(), &state.request_token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_group_name(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<NamePayload>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .set_group_name(caller, group_id.into(), payload.name, &state.request_token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_group_photo(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<PhotoResponse>, ApiError> {
    let group = group_id.into();
    let form = PhotoForm::read(multipart).await?;
    state
        .service
        .authorize_group_edit(caller, group, &state.request_token())
        .await?;
    let photo = form.store(&state, PhotoSubject::Conversation(group)).await?;
    state
        .service
        .set_group_photo(caller, group, photo.clone(), &state.request_token())
        .await?;
    Ok(Json(PhotoResponse { photo }))
}
