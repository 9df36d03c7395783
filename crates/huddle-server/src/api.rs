use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use huddle_shared::{AssetId, ChatId, MessageKind, RoomId, RoomKind, RoomMedia, UserId};
use huddle_store::{CallRoom, ChatSummary, Database, Message, MessageEntry, NewUser, User};

use crate::auth::{bearer_token, Caller};
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::video::{room_name, sanitize_room_name, VideoProvider};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub assets: Arc<BlobStore>,
    pub video: Arc<VideoProvider>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signin", post(sign_in))
        .route("/auth/anonymous", post(sign_in_anonymous))
        .route("/auth/signout", post(sign_out))
        .route("/users", get(list_users))
        .route("/users/me", get(current_user))
        .route("/users/seed", post(seed_test_users))
        .route("/chats", get(list_user_chats))
        .route("/chats/direct", post(create_direct_chat))
        .route("/chats/group", post(create_group_chat))
        .route(
            "/chats/:id/messages",
            get(get_chat_messages).post(send_message),
        )
        .route("/chats/:id/rooms", get(list_active_rooms).post(create_room))
        .route("/rooms/:id/join", post(join_room))
        .route("/rooms/:id/leave", post(leave_room))
        .route("/assets/upload-url", post(generate_upload_url))
        .route("/assets/upload/:ticket", post(upload_asset))
        .route("/assets/:id", get(download_asset))
        .layer(DefaultBodyLimit::max(state.assets.max_size()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct SignInRequest {
    email: String,
    name: Option<String>,
}

#[derive(Serialize)]
struct SignInResponse {
    token: String,
    user: User,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignOutResponse {
    signed_out: bool,
}

#[derive(Serialize)]
struct SeedResponse {
    created: Vec<User>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectChatRequest {
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupChatRequest {
    name: String,
    #[serde(default)]
    member_ids: Vec<UserId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatCreatedResponse {
    chat_id: ChatId,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
    #[serde(flatten)]
    kind: MessageKind,
}

/// A message as shown to a participant.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    #[serde(flatten)]
    message: Message,
    sender: Option<User>,
    /// Download URL of an image message's asset, if it is still stored.
    image_url: Option<String>,
}

#[derive(Deserialize)]
struct RoomsQuery {
    kind: RoomKind,
}

#[derive(Deserialize)]
struct CreateRoomRequest {
    kind: RoomKind,
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    asset_id: AssetId,
}

// ─── Health ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Identity ───

/// Email sign-in.  Without `DEV_EMAIL_SIGNIN` this only registers new
/// emails; an email that already has an account gets a 409.
async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ServerError> {
    let mut db = state.db.lock().await;
    let user = if state.config.dev_email_signin {
        db.find_or_create_user(&req.email, req.name.as_deref())?
    } else {
        db.register_user(&req.email, req.name.as_deref())?
    };
    let session = db.create_session(&user.id)?;

    info!(user = %user.id, "signed in");
    Ok(Json(SignInResponse {
        token: session.token,
        user,
    }))
}

async fn sign_in_anonymous(
    State(state): State<AppState>,
) -> Result<Json<SignInResponse>, ServerError> {
    let db = state.db.lock().await;
    let user = db.create_user(&NewUser {
        is_anonymous: true,
        ..Default::default()
    })?;
    let session = db.create_session(&user.id)?;

    info!(user = %user.id, "anonymous sign-in");
    Ok(Json(SignInResponse {
        token: session.token,
        user,
    }))
}

async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SignOutResponse>, ServerError> {
    let token = bearer_token(&headers).ok_or(ServerError::Unauthenticated)?;
    let signed_out = state.db.lock().await.delete_session(token)?;
    Ok(Json(SignOutResponse { signed_out }))
}

// ─── Users ───

async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<User>>, ServerError> {
    let Some(caller) = caller.0 else {
        return Ok(Json(Vec::new()));
    };
    let users = state.db.lock().await.list_users_except(&caller)?;
    Ok(Json(users))
}

async fn current_user(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Option<User>>, ServerError> {
    let Some(caller) = caller.0 else {
        return Ok(Json(None));
    };
    let user = state.db.lock().await.find_user(&caller)?;
    Ok(Json(user))
}

async fn seed_test_users(State(state): State<AppState>) -> Result<Json<SeedResponse>, ServerError> {
    if !state.config.seed_test_users {
        return Err(ServerError::Forbidden(
            "Seeding is disabled (set SEED_TEST_USERS=true)".into(),
        ));
    }
    let created = state.db.lock().await.seed_test_users()?;
    Ok(Json(SeedResponse { created }))
}

// ─── Chat directory ───

async fn list_user_chats(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ChatSummary>>, ServerError> {
    let Some(caller) = caller.0 else {
        return Ok(Json(Vec::new()));
    };
    let chats = state.db.lock().await.list_user_chats(&caller)?;
    Ok(Json(chats))
}

async fn create_direct_chat(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<DirectChatRequest>,
) -> Result<Json<ChatCreatedResponse>, ServerError> {
    let caller = caller.require()?;
    let chat_id = state
        .db
        .lock()
        .await
        .create_direct_chat(&caller, &req.user_id)?;
    Ok(Json(ChatCreatedResponse { chat_id }))
}

async fn create_group_chat(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<GroupChatRequest>,
) -> Result<Json<ChatCreatedResponse>, ServerError> {
    let caller = caller.require()?;
    let chat_id = state
        .db
        .lock()
        .await
        .create_group_chat(&caller, &req.name, &req.member_ids)?;
    Ok(Json(ChatCreatedResponse { chat_id }))
}

async fn get_chat_messages(
    State(state): State<AppState>,
    caller: Caller,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<Vec<MessageView>>, ServerError> {
    let Some(caller) = caller.0 else {
        return Ok(Json(Vec::new()));
    };
    let entries = state.db.lock().await.get_chat_messages(&caller, &chat_id)?;

    let mut views = Vec::with_capacity(entries.len());
    for MessageEntry { message, sender } in entries {
        let image_url = match message.kind {
            MessageKind::Text => None,
            MessageKind::Image { asset_id } => state.assets.download_url(&asset_id).await,
        };
        views.push(MessageView {
            message,
            sender,
            image_url,
        });
    }
    Ok(Json(views))
}

// ─── Message log ───

async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    let caller = caller.require()?;
    let message = state
        .db
        .lock()
        .await
        .send_message(&caller, &chat_id, &req.content, req.kind)?;
    Ok(Json(message))
}

async fn generate_upload_url(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UploadUrlResponse>, ServerError> {
    caller.require()?;
    let upload_url = state.assets.generate_upload_url().await;
    Ok(Json(UploadUrlResponse { upload_url }))
}

async fn upload_asset(
    State(state): State<AppState>,
    Path(ticket): Path<String>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ServerError> {
    // A bad body leaves the ticket usable for a retry.
    state.assets.check_upload(body.len())?;
    state.assets.redeem_ticket(&ticket).await?;
    let asset_id = state.assets.store_blob(&body).await?;

    info!(asset = %asset_id, size = body.len(), "Asset uploaded via API");
    Ok(Json(UploadResponse { asset_id }))
}

async fn download_asset(
    State(state): State<AppState>,
    Path(id): Path<AssetId>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.assets.get_blob(&id).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

// ─── Call-room registry ───

async fn list_active_rooms(
    State(state): State<AppState>,
    caller: Caller,
    Path(chat_id): Path<ChatId>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<CallRoom>>, ServerError> {
    let Some(caller) = caller.0 else {
        return Ok(Json(Vec::new()));
    };
    let rooms = state
        .db
        .lock()
        .await
        .list_active_rooms(&caller, &chat_id, query.kind)?;
    Ok(Json(rooms))
}

/// Start a call.  Video rooms are reserved with the provider first; the
/// database lock is not held while waiting on it.
async fn create_room(
    State(state): State<AppState>,
    caller: Caller,
    Path(chat_id): Path<ChatId>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<CallRoom>, ServerError> {
    let caller = caller.require()?;
    let chat = state.db.lock().await.get_chat(&caller, &chat_id)?;

    let base = req
        .name
        .as_deref()
        .filter(|n| !sanitize_room_name(n).is_empty())
        .unwrap_or(chat.name.as_str());
    let name = room_name(base, req.kind, Utc::now());

    let media = match req.kind {
        RoomKind::Voice => RoomMedia::Voice,
        RoomKind::Video => {
            let reserved = state.video.reserve_room(&name).await;
            if reserved.is_fallback() {
                info!(room = %name, "video room created with fallback URL");
            }
            RoomMedia::Video {
                room_url: reserved.into_url(),
            }
        }
    };

    let room = state
        .db
        .lock()
        .await
        .create_room(&caller, &chat_id, &name, media)?;
    Ok(Json(room))
}

async fn join_room(
    State(state): State<AppState>,
    caller: Caller,
    Path(room_id): Path<RoomId>,
) -> Result<Json<CallRoom>, ServerError> {
    let caller = caller.require()?;
    let room = state.db.lock().await.join_room(&caller, &room_id)?;
    Ok(Json(room))
}

async fn leave_room(
    State(state): State<AppState>,
    caller: Caller,
    Path(room_id): Path<RoomId>,
) -> Result<Json<CallRoom>, ServerError> {
    let caller = caller.require()?;
    let room = state.db.lock().await.leave_room(&caller, &room_id)?;
    Ok(Json(room))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
