//! Notification endpoints and the inbox event stream.

use super::uuid_from_path;
use crate::auth::{AuthUser, RequireAdmin};
use crate::notifications::{InboxEntry, InboxEvent, Notification};
use crate::server::state::AppState;
use crate::types::InboxEntryId;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use storefront_web::handlers::websocket::stream_broadcast;
use storefront_web::WebResult;

/// `POST /notifications` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendNotificationRequest {
    /// Text to broadcast
    pub message: String,
}

/// One notification.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    /// Always true
    pub success: bool,
    /// The notification
    pub notification: Notification,
}

/// All notifications.
#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    /// Always true
    pub success: bool,
    /// Newest first
    pub notifications: Vec<Notification>,
}

/// The caller's inbox.
#[derive(Debug, Serialize)]
pub struct InboxResponse {
    /// Always true
    pub success: bool,
    /// Newest first
    pub notifications: Vec<InboxEntry>,
}

/// One inbox entry.
#[derive(Debug, Serialize)]
pub struct InboxEntryResponse {
    /// Always true
    pub success: bool,
    /// The entry
    pub notification: InboxEntry,
}

/// Result of marking everything read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    /// Always true
    pub success: bool,
    /// Entries that changed
    pub modified_count: usize,
}

/// Broadcast a message to every known user.
pub async fn send_notification(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<SendNotificationRequest>,
) -> WebResult<(StatusCode, Json<NotificationResponse>)> {
    let notification = state.notifications.send(&request.message).await?;
    tracing::info!(admin = %admin.user_id, notification_id = %notification.id, "Admin notification sent");
    Ok((
        StatusCode::CREATED,
        Json(NotificationResponse {
            success: true,
            notification,
        }),
    ))
}

/// Every notification sent.
pub async fn list_notifications(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> WebResult<Json<NotificationListResponse>> {
    let notifications = state.notifications.list().await?;
    Ok(Json(NotificationListResponse {
        success: true,
        notifications,
    }))
}

/// The caller's inbox.
pub async fn my_notifications(State(state): State<AppState>, AuthUser(identity): AuthUser) -> WebResult<Json<InboxResponse>> {
    let notifications = state.notifications.inbox(&identity.user_id).await?;
    Ok(Json(InboxResponse {
        success: true,
        notifications,
    }))
}

/// Mark one of the caller's entries read.
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(entry_id): Path<String>,
) -> WebResult<Json<InboxEntryResponse>> {
    let entry_id = InboxEntryId::from_uuid(uuid_from_path(&entry_id, "notification")?);
    let notification = state.notifications.mark_read(&identity.user_id, entry_id).await?;
    Ok(Json(InboxEntryResponse {
        success: true,
        notification,
    }))
}

/// Mark all of the caller's entries read.
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> WebResult<Json<MarkAllReadResponse>> {
    let modified_count = state.notifications.mark_all_read(&identity.user_id).await?;
    Ok(Json(MarkAllReadResponse {
        success: true,
        modified_count,
    }))
}

/// Push the caller's inbox events over a WebSocket.
///
/// The subscription is taken before the upgrade completes, so nothing sent
/// after this call returns is missed.
pub async fn stream(State(state): State<AppState>, AuthUser(identity): AuthUser, ws: WebSocketUpgrade) -> Response {
    let rx = state.notifications.hub().subscribe();
    let user_id = identity.user_id;
    tracing::debug!(user_id = %user_id, "Inbox stream requested");
    ws.on_upgrade(move |socket| stream_broadcast(socket, rx, move |event: InboxEvent| event.for_user(&user_id)))
}
