use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use parley_core::messages::DEFAULT_MESSAGE_LIMIT;
use parley_core::{MessageLedger, Window};
use parley_types::api::{
    Claims, MarkReadResponse, MessageResponse, Page, PageQuery, SendMessageRequest,
    UnreadCountResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::with_db;

pub async fn list_messages(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Page<MessageResponse>>, ApiError> {
    let window = Window::from_query(&query, DEFAULT_MESSAGE_LIMIT);
    let page = with_db(&state, move |db| {
        MessageLedger::new(db).list(claims.sub, thread_id, window)
    })
    .await?;
    Ok(Json(page.map(MessageResponse::from)))
}

pub async fn send_message(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = with_db(&state, move |db| {
        MessageLedger::new(db).create(claims.sub, thread_id, &req.text)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let message = with_db(&state, move |db| {
        MessageLedger::new(db).mark_read(claims.sub, message_id)
    })
    .await?;

    Ok(Json(MarkReadResponse {
        status: "Message marked as read".to_string(),
        message: MessageResponse::from(message),
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread_count = with_db(&state, move |db| MessageLedger::new(db).unread_count(claims.sub)).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
