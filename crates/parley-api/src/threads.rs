use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use parley_core::threads::DEFAULT_THREAD_LIMIT;
use parley_core::{ThreadRegistry, Window};
use parley_types::api::{Claims, CreateThreadRequest, Page, PageQuery, ThreadResponse};

use crate::auth::AppState;
use crate::error::{ApiError, ParticipantsRejection};
use crate::with_db;

pub async fn list_threads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<Json<Page<ThreadResponse>>, ApiError> {
    let window = Window::from_query(&query, DEFAULT_THREAD_LIMIT);
    let page = with_db(&state, move |db| ThreadRegistry::new(db).list(claims.sub, window)).await?;
    Ok(Json(page.map(ThreadResponse::from)))
}

/// 201 with the new thread, or 200 with the existing one for this pair.
pub async fn create_thread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateThreadRequest>, ParticipantsRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (thread, created) = with_db(&state, move |db| {
        ThreadRegistry::new(db).create(claims.sub, &req.participants)
    })
    .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(ThreadResponse::from(thread))))
}

pub async fn get_thread(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let thread = with_db(&state, move |db| ThreadRegistry::new(db).get(claims.sub, thread_id)).await?;
    Ok(Json(ThreadResponse::from(thread)))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    with_db(&state, move |db| ThreadRegistry::new(db).delete(claims.sub, thread_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
