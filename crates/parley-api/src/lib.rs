pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod threads;

use axum::{
    Json, Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::error;

use parley_core::CoreResult;
use parley_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// All routes. Everything except registration, login and the health check
/// requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/threads", get(threads::list_threads).post(threads::create_thread))
        .route("/threads/{thread_id}", get(threads::get_thread).delete(threads::delete_thread))
        .route(
            "/threads/{thread_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/messages/unread_count", get(messages::unread_count))
        .route("/messages/{message_id}/read", post(messages::mark_read))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run a blocking core operation off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::{AppStateInner, create_token};

    const SECRET: &str = "test-secret";

    struct TestApp {
        router: Router,
        state: AppState,
    }

    impl TestApp {
        fn new() -> Self {
            let state: AppState = Arc::new(AppStateInner {
                db: Database::open_in_memory().unwrap(),
                jwt_secret: SECRET.to_string(),
                token_ttl: chrono::Duration::days(1),
            });
            Self {
                router: router(state.clone()),
                state,
            }
        }

        /// Seed a user directly and hand back (id, token).
        fn user(&self, username: &str) -> (Uuid, String) {
            let id = Uuid::new_v4();
            self.state
                .db
                .create_user(
                    &id.to_string(),
                    username,
                    &format!("{}@example.com", username),
                    "unused",
                    "2026-01-01T00:00:00.000000Z",
                )
                .unwrap();
            let token = create_token(SECRET, id, username, chrono::Duration::days(1)).unwrap();
            (id, token)
        }

        async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let req = match body {
                Some(b) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&b).unwrap()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let resp = self.router.clone().oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let app = TestApp::new();

        let (status, _) = app.send(Method::GET, "/threads", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.send(Method::GET, "/threads", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_and_login() {
        let app = TestApp::new();

        let (status, body) = app
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "username": "alice", "email": "alice@example.com", "password": "hunter2hunter2" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "alice");

        let (status, _) = app
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "username": "alice", "email": "again@example.com", "password": "hunter2hunter2" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(Method::POST, "/auth/login", None, Some(json!({ "username": "alice", "password": "nope-nope" })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send(Method::POST, "/auth/login", None, Some(json!({ "username": "alice", "password": "hunter2hunter2" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = app.send(Method::GET, "/threads", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["limit"], 5);
    }

    #[tokio::test]
    async fn conversation_end_to_end() {
        let app = TestApp::new();
        let (alice, alice_token) = app.user("alice");
        let (bob, bob_token) = app.user("bob");
        let (_, carol_token) = app.user("carol");

        let (status, thread) = app
            .send(Method::POST, "/threads", Some(alice_token.as_str()), Some(json!({ "participants": [alice, bob] })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let thread_id = thread["id"].as_str().unwrap().to_string();

        let (status, again) = app
            .send(Method::POST, "/threads", Some(bob_token.as_str()), Some(json!({ "participants": [bob, alice] })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["id"], thread["id"]);

        let messages_uri = format!("/threads/{}/messages", thread_id);
        let (status, m1) = app
            .send(Method::POST, &messages_uri, Some(alice_token.as_str()), Some(json!({ "text": "hi" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(m1["is_read"], true);
        assert_eq!(m1["sender_username"], "alice");

        let read_uri = format!("/messages/{}/read", m1["id"].as_str().unwrap());
        let (status, body) = app.send(Method::POST, &read_uri, Some(alice_token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "You cannot mark your own message as read");

        let (status, body) = app.send(Method::POST, &read_uri, Some(bob_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["is_read"], true);

        let (status, _) = app.send(Method::POST, &read_uri, Some(carol_token.as_str()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.send(Method::GET, "/messages/unread_count", Some(bob_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unread_count"], 0);

        let (status, _) = app
            .send(Method::POST, &messages_uri, Some(bob_token.as_str()), Some(json!({ "text": "hello" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app.send(Method::GET, "/messages/unread_count", Some(alice_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unread_count"], 0);

        let (status, page) = app
            .send(Method::GET, &format!("{}?limit=1&offset=1", messages_uri), Some(alice_token.as_str()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 2);
        assert_eq!(page["results"][0]["text"], "hello");

        let (status, _) = app.send(Method::GET, &messages_uri, Some(carol_token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::GET, "/messages/unread_count", Some(carol_token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "NO_ACCESS");

        let thread_uri = format!("/threads/{}", thread_id);
        let (status, _) = app.send(Method::DELETE, &thread_uri, Some(carol_token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(Method::DELETE, &format!("/threads/{}", Uuid::new_v4()), Some(alice_token.as_str()), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.send(Method::DELETE, &thread_uri, Some(bob_token.as_str()), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.send(Method::GET, "/threads", Some(alice_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn invalid_thread_requests_are_bad_requests() {
        let app = TestApp::new();
        let (alice, alice_token) = app.user("alice");
        let (bob, _) = app.user("bob");

        let (status, body) = app
            .send(Method::POST, "/threads", Some(alice_token.as_str()), Some(json!({ "participants": [alice] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PARTICIPANTS");

        let (status, _) = app
            .send(
                Method::POST,
                "/threads",
                Some(alice_token.as_str()),
                Some(json!({ "participants": [alice, Uuid::new_v4()] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, thread) = app
            .send(Method::POST, "/threads", Some(alice_token.as_str()), Some(json!({ "participants": [alice, bob] })))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/threads/{}/messages", thread["id"].as_str().unwrap()),
                Some(alice_token.as_str()),
                Some(json!({ "text": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn malformed_requests_get_json_errors() {
        let app = TestApp::new();
        let (alice, alice_token) = app.user("alice");
        let (bob, _) = app.user("bob");
        let token = Some(alice_token.as_str());

        let (status, body) = app
            .send(Method::POST, "/threads", token, Some(json!({ "participants": ["nope", "also-nope"] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PARTICIPANTS");

        let (status, body) = app.send(Method::POST, "/threads", token, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_PARTICIPANTS");

        let (status, body) = app.send(Method::DELETE, "/threads/123", token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, body) = app.send(Method::GET, "/threads/123/messages", token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, body) = app.send(Method::POST, "/messages/not-a-uuid/read", token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, body) = app.send(Method::GET, "/threads?limit=lots", token, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (_, thread) = app
            .send(Method::POST, "/threads", token, Some(json!({ "participants": [alice, bob] })))
            .await;
        let (status, body) = app
            .send(
                Method::POST,
                &format!("/threads/{}/messages", thread["id"].as_str().unwrap()),
                token,
                Some(json!({ "body": "wrong field" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, body) = app
            .send(Method::POST, "/auth/login", None, Some(json!({ "username": "alice" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }
}
