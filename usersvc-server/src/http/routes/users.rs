//! User endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, UserId};
use crate::http::server::AppState;
use crate::models::{NewUser, User};

/// Create or replace request. Fields are optional here so a missing one
/// surfaces as a validation error rather than a parse error.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserRequest {
    fn validate(&self) -> Result<NewUser, ApiError> {
        Ok(NewUser::new(self.name.as_deref(), self.email.as_deref())?)
    }
}

/// GET /users
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.store()?.find_all().await?;
    Ok(Json(users))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    UserId(id): UserId,
) -> Result<Json<User>, ApiError> {
    let user = state.store()?.find_by_id(id).await?;
    Ok(Json(user))
}

/// POST /users
async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<UserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let new_user = req.validate()?;
    let user = state.store()?.create(new_user).await?;

    tracing::info!(id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/{id} - full replace of name and email
async fn update_user(
    State(state): State<Arc<AppState>>,
    UserId(id): UserId,
    JsonBody(req): JsonBody<UserRequest>,
) -> Result<Json<User>, ApiError> {
    let new_user = req.validate()?;
    let user = state.store()?.update(id, new_user).await?;
    Ok(Json(user))
}

/// DELETE /users/{id}
async fn delete_user(
    State(state): State<Arc<AppState>>,
    UserId(id): UserId,
) -> Result<StatusCode, ApiError> {
    state.store()?.delete(id).await?;

    tracing::info!(id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::http::server::{build_router, AppState};
    use crate::startup::{ConnectionState, Readiness};
    use crate::test_support::MemoryUserStore;

    fn ready_app() -> (Router, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let readiness = Readiness::new();
        readiness.transition(ConnectionState::Syncing).unwrap();
        readiness.transition(ConnectionState::Ready).unwrap();
        let app = build_router(AppState::new(store.clone(), readiness), false);
        (app, store)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(app: &Router, name: &str, email: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/users",
            Some(json!({ "name": name, "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    #[tokio::test]
    async fn create_then_fetch_round_trip() {
        let (app, _) = ready_app();
        let created = create(&app, "Ann", "ann@x.com").await;
        let id = created["id"].as_u64().unwrap();

        let (status, fetched) = send(&app, Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Ann");
        assert_eq!(fetched["email"], "ann@x.com");
        assert!(fetched["createdAt"].is_string());
    }

    #[tokio::test]
    async fn list_returns_all_users() {
        let (app, _) = ready_app();
        create(&app, "Ann", "ann@x.com").await;
        create(&app, "Bob", "bob@x.com").await;

        let (status, body) = send(&app, Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::OK);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1]["name"], "Bob");
    }

    #[tokio::test]
    async fn duplicate_email_is_400_and_keeps_data() {
        let (app, store) = ready_app();
        create(&app, "Ann", "ann@x.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(json!({ "name": "Imposter", "email": "ann@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "conflict");
        assert_eq!(store.len(), 1);

        let (_, fetched) = send(&app, Method::GET, "/users/1", None).await;
        assert_eq!(fetched["name"], "Ann");
    }

    #[tokio::test]
    async fn missing_field_is_400() {
        let (app, store) = ready_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(json!({ "name": "Ann" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email is required");
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_400_with_json_body() {
        let (app, _) = ready_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn unknown_id_is_404() {
        let (app, _) = ready_app();
        let (status, body) = send(&app, Method::GET, "/users/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, _) = send(&app, Method::GET, "/users/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let (app, _) = ready_app();
        let created = create(&app, "Ann", "ann@x.com").await;
        let id = created["id"].as_u64().unwrap();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/users/{id}"),
            Some(json!({ "name": "Anne", "email": "anne@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert_eq!(body["name"], "Anne");
        assert_eq!(body["email"], "anne@x.com");
    }

    #[tokio::test]
    async fn update_missing_id_is_404_and_creates_nothing() {
        let (app, store) = ready_app();
        let (status, _) = send(
            &app,
            Method::PUT,
            "/users/5",
            Some(json!({ "name": "Ghost", "email": "ghost@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn update_to_taken_email_is_400() {
        let (app, _) = ready_app();
        create(&app, "Ann", "ann@x.com").await;
        let bob = create(&app, "Bob", "bob@x.com").await;
        let id = bob["id"].as_u64().unwrap();

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/users/{id}"),
            Some(json!({ "name": "Bob", "email": "ann@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let (app, store) = ready_app();
        let created = create(&app, "Ann", "ann@x.com").await;
        let uri = format!("/users/{}", created["id"]);

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(store.len(), 0);

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn data_routes_answer_500_until_ready() {
        let store = Arc::new(MemoryUserStore::new());
        let readiness = Readiness::new();
        let app = build_router(AppState::new(store, readiness.clone()), false);

        readiness.transition(ConnectionState::Syncing).unwrap();
        let (status, body) = send(&app, Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "database_unavailable");

        let (status, _) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);

        readiness.transition(ConnectionState::Ready).unwrap();
        let (status, _) = send(&app, Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn data_routes_answer_500_after_failure() {
        let store = Arc::new(MemoryUserStore::new());
        let readiness = Readiness::new();
        readiness.transition(ConnectionState::Failed).unwrap();
        let app = build_router(AppState::new(store, readiness), false);

        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(json!({ "name": "Ann", "email": "ann@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "database is not ready (failed)");
    }
}
