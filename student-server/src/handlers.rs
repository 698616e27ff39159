use std::{sync::Arc, time::Duration};

use axum::{debug_handler, extract::{Path, State}, http::{HeaderValue, StatusCode}, response::IntoResponse, routing::get, Json, Router};
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::{
    models::{AppError, Student, UserResponse},
    repository::UserRepository,
    store::StudentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub students: Arc<dyn StudentStore>,
    pub users: Arc<dyn UserRepository>,
    pub lookup_timeout: Duration,
    /// Present only when the user repository is Postgres-backed.
    pub db: Option<PgPool>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/home", get(list_students))
        .route("/users/:username", get(get_user))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The served router: `app` plus compression and CORS. Tracing stays inside `app`.
pub fn router(state: AppState) -> Router {
    app(state)
        .layer(CompressionLayer::new())
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods(Any)
        .allow_headers(Any)
}

#[debug_handler]
pub async fn list_students(State(state): State<AppState>) -> Json<Vec<Student>> {
    Json(state.students.list_all().await)
}

#[debug_handler]
pub async fn get_user(State(state): State<AppState>, Path(username): Path<String>) -> Result<impl IntoResponse, AppError> {
    let found = tokio::time::timeout(state.lookup_timeout, state.users.find_by_username(&username))
        .await
        .map_err(|_| AppError::Unavailable(format!("user lookup exceeded {:?}", state.lookup_timeout)))
        .and_then(|res| res)
        .inspect_err(|e| {
            if matches!(e, AppError::Unavailable(_) | AppError::Repo(_)) {
                tracing::warn!(error = %e, "user lookup failed");
            }
        })?;
    match found {
        Some(user) => Ok(Json(UserResponse::from(user))),
        None => Err(AppError::NotFound(format!("user {username:?} not found"))),
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let Some(ref pool) = state.db else {
        return (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "backend": "memory" })));
    };
    if sqlx::query("SELECT 1").execute(pool).await.is_ok() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "backend": "postgres" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "status": "degraded", "backend": "postgres" })))
    }
}
