use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::commands::search_and_cache;
use nutrilog_core::models::{FoodItem, MealLogEntry, NewMealLog};
use nutrilog_core::service::{NutriService, NutritionProvider};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MiB

#[derive(Clone)]
struct AppState {
    service: Arc<NutriService>,
    provider: Arc<dyn NutritionProvider>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
}

#[derive(Deserialize)]
struct LogsQuery {
    user_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    Unprocessable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Missing or malformed query parameters are a validation failure (422), like a bad body.
impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}

/// CORS for the browser frontend. `*` allows any origin without credentials.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());
    if origin == "*" {
        return Ok(layer.allow_origin(AllowOrigin::any()));
    }
    let origin =
        HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))?;
    Ok(layer.allow_origin(origin).allow_credentials(true))
}

// --- Handlers ---

async fn search_food(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<FoodItem>>, ApiError> {
    let Query(params) = params?;
    let foods = search_and_cache(&state.service, &state.provider, params.query).await?;
    Ok(Json(foods))
}

async fn log_meal(
    State(state): State<AppState>,
    Json(req): Json<NewMealLog>,
) -> Result<Json<MealLogEntry>, ApiError> {
    let entry = state.service.log_meal(&req)?;
    Ok(Json(entry))
}

async fn list_logs(
    State(state): State<AppState>,
    params: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Vec<MealLogEntry>>, ApiError> {
    let Query(params) = params?;
    let logs = state
        .service
        .meal_logs_for_user(&params.user_id)
        .context("failed to list meal logs")?;
    Ok(Json(logs))
}

async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MealLogEntry>, ApiError> {
    let entry = state
        .service
        .get_meal_log(&id)
        .context("failed to fetch meal log")?
        .ok_or_else(|| ApiError::NotFound(format!("Meal log {id} not found")))?;
    Ok(Json(entry))
}

// --- Router builder ---

fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/food/search", get(search_food))
        .route("/logs", get(list_logs).post(log_meal))
        .route("/logs/", get(list_logs).post(log_meal))
        .route("/logs/{id}", get(get_log))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: Arc<NutriService>,
    provider: Arc<dyn NutritionProvider>,
    bind: &str,
    port: u16,
    cors_origin: &str,
) -> anyhow::Result<()> {
    let state = AppState { service, provider };
    let app = build_router(state, cors_layer(cors_origin)?);

    if cors_origin == "*" {
        warn!("CORS allows any origin");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
