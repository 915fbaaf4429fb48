//! HTTP API: each route turns into one pipeline action.

use crate::config::CorsConfig;
use crate::pipeline::{Action, ActionResponse, Pipeline};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use protocol::DebugStatus;
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Greeting served on `/`.
pub const WELCOME: &str = "Welcome to the abusim coordinator!\n";

/// Build the API router on top of `pipeline`.
pub fn router(pipeline: Pipeline, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/config/{agent}", get(get_config))
        .route("/memory/{agent}", get(get_memory).post(post_memory))
        .route("/debug/{agent}", get(get_debug).post(post_debug))
        .route("/debug/{agent}/step", post(step_debug))
        .layer(cors_layer(cors))
        .with_state(pipeline)
}

/// CORS policy for the configured origins. `"*"` allows any origin.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Body of `POST /memory/{agent}`.
#[derive(Debug, Deserialize)]
struct InputBody {
    actions: String,
}

/// Answer a malformed body without involving the pipeline.
fn bad_body(rejection: JsonRejection) -> ActionResponse {
    tracing::debug!("rejected request body: {rejection}");
    ActionResponse::error(StatusCode::BAD_REQUEST, rejection.body_text())
}

async fn index() -> &'static str {
    WELCOME
}

async fn get_config(State(pipeline): State<Pipeline>, Path(agent): Path<String>) -> ActionResponse {
    pipeline
        .submit(Action::GetConfig {
            agent: agent.into(),
        })
        .await
}

async fn get_memory(State(pipeline): State<Pipeline>, Path(agent): Path<String>) -> ActionResponse {
    pipeline
        .submit(Action::GetMemory {
            agent: agent.into(),
        })
        .await
}

async fn post_memory(
    State(pipeline): State<Pipeline>,
    Path(agent): Path<String>,
    body: Result<Json<InputBody>, JsonRejection>,
) -> ActionResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    pipeline
        .submit(Action::SubmitInput {
            agent: agent.into(),
            input: body.actions,
        })
        .await
}

async fn get_debug(State(pipeline): State<Pipeline>, Path(agent): Path<String>) -> ActionResponse {
    pipeline
        .submit(Action::GetDebug {
            agent: agent.into(),
        })
        .await
}

async fn post_debug(
    State(pipeline): State<Pipeline>,
    Path(agent): Path<String>,
    body: Result<Json<DebugStatus>, JsonRejection>,
) -> ActionResponse {
    let Json(status) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    pipeline
        .submit(Action::SetDebug {
            agent: agent.into(),
            status,
        })
        .await
}

async fn step_debug(State(pipeline): State<Pipeline>, Path(agent): Path<String>) -> ActionResponse {
    pipeline
        .submit(Action::StepDebug {
            agent: agent.into(),
        })
        .await
}
