use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use mos_core::query::QueryEngine;
use mos_core::CharError;

use crate::schema::{
    ErrorBody, ErrorResponse, MatchingRequest, MatchingResponse, NamesResponse, OverlayResponse,
    ParameterResponse, ParameterValues, QueryRequest, QueryResponse,
};

pub struct HttpServerConfig {
    pub bind_addr: String,
}

/// Shared, read-only query engine over the loaded store.
#[derive(Clone)]
pub struct ApiState {
    engine: Arc<QueryEngine>,
}

impl ApiState {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub async fn run(config: HttpServerConfig, engine: QueryEngine) -> Result<(), String> {
    let app = build_router(ApiState::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|err| format!("bind {} failed: {}", config.bind_addr, err))?;
    tracing::info!(addr = %config.bind_addr, "lookup service listening");
    axum::serve(listener, app)
        .await
        .map_err(|err| format!("server error: {}", err))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/fields", get(list_fields))
        .route("/v1/parameters", get(list_parameters))
        .route("/v1/parameters/{name}", get(parameter_values))
        .route("/v1/query", post(query))
        .route("/v1/overlay", post(overlay))
        .route("/v1/matching", post(matching))
        .with_state(state)
}

pub async fn list_fields(State(state): State<ApiState>) -> Response {
    Json(NamesResponse {
        names: state.engine.get_field_names(),
    })
    .into_response()
}

pub async fn list_parameters(State(state): State<ApiState>) -> Response {
    Json(NamesResponse {
        names: state.engine.get_parameter_names(),
    })
    .into_response()
}

pub async fn parameter_values(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    match state.engine.get_parameter_values(&name) {
        Ok(values) => Json(ParameterResponse {
            values: ParameterValues::from(values),
            name,
        })
        .into_response(),
        Err(err) => char_error(err),
    }
}

pub async fn query(State(state): State<ApiState>, Json(payload): Json<QueryRequest>) -> Response {
    tracing::debug!(expression = %payload.expression, "query");
    match state.engine.query(&payload.expression, &payload.conditions) {
        Ok(value) => Json(QueryResponse {
            expression: payload.expression,
            value,
        })
        .into_response(),
        Err(err) => char_error(err),
    }
}

pub async fn overlay(
    State(state): State<ApiState>,
    Json(payload): Json<QueryRequest>,
) -> Response {
    match state.engine.overlay(&payload.expression, &payload.conditions) {
        Ok(points) => Json(OverlayResponse {
            expression: payload.expression,
            points,
        })
        .into_response(),
        Err(err) => char_error(err),
    }
}

pub async fn matching(
    State(state): State<ApiState>,
    Json(payload): Json<MatchingRequest>,
) -> Response {
    match state.engine.get_matching_value(
        &payload.original,
        &payload.matching,
        payload.value,
        &payload.conditions,
    ) {
        Ok(value) => Json(MatchingResponse {
            original: payload.original,
            matching: payload.matching,
            value,
        })
        .into_response(),
        Err(err) => char_error(err),
    }
}

fn char_error(err: CharError) -> Response {
    let message = err.to_string();
    match err {
        CharError::UnknownAxis { valid, .. } => {
            api_error(StatusCode::NOT_FOUND, "UNKNOWN_AXIS", &message, Some(valid))
        }
        CharError::FieldNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "FIELD_NOT_FOUND", &message, None)
        }
        CharError::MissingCondition(_) => {
            api_error(StatusCode::BAD_REQUEST, "MISSING_CONDITION", &message, None)
        }
        CharError::Expression(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_EXPRESSION", &message, None)
        }
        CharError::Condition(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_CONDITION", &message, None)
        }
        _ => {
            tracing::error!(error = %message, "query failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "QUERY_ERROR",
                &message,
                None,
            )
        }
    }
}

fn api_error(
    status: StatusCode,
    code: &str,
    message: &str,
    details: Option<Vec<String>>,
) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
            details,
        },
    };
    (status, Json(body)).into_response()
}
