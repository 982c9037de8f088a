use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tokio::spawn;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::{
    app_state::AppState,
    models::{MarkupDialect, MenuOption, OutboundAttachment, OutboundResponse, RawInboundEvent},
    telegram::Update,
    transport,
};

/// Cabecera con la que Telegram firma las llamadas al webhook.
const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

const HOME_TEXT: &str = "Bot PPS UTN FRC activo";

// --- Respuestas de la API ---

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    transport: &'static str,
    started_at: String,
    uptime_secs: i64,
    screens: usize,
}

/// Vista previa de una respuesta, sin los bytes de los adjuntos.
#[derive(Debug, Serialize)]
pub struct ResponsePreview {
    text: String,
    markup: MarkupDialect,
    controls: Option<Vec<MenuOption>>,
    attachments: Vec<AttachmentPreview>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentPreview {
    filename: String,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl From<OutboundResponse> for ResponsePreview {
    fn from(response: OutboundResponse) -> Self {
        let attachments = response
            .attachments
            .into_iter()
            .map(|a| match a {
                OutboundAttachment::Document { filename, .. } => AttachmentPreview {
                    filename,
                    available: true,
                    warning: None,
                },
                OutboundAttachment::Missing { filename, warning } => AttachmentPreview {
                    filename,
                    available: false,
                    warning: Some(warning),
                },
            })
            .collect();
        Self {
            text: response.text,
            markup: response.markup,
            controls: response.controls,
            attachments,
        }
    }
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .route("/api/event", post(event_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

// --- Handlers ---

async fn home_handler() -> &'static str {
    HOME_TEXT
}

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        transport: state.config.transport.name(),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        screens: state.assistant.catalog().screens.len(),
    })
}

/// Recibe las actualizaciones que Telegram empuja en modo webhook.
/// El secreto se comprueba antes de mirar el cuerpo; el evento se procesa en segundo plano.
#[axum::debug_handler]
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !secret_matches(state.config.webhook_secret.as_deref(), provided) {
        warn!("Llamada al webhook con secreto inválido");
        return StatusCode::UNAUTHORIZED;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!("Cuerpo del webhook ilegible: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    spawn(transport::dispatch_update(state, update));
    StatusCode::OK
}

/// Resuelve un evento genérico `{kind, payload, conversation_id}` y devuelve la
/// respuesta que se enviaría, sin tocar Telegram.
#[axum::debug_handler]
async fn event_handler(
    State(state): State<AppState>,
    Json(raw): Json<RawInboundEvent>,
) -> Result<Json<ResponsePreview>, (StatusCode, Json<serde_json::Value>)> {
    match state.assistant.handle_raw(raw).await {
        Ok(response) => Ok(Json(response.into())),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

fn secret_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (None, _) => true,
        (Some(expected), Some(provided)) => {
            bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
        }
        (Some(_), None) => false,
    }
}
