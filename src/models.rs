//! Modelos de dominio: eventos entrantes, intenciones, menús y respuestas salientes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Dialecto de marcado con el que se envía un texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupDialect {
    Plain,
    MarkdownV2,
    Html,
}

impl MarkupDialect {
    /// Valor de `parse_mode` que espera la Bot API (`None` para texto plano).
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::MarkdownV2 => Some("MarkdownV2"),
            Self::Html => Some("HTML"),
        }
    }
}

/// Una opción de un menú de navegación: etiqueta visible + destino.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    pub target: String,
}

/// Evento entrante ya validado. Se decide una sola vez, en el borde,
/// si es texto libre o la pulsación de un botón.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text { conversation_id: i64, text: String },
    Callback { conversation_id: i64, data: String },
}

impl InboundEvent {
    pub fn conversation_id(&self) -> i64 {
        match self {
            Self::Text { conversation_id, .. } | Self::Callback { conversation_id, .. } => {
                *conversation_id
            }
        }
    }
}

/// Forma genérica `{ kind, payload, conversation_id }` en la que un transporte
/// puede entregar eventos. Todos los campos son opcionales para poder rechazar
/// los incompletos con un error explícito.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInboundEvent {
    pub kind: Option<String>,
    pub payload: Option<String>,
    /// Cualquier escalar JSON; al validar se exige que sea un entero (el `chat_id`
    /// de Telegram), admitiendo también su forma en texto.
    pub conversation_id: Option<Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("evento entrante mal formado: {0}")]
    MalformedInboundEvent(String),
}

impl TryFrom<RawInboundEvent> for InboundEvent {
    type Error = EventError;

    fn try_from(raw: RawInboundEvent) -> Result<Self, Self::Error> {
        let conversation_id = raw
            .conversation_id
            .ok_or_else(|| EventError::MalformedInboundEvent("falta conversation_id".to_string()))
            .and_then(parse_conversation_id)?;
        let payload = raw
            .payload
            .ok_or_else(|| EventError::MalformedInboundEvent("falta payload".to_string()))?;

        match raw.kind.as_deref() {
            Some("text") => Ok(Self::Text { conversation_id, text: payload }),
            Some("callback") => Ok(Self::Callback { conversation_id, data: payload }),
            Some(other) => Err(EventError::MalformedInboundEvent(format!(
                "tipo de evento desconocido: {other}"
            ))),
            None => Err(EventError::MalformedInboundEvent("falta kind".to_string())),
        }
    }
}

fn parse_conversation_id(raw: Value) -> Result<i64, EventError> {
    let parsed = match &raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        EventError::MalformedInboundEvent(format!("conversation_id inválido: {raw}"))
    })
}

/// Intención simbólica derivada de la entrada del usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Volver (o llegar por primera vez) al menú principal.
    Root,
    /// Id de una pantalla o de una respuesta suelta. Puede no existir:
    /// el navegador decide.
    Target(String),
    Unknown,
}

/// Adjunto ya resuelto contra el almacén de documentos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAttachment {
    Document { filename: String, bytes: Vec<u8> },
    /// El documento no está; se envía este aviso en su lugar.
    Missing { filename: String, warning: String },
}

/// Respuesta completa lista para que el transporte la entregue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub text: String,
    pub markup: MarkupDialect,
    pub controls: Option<Vec<MenuOption>>,
    pub attachments: Vec<OutboundAttachment>,
}
