//! Cliente mínimo de la Bot API de Telegram y tipos de `Update`.
//!
//! Sólo lo que usa el asistente: recibir actualizaciones (long polling o webhook),
//! enviar texto con teclado inline, enviar documentos y responder callbacks.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EventError, InboundEvent, MarkupDialect, MenuOption};

/// Margen sobre el timeout del long polling antes de dar la petición por perdida.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("error HTTP hablando con Telegram: {0}")]
    Http(reqwest::Error),
    #[error("Telegram rechazó {method}: {description}")]
    Api { method: String, description: String },
}

// Las URLs llevan el token: nunca deben llegar a los logs.
impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                method: method.to_string(),
                description: self
                    .description
                    .unwrap_or_else(|| "respuesta sin descripción".to_string()),
            }),
        }
    }
}

// --- Tipos entrantes ---

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

impl Update {
    /// Traduce la actualización al evento del asistente. Mensajes sin texto
    /// (fotos, stickers...) y callbacks sin datos o sin chat se rechazan.
    pub fn to_event(&self) -> Result<InboundEvent, EventError> {
        if let Some(query) = &self.callback_query {
            let chat = query.message.as_ref().map(|m| m.chat.id).ok_or_else(|| {
                EventError::MalformedInboundEvent(format!(
                    "callback {} sin mensaje de origen",
                    query.id
                ))
            })?;
            let data = query.data.clone().ok_or_else(|| {
                EventError::MalformedInboundEvent(format!("callback {} sin datos", query.id))
            })?;
            return Ok(InboundEvent::Callback { conversation_id: chat, data });
        }

        if let Some(message) = &self.message {
            let text = message.text.clone().ok_or_else(|| {
                EventError::MalformedInboundEvent(format!(
                    "mensaje {} sin texto",
                    message.message_id
                ))
            })?;
            return Ok(InboundEvent::Text { conversation_id: message.chat.id, text });
        }

        Err(EventError::MalformedInboundEvent(format!(
            "update {} sin mensaje ni callback",
            self.update_id
        )))
    }

    pub fn callback_id(&self) -> Option<&str> {
        self.callback_query.as_ref().map(|q| q.id.as_str())
    }
}

// --- Tipos salientes ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// Un botón por fila, en el orden del menú.
    pub fn from_menu(options: &[MenuOption]) -> Self {
        Self {
            inline_keyboard: options
                .iter()
                .map(|o| {
                    vec![InlineKeyboardButton {
                        text: o.label.clone(),
                        callback_data: o.target.clone(),
                    }]
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct SetWebhook<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    allowed_updates: [&'static str; 2],
}

const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

/// Cliente HTTP de la Bot API. Clonarlo comparte el pool de conexiones.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: SecretString,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token.expose_secret(), method)
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response: ApiResponse<T> = self
            .http
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?
            .json()
            .await?;
        response.into_result(method)
    }

    /// Long polling: espera hasta `timeout` segundos por nuevas actualizaciones.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };
        let response: ApiResponse<Vec<Update>> = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(timeout + POLL_GRACE)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;
        response.into_result("getUpdates")
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: MarkupDialect,
        controls: Option<&[MenuOption]>,
    ) -> Result<(), TelegramError> {
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: markup.parse_mode(),
            reply_markup: controls.map(InlineKeyboardMarkup::from_menu),
        };
        let _: IgnoredAny = self.call("sendMessage", &payload).await?;
        Ok(())
    }

    pub async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), TelegramError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let document = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", document);

        let response: ApiResponse<IgnoredAny> = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        response.into_result("sendDocument").map(|_| ())
    }

    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<(), TelegramError> {
        let payload = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), TelegramError> {
        let payload = SetWebhook {
            url,
            secret_token,
            allowed_updates: ALLOWED_UPDATES,
        };
        let _: bool = self.call("setWebhook", &payload).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        let payload = serde_json::json!({ "drop_pending_updates": false });
        let _: bool = self.call("deleteWebhook", &payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_message_becomes_text_event() {
        let update = update(
            r#"{"update_id":10,"message":{"message_id":5,"chat":{"id":99,"type":"private"},"text":"requisitos"}}"#,
        );
        assert_eq!(
            update.to_event().unwrap(),
            InboundEvent::Text { conversation_id: 99, text: "requisitos".into() }
        );
        assert_eq!(update.callback_id(), None);
    }

    #[test]
    fn button_press_becomes_callback_event() {
        let update = update(
            r#"{"update_id":11,"callback_query":{"id":"abc","data":"faq",
                "message":{"message_id":6,"chat":{"id":-5}}}}"#,
        );
        assert_eq!(
            update.to_event().unwrap(),
            InboundEvent::Callback { conversation_id: -5, data: "faq".into() }
        );
        assert_eq!(update.callback_id(), Some("abc"));
    }

    #[test]
    fn updates_without_usable_payload_are_malformed() {
        let photo = update(r#"{"update_id":12,"message":{"message_id":7,"chat":{"id":1},"photo":[]}}"#);
        let no_data = update(r#"{"update_id":13,"callback_query":{"id":"x","message":{"message_id":8,"chat":{"id":1}}}}"#);
        let edited = update(r#"{"update_id":14,"edited_message":{"message_id":9,"chat":{"id":1},"text":"hola"}}"#);

        for update in [photo, no_data, edited] {
            assert!(matches!(update.to_event(), Err(EventError::MalformedInboundEvent(_))));
        }
    }

    #[test]
    fn keyboard_has_one_button_per_row_in_menu_order() {
        let menu = vec![
            MenuOption { label: "Inicio".into(), target: "inicio".into() },
            MenuOption { label: "FAQ".into(), target: "faq".into() },
        ];
        let json = serde_json::to_value(InlineKeyboardMarkup::from_menu(&menu)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inline_keyboard": [
                    [{"text": "Inicio", "callback_data": "inicio"}],
                    [{"text": "FAQ", "callback_data": "faq"}]
                ]
            })
        );
    }

    #[test]
    fn plain_messages_omit_parse_mode() {
        let payload = SendMessage {
            chat_id: 1,
            text: "hola",
            parse_mode: MarkupDialect::Plain.parse_mode(),
            reply_markup: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 1, "text": "hola"}));
    }

    #[test]
    fn api_errors_carry_description() {
        let response: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#,
        )
        .unwrap();
        let err = response.into_result("sendMessage").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Telegram rechazó sendMessage: Bad Request: can't parse entities"
        );
    }

    #[test]
    fn method_url_includes_token_and_trims_slash() {
        let client = TelegramClient::new("https://api.telegram.org/", SecretString::new("123:abc".into()));
        assert_eq!(
            client.method_url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }
}
