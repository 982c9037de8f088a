//! Entrega de respuestas y recepción de actualizaciones (polling o webhook).

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::{MarkupDialect, OutboundAttachment, OutboundResponse};
use crate::telegram::{TelegramClient, Update};

const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(60);

/// Envía la respuesta: primero el texto con su teclado, después cada adjunto en orden.
/// Un fallo en un adjunto no impide enviar los siguientes.
pub async fn deliver(client: &TelegramClient, chat_id: i64, response: &OutboundResponse) -> Result<()> {
    client
        .send_message(chat_id, &response.text, response.markup, response.controls.as_deref())
        .await?;

    for attachment in &response.attachments {
        let sent = match attachment {
            OutboundAttachment::Document { filename, bytes } => {
                client.send_document(chat_id, filename, bytes.clone()).await
            }
            OutboundAttachment::Missing { warning, .. } => {
                client.send_message(chat_id, warning, MarkupDialect::Plain, None).await
            }
        };
        if let Err(e) = sent {
            error!("No se pudo enviar un adjunto al chat {}: {}", chat_id, e);
        }
    }
    Ok(())
}

/// Procesa una actualización de principio a fin. Nunca falla hacia arriba:
/// los errores se registran y la actualización se descarta.
pub async fn dispatch_update(state: AppState, update: Update) {
    let span = tracing::info_span!("update", id = update.update_id, trace = %Uuid::new_v4());
    async move {
        if let Some(callback_id) = update.callback_id() {
            if let Err(e) = state.telegram.answer_callback_query(callback_id).await {
                warn!("No se pudo confirmar el callback: {}", e);
            }
        }

        let event = match update.to_event() {
            Ok(event) => event,
            Err(e) => {
                debug!("Actualización descartada: {}", e);
                return;
            }
        };

        let response = state.assistant.handle(&event).await;
        if let Err(e) = deliver(&state.telegram, event.conversation_id(), &response).await {
            error!("Error enviando la respuesta al chat {}: {}", event.conversation_id(), e);
        }
    }
    .instrument(span)
    .await
}

/// Bucle de long polling. Cada actualización se atiende en su propia tarea.
pub async fn run_polling(state: AppState) {
    if let Err(e) = state.telegram.delete_webhook().await {
        warn!("No se pudo borrar el webhook previo: {}", e);
    }
    info!("📡 Escuchando mensajes por long polling...");

    let mut offset: Option<i64> = None;
    let mut backoff = RETRY_BASE;
    loop {
        match state.telegram.get_updates(offset, state.config.poll_timeout).await {
            Ok(updates) => {
                backoff = RETRY_BASE;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    tokio::spawn(dispatch_update(state.clone(), update));
                }
            }
            Err(e) => {
                warn!("Error en getUpdates: {}. Reintentando en {:?}", e, backoff);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(RETRY_MAX)
}
