//! Núcleo del asistente: evento entrante → intención → vista → respuesta.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::Catalog;
use crate::documents::DocumentStore;
use crate::intent;
use crate::models::{EventError, InboundEvent, OutboundResponse, RawInboundEvent};
use crate::navigator;
use crate::renderer;

/// Contexto inmutable compartido por todos los eventos. Clonarlo es barato.
#[derive(Clone)]
pub struct Assistant {
    catalog: Arc<Catalog>,
    documents: Arc<dyn DocumentStore>,
}

impl Assistant {
    pub fn new(catalog: Arc<Catalog>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { catalog, documents }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn handle(&self, event: &InboundEvent) -> OutboundResponse {
        let intent = intent::resolve(&self.catalog, event);
        let view = navigator::navigate(&self.catalog, &intent);
        debug!(
            conversation = event.conversation_id(),
            ?intent,
            destination = ?view.destination,
            "Evento resuelto"
        );
        renderer::render(&view, self.documents.as_ref()).await
    }

    /// Igual que `handle`, pero para eventos que todavía no se validaron.
    pub async fn handle_raw(&self, raw: RawInboundEvent) -> Result<OutboundResponse, EventError> {
        let event = InboundEvent::try_from(raw)?;
        Ok(self.handle(&event).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::memory::MemoryDocumentStore;
    use crate::models::{MenuOption, OutboundAttachment};

    fn assistant() -> Assistant {
        Assistant::new(
            Arc::new(Catalog::embedded().unwrap()),
            Arc::new(MemoryDocumentStore::default()),
        )
    }

    fn text(text: &str) -> InboundEvent {
        InboundEvent::Text { conversation_id: 1, text: text.to_string() }
    }

    fn button(data: &str) -> InboundEvent {
        InboundEvent::Callback { conversation_id: 1, data: data.to_string() }
    }

    fn targets(controls: &Option<Vec<MenuOption>>) -> Vec<&str> {
        controls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|o| o.target.as_str())
            .collect()
    }

    #[tokio::test]
    async fn requirements_keyword_shows_requirements_with_back_button() {
        let assistant = assistant();
        let response = assistant.handle(&text("requisitos")).await;

        let expected = assistant.catalog().content("requisitos").unwrap();
        assert_eq!(response.text, expected.text);
        assert_eq!(targets(&response.controls), ["inicio"]);
    }

    #[tokio::test]
    async fn main_menu_button_shows_welcome() {
        let assistant = assistant();
        let response = assistant.handle(&button("menu_principal")).await;

        let expected = assistant.catalog().content("bienvenida").unwrap();
        assert_eq!(response.text, expected.text);
        assert_eq!(
            targets(&response.controls),
            ["inicio", "finalizacion", "faq", "contacto"]
        );
    }

    #[tokio::test]
    async fn start_command_and_main_menu_button_match() {
        let assistant = assistant();
        let from_command = assistant.handle(&text("/start")).await;
        let from_button = assistant.handle(&button("menu_principal")).await;
        assert_eq!(from_command, from_button);
    }

    #[tokio::test]
    async fn gibberish_gets_fallback_without_controls() {
        let assistant = assistant();
        let response = assistant.handle(&text("asdkjalksd")).await;

        let expected = assistant.catalog().content("sin_coincidencia").unwrap();
        assert_eq!(response.text, expected.text);
        assert_eq!(response.controls, None);
    }

    #[tokio::test]
    async fn unknown_button_gets_fallback() {
        let response = assistant().handle(&button("boton_viejo")).await;
        assert_eq!(response.controls, None);
        assert!(response.text.contains("No estoy seguro"));
    }

    #[tokio::test]
    async fn main_menu_is_byte_identical_across_calls() {
        let assistant = assistant();
        let first = assistant.handle(&button("menu_principal")).await;
        let second = assistant.handle(&button("menu_principal")).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn formulario_without_files_still_answers() {
        let assistant = assistant();
        let response = assistant.handle(&text("formulario 001")).await;

        assert!(response.text.contains("Formulario 001"));
        assert!(response
            .attachments
            .iter()
            .all(|a| matches!(a, OutboundAttachment::Missing { .. })));
        assert_eq!(response.attachments.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_events_share_the_context() {
        let assistant = assistant();
        let handles: Vec<_> = ["requisitos", "faq", "sin empresa", "asdkjalksd"]
            .into_iter()
            .map(|input| {
                let assistant = assistant.clone();
                tokio::spawn(async move { assistant.handle(&text(input)).await })
            })
            .collect();

        for handle in handles {
            let response = handle.await.unwrap();
            assert!(!response.text.is_empty());
        }
    }

    #[tokio::test]
    async fn malformed_raw_event_is_rejected() {
        let raw = RawInboundEvent {
            kind: Some("text".into()),
            payload: None,
            conversation_id: Some(serde_json::Value::from(1)),
        };
        assert!(matches!(
            assistant().handle_raw(raw).await,
            Err(EventError::MalformedInboundEvent(_))
        ));
    }
}
