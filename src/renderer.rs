//! Construcción de la respuesta saliente a partir de una vista.

use tracing::warn;

use crate::documents::DocumentStore;
use crate::models::{OutboundAttachment, OutboundResponse};
use crate::navigator::View;

/// Arma el mensaje principal con su teclado y resuelve los adjuntos en orden.
/// Un documento que falta se reemplaza por su aviso; el resto sigue igual.
pub async fn render(view: &View<'_>, store: &dyn DocumentStore) -> OutboundResponse {
    let controls = if view.menu.is_empty() {
        None
    } else {
        Some(view.menu.to_vec())
    };

    let mut attachments = Vec::with_capacity(view.attachments.len());
    for attachment in view.attachments {
        match store.lookup(&attachment.file).await {
            Some(bytes) => attachments.push(OutboundAttachment::Document {
                filename: attachment.file.clone(),
                bytes,
            }),
            None => {
                warn!("Documento '{}' no encontrado, se envía un aviso en su lugar", attachment.file);
                attachments.push(OutboundAttachment::Missing {
                    filename: attachment.file.clone(),
                    warning: attachment.missing_warning.clone(),
                });
            }
        }
    }

    OutboundResponse {
        text: view.text.to_string(),
        markup: view.markup,
        controls,
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::documents::memory::MemoryDocumentStore;
    use crate::models::{Intent, MarkupDialect};
    use crate::navigator::navigate;

    #[tokio::test]
    async fn missing_documents_become_warnings() {
        let catalog = Catalog::embedded().unwrap();
        let view = navigate(&catalog, &Intent::Target("f001".into()));
        let response = render(&view, &MemoryDocumentStore::default()).await;

        assert_eq!(response.text, view.text);
        assert_eq!(response.markup, MarkupDialect::MarkdownV2);
        assert_eq!(response.attachments.len(), 2);
        let warnings: Vec<_> = response
            .attachments
            .iter()
            .map(|a| match a {
                OutboundAttachment::Missing { warning, .. } => warning.as_str(),
                OutboundAttachment::Document { .. } => panic!("no debería haber documentos"),
            })
            .collect();
        assert!(warnings[0].contains("Formulario 001"));
        assert!(warnings[1].contains("ejemplo"));
    }

    #[tokio::test]
    async fn present_documents_keep_their_slot() {
        let catalog = Catalog::embedded().unwrap();
        let view = navigate(&catalog, &Intent::Target("f001".into()));
        let store = MemoryDocumentStore::default().with("Ejemplo_Formulario_001.pdf", b"%PDF");
        let response = render(&view, &store).await;

        assert!(matches!(
            &response.attachments[0],
            OutboundAttachment::Missing { filename, .. } if filename == "Formulario_001.pdf"
        ));
        assert_eq!(
            response.attachments[1],
            OutboundAttachment::Document {
                filename: "Ejemplo_Formulario_001.pdf".into(),
                bytes: b"%PDF".to_vec(),
            }
        );
        let targets: Vec<_> = response
            .controls
            .unwrap()
            .into_iter()
            .map(|o| o.target)
            .collect();
        assert_eq!(targets, ["docs_inicio"]);
    }

    #[tokio::test]
    async fn screens_without_menu_have_no_controls() {
        let catalog = Catalog::embedded().unwrap();
        let view = navigate(&catalog, &Intent::Unknown);
        let response = render(&view, &MemoryDocumentStore::default()).await;

        assert_eq!(response.controls, None);
        assert!(response.attachments.is_empty());
    }
}
