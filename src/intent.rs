//! Resolución de intenciones: texto libre, comandos `/x` y botones.
//!
//! Funciones puras sobre el catálogo; no guardan estado de la conversación.

use crate::catalog::{Catalog, KeywordRule, MatchPolicy};
use crate::models::{InboundEvent, Intent};

pub fn resolve(catalog: &Catalog, event: &InboundEvent) -> Intent {
    match event {
        InboundEvent::Text { text, .. } => resolve_text(catalog, text),
        InboundEvent::Callback { data, .. } => resolve_callback(catalog, data),
    }
}

/// Texto libre o comando. Las palabras clave se buscan como subcadenas,
/// sin distinguir mayúsculas, y el desempate lo decide `match_policy`.
pub fn resolve_text(catalog: &Catalog, text: &str) -> Intent {
    let text = text.trim();
    if text.is_empty() {
        return Intent::Unknown;
    }
    if let Some(command) = text.strip_prefix('/') {
        return resolve_command(catalog, command);
    }

    let normalized = text.to_lowercase();
    match match_keyword(catalog, &normalized) {
        Some(rule) => Intent::Target(rule.target.clone()),
        None => Intent::Unknown,
    }
}

/// El dato de un botón es directamente el id de destino (o un alias de la raíz).
pub fn resolve_callback(catalog: &Catalog, data: &str) -> Intent {
    let data = data.trim();
    if data.is_empty() {
        Intent::Unknown
    } else if catalog.is_root_alias(data) {
        Intent::Root
    } else {
        Intent::Target(data.to_string())
    }
}

// "/requisitos@PpsBot algo" -> "requisitos"
fn resolve_command(catalog: &Catalog, command: &str) -> Intent {
    let name = command
        .split_whitespace()
        .next()
        .and_then(|token| token.split('@').next())
        .unwrap_or_default()
        .to_lowercase();

    if name.is_empty() {
        Intent::Unknown
    } else if catalog.is_root_alias(&name) {
        Intent::Root
    } else {
        Intent::Target(name)
    }
}

fn match_keyword<'a>(catalog: &'a Catalog, normalized: &str) -> Option<&'a KeywordRule> {
    let mut matching = catalog
        .keywords
        .iter()
        .filter(|rule| normalized.contains(rule.literal.as_str()));

    match catalog.match_policy {
        MatchPolicy::First => matching.next(),
        MatchPolicy::Longest => matching.fold(None, |best: Option<&KeywordRule>, rule| match best {
            Some(current) if current.literal.chars().count() >= rule.literal.chars().count() => {
                Some(current)
            }
            _ => Some(rule),
        }),
    }
}
