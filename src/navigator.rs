//! Navegación por pantallas: de una intención a (contenido, menú, adjuntos).
//!
//! No hay cursor de sesión: la pantalla se deduce de cada evento.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::catalog::{AttachmentSpec, Catalog};
use crate::models::{Intent, MarkupDialect, MenuOption};

/// Sólo se usa si el contenido de fallback desaparece del catálogo, cosa que la
/// validación de carga impide.
const LAST_RESORT_TEXT: &str = "No estoy seguro qué necesitás. Escribí /start para ver el menú.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination<'a> {
    Screen(&'a str),
    Reply(&'a str),
    Fallback,
}

/// Lo que hay que mostrar, todavía sin resolver los adjuntos.
#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
    pub destination: Destination<'a>,
    pub text: &'a str,
    pub markup: MarkupDialect,
    pub menu: &'a [MenuOption],
    pub attachments: &'a [AttachmentSpec],
}

pub fn navigate<'a>(catalog: &'a Catalog, intent: &Intent) -> View<'a> {
    let view = match intent {
        Intent::Root => screen_view(catalog, &catalog.root),
        Intent::Target(id) => screen_view(catalog, id).or_else(|| reply_view(catalog, id)),
        Intent::Unknown => None,
    };

    view.unwrap_or_else(|| {
        debug!(?intent, "Intención sin resolver, se responde con el mensaje por defecto");
        fallback_view(catalog)
    })
}

fn screen_view<'a>(catalog: &'a Catalog, id: &str) -> Option<View<'a>> {
    let (id, screen) = catalog.screens.get_key_value(id)?;
    let content = catalog.content(&screen.content)?;
    Some(View {
        destination: Destination::Screen(id),
        text: &content.text,
        markup: content.markup,
        menu: &screen.menu,
        attachments: &screen.attachments,
    })
}

fn reply_view<'a>(catalog: &'a Catalog, id: &str) -> Option<View<'a>> {
    let (id, _) = catalog.replies.get_key_value(id)?;
    let content = catalog.reply(id)?;
    Some(View {
        destination: Destination::Reply(id),
        text: &content.text,
        markup: content.markup,
        menu: &[],
        attachments: &[],
    })
}

fn fallback_view(catalog: &Catalog) -> View<'_> {
    let (text, markup) = match catalog.content(&catalog.fallback) {
        Some(content) => (content.text.as_str(), content.markup),
        None => (LAST_RESORT_TEXT, MarkupDialect::Plain),
    };
    View {
        destination: Destination::Fallback,
        text,
        markup,
        menu: &[],
        attachments: &[],
    }
}

/// Pantallas a las que se llega desde la raíz siguiendo menús, en orden de recorrido.
pub fn reachable_screens(catalog: &Catalog) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([catalog.root.as_str()]);

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let Some(screen) = catalog.screen(id) else {
            continue;
        };
        order.push(id);
        queue.extend(screen.menu.iter().map(|option| option.target.as_str()));
    }
    order
}
