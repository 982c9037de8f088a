//! Catálogo declarativo del asistente: contenidos, pantallas, menús,
//! respuestas sueltas y palabras clave.
//!
//! El catálogo se carga una única vez al arrancar (embebido en el binario o
//! desde `CATALOG_PATH`) y se valida entero antes de atender el primer mensaje:
//!   - ningún menú apunta a una pantalla inexistente,
//!   - ningún contenido referenciado falta o está vacío,
//!   - toda palabra clave apunta a una pantalla o a una respuesta,
//!   - desde cualquier pantalla se puede volver a la raíz.
//!
//! Después es inmutable y se comparte por `Arc` sin bloqueos.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::{MarkupDialect, MenuOption};

pub const CATALOG_VERSION: u32 = 1;

const EMBEDDED_CATALOG: &str = include_str!("../content/catalogo.yaml");

/// Límite de Telegram para el `callback_data` de un botón.
const MAX_CALLBACK_BYTES: usize = 64;

/// Caracteres reservados de MarkdownV2 que en nuestros textos nunca son marcado,
/// así que siempre deben ir escapados.
const MARKDOWN_V2_LITERALS: &[char] = &['.', '!', '(', ')', '-', '+', '=', '#', '{', '}'];

/// Cómo se desempata cuando varias palabras clave aparecen en el mismo mensaje.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Gana la primera regla, en el orden del catálogo.
    #[default]
    First,
    /// Gana la regla con el literal más largo; a igual longitud, la primera.
    Longest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub markup: MarkupDialect,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttachmentSpec {
    pub file: String,
    pub missing_warning: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Screen {
    pub content: String,
    #[serde(default)]
    pub menu: Vec<MenuOption>,
    #[serde(default)]
    pub attachments: Vec<AttachmentSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub literal: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub version: u32,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    pub root: String,
    pub fallback: String,
    #[serde(default)]
    pub root_aliases: Vec<String>,
    pub contents: BTreeMap<String, ContentEntry>,
    pub screens: BTreeMap<String, Screen>,
    /// Respuestas sueltas (sin menú): id → id de contenido.
    #[serde(default)]
    pub replies: BTreeMap<String, String>,
    #[serde(default)]
    pub keywords: Vec<KeywordRule>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no se pudo leer el catálogo {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catálogo YAML inválido: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("versión de catálogo no soportada: {found} (se esperaba {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("la pantalla raíz '{0}' no existe")]
    UnknownRoot(String),
    #[error("'{owner}' referencia el contenido inexistente '{content}'")]
    MissingContent { owner: String, content: String },
    #[error("el contenido '{0}' está vacío")]
    EmptyContent(String),
    #[error("el menú de '{screen}' apunta a la pantalla inexistente '{target}'")]
    DanglingMenuTarget { screen: String, target: String },
    #[error("el menú de '{0}' tiene una opción sin etiqueta")]
    EmptyMenuLabel(String),
    #[error("el destino '{target}' del menú de '{screen}' supera los 64 bytes de un botón")]
    CallbackTooLong { screen: String, target: String },
    #[error("la pantalla '{0}' tiene un adjunto sin nombre de fichero")]
    EmptyAttachment(String),
    #[error("la palabra clave #{0} está vacía")]
    EmptyKeyword(usize),
    #[error("la palabra clave '{literal}' apunta a '{target}', que no es pantalla ni respuesta")]
    UnknownKeywordTarget { literal: String, target: String },
    #[error("el id '{0}' está definido como pantalla y como respuesta")]
    DuplicateId(String),
    #[error("desde la pantalla '{0}' no hay camino de vuelta a la raíz")]
    NoPathToRoot(String),
    #[error("el contenido '{content}' tiene '{character}' sin escapar en la posición {offset} (MarkdownV2)")]
    UnescapedMarkdown {
        content: String,
        character: char,
        offset: usize,
    },
}

impl Catalog {
    /// Carga el catálogo desde `path`, o el embebido en el binario si no se indica ruta.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml_str(&raw)
            }
            None => Self::embedded(),
        }
    }

    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_yaml_str(EMBEDDED_CATALOG)
    }

    /// Parsea, normaliza y valida un catálogo en YAML.
    pub fn from_yaml_str(raw: &str) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = serde_yaml::from_str(raw)?;
        catalog.normalize();
        catalog.validate()?;
        Ok(catalog)
    }

    fn normalize(&mut self) {
        for rule in &mut self.keywords {
            rule.literal = rule.literal.trim().to_lowercase();
        }
        for alias in &mut self.root_aliases {
            *alias = alias.trim().to_lowercase();
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: self.version,
                expected: CATALOG_VERSION,
            });
        }
        if !self.screens.contains_key(&self.root) {
            return Err(CatalogError::UnknownRoot(self.root.clone()));
        }
        self.check_content("fallback", &self.fallback)?;

        for (id, screen) in &self.screens {
            self.check_content(id, &screen.content)?;
            for option in &screen.menu {
                if option.label.trim().is_empty() {
                    return Err(CatalogError::EmptyMenuLabel(id.clone()));
                }
                if option.target.len() > MAX_CALLBACK_BYTES {
                    return Err(CatalogError::CallbackTooLong {
                        screen: id.clone(),
                        target: option.target.clone(),
                    });
                }
                if !self.screens.contains_key(&option.target) {
                    return Err(CatalogError::DanglingMenuTarget {
                        screen: id.clone(),
                        target: option.target.clone(),
                    });
                }
            }
            if screen.attachments.iter().any(|a| a.file.trim().is_empty()) {
                return Err(CatalogError::EmptyAttachment(id.clone()));
            }
        }

        for (id, content) in &self.replies {
            if self.screens.contains_key(id) {
                return Err(CatalogError::DuplicateId(id.clone()));
            }
            self.check_content(id, content)?;
        }

        for (index, rule) in self.keywords.iter().enumerate() {
            if rule.literal.is_empty() {
                return Err(CatalogError::EmptyKeyword(index));
            }
            if !self.is_target(&rule.target) {
                return Err(CatalogError::UnknownKeywordTarget {
                    literal: rule.literal.clone(),
                    target: rule.target.clone(),
                });
            }
        }

        self.check_paths_to_root()?;

        for (id, entry) in &self.contents {
            if entry.markup != MarkupDialect::MarkdownV2 {
                continue;
            }
            if let Some((offset, character)) = find_unescaped_markdown(&entry.text) {
                return Err(CatalogError::UnescapedMarkdown {
                    content: id.clone(),
                    character,
                    offset,
                });
            }
        }

        Ok(())
    }

    fn check_content(&self, owner: &str, content_id: &str) -> Result<(), CatalogError> {
        match self.contents.get(content_id) {
            None => Err(CatalogError::MissingContent {
                owner: owner.to_string(),
                content: content_id.to_string(),
            }),
            Some(entry) if entry.text.trim().is_empty() => {
                Err(CatalogError::EmptyContent(content_id.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Recorre el grafo de menús al revés desde la raíz: toda pantalla que no
    /// aparezca no tiene forma de volver al menú principal.
    fn check_paths_to_root(&self) -> Result<(), CatalogError> {
        let mut incoming: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (id, screen) in &self.screens {
            for option in &screen.menu {
                incoming.entry(option.target.as_str()).or_default().push(id.as_str());
            }
        }

        let mut reaches_root: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([self.root.as_str()]);
        while let Some(current) = queue.pop_front() {
            if !reaches_root.insert(current) {
                continue;
            }
            if let Some(sources) = incoming.get(current) {
                queue.extend(sources.iter().copied());
            }
        }

        match self.screens.keys().find(|id| !reaches_root.contains(id.as_str())) {
            Some(id) => Err(CatalogError::NoPathToRoot(id.clone())),
            None => Ok(()),
        }
    }

    pub fn screen(&self, id: &str) -> Option<&Screen> {
        self.screens.get(id)
    }

    pub fn content(&self, id: &str) -> Option<&ContentEntry> {
        self.contents.get(id)
    }

    /// Contenido de una respuesta suelta.
    pub fn reply(&self, id: &str) -> Option<&ContentEntry> {
        self.replies.get(id).and_then(|content| self.contents.get(content))
    }

    pub fn is_target(&self, id: &str) -> bool {
        self.screens.contains_key(id) || self.replies.contains_key(id)
    }

    pub fn is_root_alias(&self, id: &str) -> bool {
        self.root_aliases.iter().any(|alias| alias == id)
    }
}

/// Devuelve la posición (en bytes) y el carácter del primer reservado sin escapar.
fn find_unescaped_markdown(text: &str) -> Option<(usize, char)> {
    let mut escaped = false;
    for (offset, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if MARKDOWN_V2_LITERALS.contains(&ch) {
            return Some((offset, ch));
        }
    }
    None
}
