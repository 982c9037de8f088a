//! Almacén de documentos estáticos (los PDF del Formulario 001).
//!
//! Sólo lectura. Un documento ausente es un caso normal (`None`), no un error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};
use walkdir::WalkDir;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn lookup(&self, name: &str) -> Option<Vec<u8>>;
}

/// Documentos servidos desde un directorio del disco (`DOCS_DIR`).
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Lista los ficheros disponibles (nombres relativos al directorio raíz).
    pub fn inventory(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Registra en el log qué documentos hay y cuáles faltan de los esperados.
    pub fn log_inventory<'a>(&self, expected: impl IntoIterator<Item = &'a str>) {
        let available = self.inventory();
        info!(
            "Documentos disponibles en {}: {:?}",
            self.root.display(),
            available
        );
        for name in expected {
            if !available.iter().any(|a| a == name) {
                warn!("Falta el documento '{}' en {}", name, self.root.display());
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn lookup(&self, name: &str) -> Option<Vec<u8>> {
        if !is_plain_file_name(name) {
            warn!("Nombre de documento rechazado: '{}'", name);
            return None;
        }
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("No se pudo leer {}: {}", path.display(), e);
                None
            }
        }
    }
}

// Sólo nombres de fichero sueltos: nada de rutas ni `..`.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some()
}
