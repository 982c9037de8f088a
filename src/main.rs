// Módulos de la aplicación
mod api;
mod app_state;
mod assistant;
mod catalog;
mod config;
mod documents;
mod intent;
mod keep_alive;
mod models;
mod navigator;
mod renderer;
mod telegram;
mod transport;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::assistant::Assistant;
use crate::catalog::Catalog;
use crate::config::TransportMode;
use crate::documents::FsDocumentStore;
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Cargar y validar el catálogo de pantallas
    let catalog = Catalog::load(cfg.catalog_path.as_deref()).context("Catálogo inválido")?;
    let reachable = navigator::reachable_screens(&catalog);
    info!(
        "Catálogo cargado: {} pantallas ({} alcanzables desde '{}'), {} respuestas, {} palabras clave",
        catalog.screens.len(),
        reachable.len(),
        catalog.root,
        catalog.replies.len(),
        catalog.keywords.len()
    );
    for id in catalog.screens.keys().filter(|id| !reachable.contains(&id.as_str())) {
        warn!("La pantalla '{}' sólo se alcanza por palabra clave o comando", id);
    }

    // 4. Documentos estáticos
    let documents = FsDocumentStore::new(&cfg.docs_dir);
    documents.log_inventory(
        catalog
            .screens
            .values()
            .flat_map(|s| s.attachments.iter().map(|a| a.file.as_str())),
    );

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        assistant: Assistant::new(Arc::new(catalog), Arc::new(documents)),
        telegram: TelegramClient::new(&cfg.telegram_api_url, cfg.bot_token.clone()),
        started_at: Utc::now(),
    };

    // 6. Transporte: webhook (Telegram nos llama) o long polling (llamamos nosotros)
    let mut background = Vec::new();
    match &cfg.transport {
        TransportMode::Webhook { endpoint } => {
            app_state
                .telegram
                .set_webhook(endpoint.as_str(), cfg.webhook_secret.as_deref())
                .await
                .context("Error registrando el webhook en Telegram")?;
            info!("🔗 Webhook registrado en {}", endpoint);
        }
        TransportMode::Polling => {
            background.push(tokio::spawn(transport::run_polling(app_state.clone())));
        }
    }

    if let Some(url) = cfg.keep_alive_url.clone() {
        info!("Keep-alive cada {:?} contra {}", cfg.keep_alive_interval, url);
        background.push(tokio::spawn(keep_alive::run(url, cfg.keep_alive_interval)));
    }

    // 7. Iniciar el servidor HTTP (salud + webhook)
    let app = api::create_router(app_state.clone());
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🤖 Bot en ejecución, servidor escuchando en http://{}", server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    for task in background {
        task.abort();
    }
    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
