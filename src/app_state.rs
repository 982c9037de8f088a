use chrono::{DateTime, Utc};

use crate::{assistant::Assistant, config::AppConfig, telegram::TelegramClient};

/// Estado compartido por los handlers HTTP y las tareas de transporte.
/// Se construye una vez en `main`; nada aquí es mutable.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub assistant: Assistant,
    pub telegram: TelegramClient,
    pub started_at: DateTime<Utc>,
}
