//! Carga y gestión de configuración de la aplicación (Telegram + servidor HTTP).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use secrecy::SecretString;
use url::Url;

/// Cómo llegan los mensajes de Telegram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMode {
    /// Long polling con `getUpdates`.
    Polling,
    /// Telegram hace POST a `endpoint`, que es `{WEBHOOK_URL}/webhook`.
    Webhook { endpoint: Url },
}

impl TransportMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Webhook { .. } => "webhook",
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bot_token: SecretString,
    pub transport: TransportMode,
    pub webhook_secret: Option<String>,
    pub server_addr: String,
    pub telegram_api_url: String,
    pub poll_timeout: Duration,

    pub docs_dir: PathBuf,
    pub catalog_path: Option<PathBuf>,

    pub keep_alive_url: Option<Url>,
    pub keep_alive_interval: Duration,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo las variables con `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = var("BOT_TOKEN").ok_or_else(|| anyhow!("Falta BOT_TOKEN en el entorno"))?;

        let use_webhook = match var("USE_WEBHOOK") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow!("USE_WEBHOOK debe ser true/false, no '{raw}'"))?,
            None => false,
        };
        let transport = if use_webhook {
            let raw = var("WEBHOOK_URL")
                .ok_or_else(|| anyhow!("USE_WEBHOOK=true requiere WEBHOOK_URL"))?;
            let url = Url::parse(&raw).map_err(|e| anyhow!("WEBHOOK_URL inválida ({raw}): {e}"))?;
            if url.scheme() != "https" {
                return Err(anyhow!("WEBHOOK_URL debe ser https, no '{}'", url.scheme()));
            }
            TransportMode::Webhook { endpoint: webhook_endpoint(&url)? }
        } else {
            TransportMode::Polling
        };

        let port: u16 = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| anyhow!("PORT inválido: {raw}"))?,
            None => 10000,
        };
        let server_addr = var("SERVER_ADDR").unwrap_or_else(|| format!("0.0.0.0:{port}"));

        let telegram_api_url =
            var("TELEGRAM_API_URL").unwrap_or_else(|| "https://api.telegram.org".to_string());
        let poll_timeout =
            Duration::from_secs(parse_secs(var("POLL_TIMEOUT_SECS"), 30, "POLL_TIMEOUT_SECS")?);

        let docs_dir = PathBuf::from(var("DOCS_DIR").unwrap_or_else(|| "docs".to_string()));
        let catalog_path = var("CATALOG_PATH").map(PathBuf::from);

        let keep_alive_url = var("KEEP_ALIVE_URL")
            .map(|raw| Url::parse(&raw).map_err(|e| anyhow!("KEEP_ALIVE_URL inválida ({raw}): {e}")))
            .transpose()?;
        let keep_alive_interval = Duration::from_secs(parse_secs(
            var("KEEP_ALIVE_INTERVAL_SECS"),
            600,
            "KEEP_ALIVE_INTERVAL_SECS",
        )?);

        Ok(Self {
            bot_token: SecretString::new(bot_token),
            transport,
            webhook_secret: var("WEBHOOK_SECRET"),
            server_addr,
            telegram_api_url,
            poll_timeout,
            docs_dir,
            catalog_path,
            keep_alive_url,
            keep_alive_interval,
        })
    }
}

/// Añade `/webhook` a la URL base sin perder su ruta (`https://host/bot` → `https://host/bot/webhook`).
fn webhook_endpoint(base: &Url) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("webhook")
        .map_err(|e| anyhow!("WEBHOOK_URL no admite la ruta /webhook: {e}"))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "si" | "sí" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(raw: Option<String>, default: u64, key: &str) -> Result<u64> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) | Err(_) => Err(anyhow!(
                "{key} debe ser un número de segundos mayor que cero, no '{raw}'"
            )),
            Ok(secs) => Ok(secs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_polling() {
        let cfg = config(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(cfg.bot_token.expose_secret(), "123:abc");
        assert_eq!(cfg.transport, TransportMode::Polling);
        assert_eq!(cfg.server_addr, "0.0.0.0:10000");
        assert_eq!(cfg.poll_timeout, Duration::from_secs(30));
        assert_eq!(cfg.docs_dir, PathBuf::from("docs"));
        assert!(cfg.catalog_path.is_none());
        assert!(cfg.keep_alive_url.is_none());
        assert_eq!(cfg.keep_alive_interval, Duration::from_secs(600));
    }

    #[test]
    fn token_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("BOT_TOKEN", "   ")]).is_err());
    }

    #[test]
    fn webhook_mode_needs_https_url() {
        assert!(config(&[("BOT_TOKEN", "t"), ("USE_WEBHOOK", "true")]).is_err());
        assert!(config(&[
            ("BOT_TOKEN", "t"),
            ("USE_WEBHOOK", "1"),
            ("WEBHOOK_URL", "http://bot.example.com")
        ])
        .is_err());

        let cfg = config(&[
            ("BOT_TOKEN", "t"),
            ("USE_WEBHOOK", "Sí"),
            ("WEBHOOK_URL", "https://bot.example.com"),
            ("WEBHOOK_SECRET", "s3cr3t"),
        ])
        .unwrap();
        assert_eq!(cfg.transport.name(), "webhook");
        assert_eq!(cfg.webhook_secret.as_deref(), Some("s3cr3t"));
    }

    fn endpoint(base: &str) -> String {
        let cfg = config(&[("BOT_TOKEN", "t"), ("USE_WEBHOOK", "true"), ("WEBHOOK_URL", base)]).unwrap();
        match cfg.transport {
            TransportMode::Webhook { endpoint } => endpoint.to_string(),
            TransportMode::Polling => panic!("se esperaba modo webhook"),
        }
    }

    #[test]
    fn webhook_endpoint_keeps_base_path() {
        assert_eq!(endpoint("https://bot.example.com"), "https://bot.example.com/webhook");
        assert_eq!(endpoint("https://bot.example.com/"), "https://bot.example.com/webhook");
        assert_eq!(endpoint("https://host.example.com/bot"), "https://host.example.com/bot/webhook");
        assert_eq!(endpoint("https://host.example.com/bot/"), "https://host.example.com/bot/webhook");
    }

    #[test]
    fn rejects_invalid_flag_and_numbers() {
        assert!(config(&[("BOT_TOKEN", "t"), ("USE_WEBHOOK", "quizas")]).is_err());
        assert!(config(&[("BOT_TOKEN", "t"), ("PORT", "http")]).is_err());
        assert!(config(&[("BOT_TOKEN", "t"), ("POLL_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("BOT_TOKEN", "t"), ("KEEP_ALIVE_URL", "no es url")]).is_err());
    }

    #[test]
    fn port_and_addr_overrides() {
        let cfg = config(&[("BOT_TOKEN", "t"), ("PORT", "8080")]).unwrap();
        assert_eq!(cfg.server_addr, "0.0.0.0:8080");
        let cfg = config(&[("BOT_TOKEN", "t"), ("PORT", "8080"), ("SERVER_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(cfg.server_addr, "127.0.0.1:9000");
    }
}
