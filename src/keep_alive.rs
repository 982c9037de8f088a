//! Auto-ping periódico para que el hosting no duerma el proceso por inactividad.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

const PING_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn run(url: Url, every: Duration) {
    let http = reqwest::Client::new();
    let mut ticker = tokio::time::interval(every);
    // el primer tick es inmediato y el servidor puede no estar escuchando todavía
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match http.get(url.clone()).timeout(PING_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Keep-alive OK ({})", response.status());
            }
            Ok(response) => warn!("Keep-alive respondió {} para {}", response.status(), url),
            Err(e) => warn!("Keep-alive falló para {}: {}", url, e),
        }
    }
}
