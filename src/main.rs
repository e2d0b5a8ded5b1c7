//! Portal Sentinel - Daemon Entry Point

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use portal_sentinel::services::captcha::CommandRecognizer;
use portal_sentinel::services::notify::{NotificationDispatcher, WebhookNotifier};
use portal_sentinel::services::portal::SessionFactory;
use portal_sentinel::services::MonitorService;
use portal_sentinel::storage::{ConfigService, Database};
use portal_sentinel::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portal_sentinel=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));

    let config_service = ConfigService::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let config = Arc::new(config_service.get_config().clone());

    let db =
        Database::new(Path::new(&config.database_path)).context("opening state database")?;

    let notifier = build_notifier(&config)?;
    let sessions = build_session_factory(&config)?;
    let recognizer = Arc::new(CommandRecognizer::new(
        config.recognition.ocr_command.clone(),
    ));

    let shutdown = CancellationToken::new();
    let monitor = MonitorService::new(
        Arc::clone(&config),
        db,
        sessions,
        notifier,
        recognizer,
        shutdown.clone(),
    );

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    let monitor_task = tokio::spawn(async move { monitor.run().await });

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    tracing::info!("interrupt received, shutting down");
    shutdown.cancel();

    match tokio::time::timeout(grace, monitor_task).await {
        Ok(joined) => joined.context("monitor task panicked")??,
        Err(_) => {
            tracing::warn!(
                grace_secs = config.shutdown_grace_secs,
                "workers did not finish within the grace period, exiting anyway"
            );
        }
    }

    Ok(())
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn NotificationDispatcher>> {
    match config.notifications.webhook_url.as_deref() {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url))),
        None => bail!("notifications.webhook_url must be set"),
    }
}

#[cfg(feature = "browser")]
fn build_session_factory(config: &AppConfig) -> Result<Arc<dyn SessionFactory>> {
    use portal_sentinel::services::portal::chromium::ChromiumSessionFactory;
    Ok(Arc::new(ChromiumSessionFactory::new(Duration::from_secs(
        config.element_timeout_secs,
    ))))
}

#[cfg(not(feature = "browser"))]
fn build_session_factory(_config: &AppConfig) -> Result<Arc<dyn SessionFactory>> {
    bail!("built without the 'browser' feature, no portal session backend available")
}
