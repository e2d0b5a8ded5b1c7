//! Chromium Portal Session
//!
//! chromiumoxide-backed implementation of [`PortalSession`]. CDP-native
//! headless Chrome; one browser process per session, released on close.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::utils::error::{AppError, AppResult};

use super::{PortalError, PortalSession, SessionFactory};

/// How often the element wait loop re-queries the DOM.
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Factory launching one headless Chrome per session.
pub struct ChromiumSessionFactory {
    element_timeout: Duration,
}

impl ChromiumSessionFactory {
    pub fn new(element_timeout: Duration) -> Self {
        Self { element_timeout }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn create_session(&self) -> AppResult<Box<dyn PortalSession>> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--force-device-scale-factor=2")
            .build()
            .map_err(AppError::internal)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::internal(format!("cannot launch browser: {}", e)))?;

        // The handler stream must be driven for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::internal(format!("cannot open page: {}", e)))?;

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            element_timeout: self.element_timeout,
        }))
    }
}

/// One live chromium session.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    element_timeout: Duration,
}

impl ChromiumSession {
    /// Wait for an element by id within the bounded element timeout.
    async fn wait_for_element(&self, element_id: &str) -> Result<Element, PortalError> {
        let selector = format!("#{}", element_id);
        let deadline = tokio::time::Instant::now() + self.element_timeout;

        loop {
            match self.page.find_element(selector.as_str()).await {
                Ok(element) => return Ok(element),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
                }
                Err(_) => return Err(PortalError::Timeout(element_id.to_string())),
            }
        }
    }

    async fn evaluate(&self, script: String, element_id: &str) -> Result<(), PortalError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        // A script that ran but found nothing leaves the element missing.
        self.page
            .find_element(format!("#{}", element_id))
            .await
            .map_err(|_| PortalError::MissingElement(element_id.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PortalSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), PortalError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn capture_element(&mut self, element_id: &str) -> Result<Vec<u8>, PortalError> {
        let element = self.wait_for_element(element_id).await?;
        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))
    }

    async fn select_option(&mut self, element_id: &str, value: &str) -> Result<(), PortalError> {
        self.wait_for_element(element_id).await?;
        let script = format!(
            "(() => {{
                const el = document.getElementById('{id}');
                if (!el) return false;
                el.value = '{value}';
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()",
            id = element_id,
            value = value
        );
        self.evaluate(script, element_id).await
    }

    async fn set_field(&mut self, element_id: &str, value: &str) -> Result<(), PortalError> {
        let element = self.wait_for_element(element_id).await?;
        let clear = format!(
            "(() => {{ const el = document.getElementById('{id}'); if (el) el.value = ''; }})()",
            id = element_id
        );
        self.page
            .evaluate(clear)
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        element
            .type_str(value)
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn click(&mut self, element_id: &str) -> Result<(), PortalError> {
        let element = self.wait_for_element(element_id).await?;
        element
            .click()
            .await
            .map_err(|e| PortalError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn read_text(&mut self, element_id: &str) -> Result<String, PortalError> {
        let deadline = tokio::time::Instant::now() + self.element_timeout;

        loop {
            let element = self.wait_for_element(element_id).await?;
            let text = element
                .inner_text()
                .await
                .map_err(|e| PortalError::Fatal(e.to_string()))?
                .unwrap_or_default();

            if !text.trim().is_empty() {
                return Ok(text);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PortalError::Timeout(element_id.to_string()));
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("error closing browser: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
