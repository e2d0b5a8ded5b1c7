//! Shared test doubles for the integration suite.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use portal_sentinel::services::captcha::DigitRecognizer;
use portal_sentinel::services::notify::{NotificationDispatcher, NotifyError};
use portal_sentinel::services::portal::{
    PortalError, PortalSession, SessionFactory, CAPTCHA_MISMATCH, STATUS_DESCRIPTION, STATUS_TITLE,
};
use portal_sentinel::{Account, AppConfig, AppError, AppResult};

/// Small valid PNG the preprocessing pipeline can decode.
pub fn sample_png() -> Vec<u8> {
    let image = GrayImage::from_fn(12, 6, |x, _| {
        if x % 2 == 0 {
            Luma([220])
        } else {
            Luma([30])
        }
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Recognizer that always reads the same digits.
pub struct FixedRecognizer(pub &'static str);

impl DigitRecognizer for FixedRecognizer {
    fn recognize(&self, _image: &GrayImage) -> AppResult<String> {
        Ok(self.0.to_string())
    }
}

/// Portal that rejects the submitted challenge a fixed number of times
/// before rendering the configured status. The rejection budget is shared
/// across sessions from the same factory, so retries within one polling
/// run drain it.
pub struct ScriptedPortal {
    title: String,
    description: String,
    rejections_left: Arc<AtomicUsize>,
    reject_current: bool,
}

#[async_trait]
impl PortalSession for ScriptedPortal {
    async fn navigate(&mut self, _url: &str) -> Result<(), PortalError> {
        Ok(())
    }

    async fn capture_element(&mut self, _element_id: &str) -> Result<Vec<u8>, PortalError> {
        Ok(sample_png())
    }

    async fn select_option(&mut self, _: &str, _: &str) -> Result<(), PortalError> {
        Ok(())
    }

    async fn set_field(&mut self, _: &str, _: &str) -> Result<(), PortalError> {
        Ok(())
    }

    async fn click(&mut self, _: &str) -> Result<(), PortalError> {
        // Submission decides whether this attempt gets rejected.
        self.reject_current = self
            .rejections_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(())
    }

    async fn read_text(&mut self, element_id: &str) -> Result<String, PortalError> {
        if self.reject_current {
            return match element_id {
                CAPTCHA_MISMATCH => Ok("El código introducido no es correcto".to_string()),
                _ => Err(PortalError::Timeout(element_id.to_string())),
            };
        }
        match element_id {
            STATUS_TITLE => Ok(self.title.clone()),
            STATUS_DESCRIPTION => Ok(self.description.clone()),
            _ => Err(PortalError::Timeout(element_id.to_string())),
        }
    }

    async fn close(&mut self) {}
}

pub struct ScriptedFactory {
    pub title: String,
    pub description: String,
    pub rejections: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(title: &str, description: &str, rejections: usize) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            rejections: Arc::new(AtomicUsize::new(rejections)),
        }
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn create_session(&self) -> AppResult<Box<dyn PortalSession>> {
        Ok(Box::new(ScriptedPortal {
            title: self.title.clone(),
            description: self.description.clone(),
            rejections_left: Arc::clone(&self.rejections),
            reject_current: false,
        }))
    }
}

/// Factory that cannot produce sessions at all.
pub struct BrokenFactory;

#[async_trait]
impl SessionFactory for BrokenFactory {
    async fn create_session(&self) -> AppResult<Box<dyn PortalSession>> {
        Err(AppError::internal("browser backend unavailable"))
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub address: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// Notifier capturing every delivered message.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentMessage {
            address: address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            is_html,
        });
        Ok(())
    }
}

pub fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        display_name: Some(format!("Holder {}", id)),
        birth_year: "1990".to_string(),
        notify_address: None,
    }
}

/// Minimal valid configuration with instant backoff, suitable for tests.
pub fn test_config(accounts: Vec<Account>) -> Arc<AppConfig> {
    let mut config: AppConfig =
        serde_json::from_value(serde_json::json!({ "accounts": [] })).unwrap();
    config.accounts = accounts;
    config.max_attempts = 5;
    config.backoff.unit_ms = 0;
    config.notifications.default_address = Some("alerts@example.com".to_string());
    config.notifications.summary_address = Some("summary@example.com".to_string());
    config.validate().unwrap();
    Arc::new(config)
}
