//! Portal Session Boundary
//!
//! Browser-automation seam for the consular lookup portal. The polling
//! state machine only sees these traits; the chromium-backed
//! implementation lives behind the `browser` feature flag.

use async_trait::async_trait;
use thiserror::Error;

use crate::utils::error::AppResult;

#[cfg(feature = "browser")]
pub mod chromium;

/// DOM element id of the challenge image.
pub const CAPTCHA_IMAGE: &str = "imagenCaptcha";
/// DOM element id of the service type selector.
pub const SERVICE_SELECT: &str = "infServicio";
/// Option value selecting the visa procedure.
pub const SERVICE_VISA_OPTION: &str = "VISADO";
/// DOM element id of the lookup key input.
pub const ACCOUNT_ID_FIELD: &str = "txIdentificador";
/// DOM element id of the birth year input.
pub const BIRTH_YEAR_FIELD: &str = "txtFechaNacimiento";
/// DOM element id of the challenge answer input.
pub const CAPTCHA_FIELD: &str = "imgcaptcha";
/// DOM element id of the form submit button.
pub const SUBMIT_BUTTON: &str = "imgVerSuTramite";
/// DOM element id of the result title field.
pub const STATUS_TITLE: &str = "ContentPlaceHolderConsulta_TituloEstado";
/// DOM element id of the result description field.
pub const STATUS_DESCRIPTION: &str = "ContentPlaceHolderConsulta_DescEstado";
/// DOM element id of the server's challenge-mismatch indicator.
pub const CAPTCHA_MISMATCH: &str = "CompararCaptcha";

/// Errors surfaced by a portal session.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Session-level failure; the underlying browser session is considered
    /// corrupted and must not be reused.
    #[error("transport failure: {0}")]
    Fatal(String),

    /// An element did not become ready within the bounded wait.
    #[error("timed out waiting for element '{0}'")]
    Timeout(String),

    /// An element is absent from the current page.
    #[error("element '{0}' not present")]
    MissingElement(String),
}

impl PortalError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// One live browser-automation handle against the portal.
///
/// Owned by exactly one worker for the duration of one account's polling
/// within a cycle; the owner must call [`PortalSession::close`] on every
/// exit path.
#[async_trait]
pub trait PortalSession: Send {
    /// Load the given page. Any failure here is session-level.
    async fn navigate(&mut self, url: &str) -> Result<(), PortalError>;

    /// Screenshot a single element, returned as encoded image bytes.
    async fn capture_element(&mut self, element_id: &str) -> Result<Vec<u8>, PortalError>;

    /// Select an option value on a `<select>` element.
    async fn select_option(&mut self, element_id: &str, value: &str) -> Result<(), PortalError>;

    /// Clear an input element and type a value into it.
    async fn set_field(&mut self, element_id: &str, value: &str) -> Result<(), PortalError>;

    /// Click an element.
    async fn click(&mut self, element_id: &str) -> Result<(), PortalError>;

    /// Read an element's visible text, waiting until it is non-empty or
    /// the bounded wait elapses.
    async fn read_text(&mut self, element_id: &str) -> Result<String, PortalError>;

    /// Release the underlying browser session.
    async fn close(&mut self);
}

/// Produces fresh portal sessions, one per worker execution.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self) -> AppResult<Box<dyn PortalSession>>;
}
