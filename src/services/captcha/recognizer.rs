//! Digit Recognition Backend
//!
//! The numeric model itself is an external collaborator; this module only
//! defines the seam and ships a backend that shells out to an OCR CLI.

use std::process::Command;

use image::GrayImage;

use crate::utils::error::{AppError, AppResult};

/// Recognition backend: preprocessed bitmap in, raw candidate text out.
///
/// Implementations must be deterministic for identical input pixels.
pub trait DigitRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> AppResult<String>;
}

/// Recognizer that invokes an external OCR program (tesseract by default)
/// on a scratch PNG, constrained to the digit character set in
/// single-word page segmentation mode.
pub struct CommandRecognizer {
    program: String,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DigitRecognizer for CommandRecognizer {
    fn recognize(&self, image: &GrayImage) -> AppResult<String> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("challenge.png");
        image
            .save(&input)
            .map_err(|e| AppError::recognition(format!("cannot write scratch image: {}", e)))?;

        let output = Command::new(&self.program)
            .arg(&input)
            .arg("stdout")
            .args(["--psm", "8", "-c", "tessedit_char_whitelist=0123456789"])
            .output()
            .map_err(|e| {
                AppError::recognition(format!("cannot run '{}': {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::recognition(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
