//! Challenge Resolver
//!
//! Combines the preprocessing pipeline with a recognition backend and
//! validates the candidate against the expected digit width. Pure with
//! respect to the image: no retries, no portal I/O. Retrying a failed
//! recognition is the polling state machine's responsibility.

use std::sync::Arc;

use crate::models::settings::RecognitionTuning;
use crate::utils::error::AppResult;

use super::preprocess::preprocess;
use super::recognizer::DigitRecognizer;

/// Outcome of resolving one challenge image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Digit-only candidate; empty when invalid.
    pub candidate: String,
    /// True iff the digit-stripped candidate has exactly the expected width.
    pub valid: bool,
}

/// Resolves challenge images into digit candidates.
pub struct ChallengeResolver {
    recognizer: Arc<dyn DigitRecognizer>,
    tuning: RecognitionTuning,
}

impl ChallengeResolver {
    pub fn new(recognizer: Arc<dyn DigitRecognizer>, tuning: RecognitionTuning) -> Self {
        Self { recognizer, tuning }
    }

    /// Resolve raw challenge bytes into a validated digit candidate.
    ///
    /// Non-digit characters in the recognizer output are stripped before
    /// validation. A candidate of the wrong width is discarded entirely;
    /// there is no partial or fuzzy acceptance.
    pub fn resolve(&self, image_bytes: &[u8]) -> AppResult<RecognitionResult> {
        let processed = preprocess(image_bytes, &self.tuning)?;
        let raw = self.recognizer.recognize(&processed)?;
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.len() == self.tuning.expected_digits {
            Ok(RecognitionResult {
                candidate: digits,
                valid: true,
            })
        } else {
            tracing::debug!(
                raw = %raw,
                stripped_len = digits.len(),
                expected = self.tuning.expected_digits,
                "discarding challenge candidate of unexpected width"
            );
            Ok(RecognitionResult {
                candidate: String::new(),
                valid: false,
            })
        }
    }
}
