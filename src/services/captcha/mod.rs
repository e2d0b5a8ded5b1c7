//! Challenge Resolution
//!
//! Image preprocessing, digit recognition and candidate validation for the
//! portal's numeric challenge.

pub mod preprocess;
pub mod recognizer;
pub mod resolver;

pub use recognizer::{CommandRecognizer, DigitRecognizer};
pub use resolver::{ChallengeResolver, RecognitionResult};
