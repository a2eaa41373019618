//! Recognition service contract
//!
//! Resolves a staged meter image to a numeric reading. Failure is an
//! explicit sum type so logs and tests can tell causes apart; callers treat
//! every variant the same way (the submission fails, no retry).

use async_trait::async_trait;
use thiserror::Error;

use crate::services::image_codec::StagedImage;

/// Why a reading could not be resolved
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Could not read staged image: {0}")]
    Io(String),

    #[error("Recognition returned no answer")]
    EmptyAnswer,

    #[error("Recognition answer is not a number: {0:?}")]
    Unparseable(String),

    #[error("Recognition answer is not finite: {0}")]
    NonFinite(f64),
}

/// Image → reading oracle
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Identifier for logs (e.g. "gemini")
    fn name(&self) -> &'static str;

    /// Resolve the reading shown on a staged image
    async fn recognize(&self, image: &StagedImage) -> Result<f64, RecognitionError>;
}

/// Extract the first number from a free-text answer
///
/// Accepts answers like `"00123.45"`, `"Reading: 1,234.5 m³"` or `"98,7"`.
/// A lone comma is read as the decimal separator; with both present, commas
/// are thousands separators.
pub fn parse_reading(answer: &str) -> Result<f64, RecognitionError> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Err(RecognitionError::EmptyAnswer);
    }

    let start = trimmed
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| RecognitionError::Unparseable(trimmed.to_string()))?;

    let token: String = trimmed[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let token = token.trim_end_matches(['.', ',']);

    let normalized = if token.contains('.') {
        token.replace(',', "")
    } else if token.matches(',').count() == 1 {
        token.replace(',', ".")
    } else {
        token.replace(',', "")
    };

    let value: f64 = normalized
        .parse()
        .map_err(|_| RecognitionError::Unparseable(trimmed.to_string()))?;

    if !value.is_finite() {
        return Err(RecognitionError::NonFinite(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse_reading("123").unwrap(), 123.0);
        assert_eq!(parse_reading(" 00123.45\n").unwrap(), 123.45);
    }

    #[test]
    fn test_parse_number_inside_text() {
        assert_eq!(parse_reading("Reading: 1,234.5 m3").unwrap(), 1234.5);
        assert_eq!(parse_reading("The meter shows 4521.").unwrap(), 4521.0);
    }

    #[test]
    fn test_parse_decimal_comma() {
        assert_eq!(parse_reading("98,7").unwrap(), 98.7);
        assert_eq!(parse_reading("1,234,567").unwrap(), 1_234_567.0);
    }

    #[test]
    fn test_parse_empty_answer() {
        assert_eq!(parse_reading("  "), Err(RecognitionError::EmptyAnswer));
    }

    #[test]
    fn test_parse_no_digits() {
        assert!(matches!(
            parse_reading("I cannot read this meter"),
            Err(RecognitionError::Unparseable(_))
        ));
    }

    #[test]
    fn test_parse_malformed_number() {
        assert!(matches!(
            parse_reading("12.34.56"),
            Err(RecognitionError::Unparseable(_))
        ));
    }
}
