use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Longest identifier accepted for either half of a competition key.
const MAX_ID_LENGTH: usize = 64;

/// External identity of a competition: the upstream content type plus the
/// competition id within it. Used as the Sync Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitionKey {
    pub content_type: String,
    pub competition_id: String,
}

impl CompetitionKey {
    pub fn new(content_type: &str, competition_id: &str) -> Result<Self, ApiError> {
        Self::validate_part("content type", content_type)?;
        Self::validate_part("competition id", competition_id)?;
        Ok(Self {
            content_type: content_type.to_string(),
            competition_id: competition_id.to_string(),
        })
    }

    fn validate_part(label: &str, value: &str) -> Result<(), ApiError> {
        if value.is_empty() {
            return Err(ApiError::Validation(format!("{} must not be empty", label)));
        }
        if value.len() > MAX_ID_LENGTH {
            return Err(ApiError::Validation(format!(
                "{} longer than {} characters",
                label, MAX_ID_LENGTH
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ApiError::Validation(format!(
                "{} contains invalid characters: {}",
                label, value
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CompetitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.content_type, self.competition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key() {
        let key = CompetitionKey::new("ipsc", "abc-123_x").unwrap();
        assert_eq!(key.to_string(), "ipsc/abc-123_x");
    }

    #[test]
    fn test_rejects_empty_and_bad_chars() {
        assert!(matches!(
            CompetitionKey::new("", "1"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            CompetitionKey::new("ipsc", "../etc"),
            Err(ApiError::Validation(_))
        ));
        assert!(CompetitionKey::new("ipsc", &"9".repeat(65)).is_err());
    }
}
