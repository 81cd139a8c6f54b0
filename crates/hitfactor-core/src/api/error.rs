use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Upstream fetch failed{}: {message}", status_suffix(.status))]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Upstream request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Unexpected upstream data: {0}")]
    Data(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => ApiError::RateLimited,
            code => ApiError::Fetch {
                status: Some(code),
                message: Self::truncate_body(body),
            },
        }
    }

    /// Upstream status code, when the failure came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Fetch { status, .. } => *status,
            ApiError::RateLimited => Some(429),
            _ => None,
        }
    }

    /// True for every failure that happened talking to the upstream provider.
    /// Timeouts count as fetch failures.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Fetch { .. } | ApiError::Timeout(_) | ApiError::RateLimited
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }

    /// Whether a caller may reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::RateLimited => true,
            ApiError::Fetch { status: None, .. } => true,
            ApiError::Fetch { status: Some(code), .. } => *code >= 500,
            ApiError::Validation(_) | ApiError::Data(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::Data(err.to_string())
        } else {
            ApiError::Fetch {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_rate_limit() {
        let err = ApiError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err, ApiError::RateLimited);
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_from_status_carries_code() {
        let err = ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY, "oops");
        assert_eq!(err.status(), Some(502));
        assert!(err.is_fetch_failure());
        assert!(err.is_retryable());

        let err = ApiError::from_status(reqwest::StatusCode::NOT_FOUND, "missing");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("status 404"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let err = ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &long);
        match err {
            ApiError::Fetch { message, .. } => {
                assert!(message.contains("truncated, 600 total bytes"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_timeout_is_fetch_failure() {
        let err = ApiError::Timeout("deadline".to_string());
        assert!(err.is_timeout());
        assert!(err.is_fetch_failure());
        assert!(err.is_retryable());
        assert!(!ApiError::Validation("bad".into()).is_fetch_failure());
        assert!(!ApiError::Data("bad".into()).is_retryable());
    }
}
