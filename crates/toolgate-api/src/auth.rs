//! Admin authentication: a shared key compared in constant time.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AdminAuth {
    key: Vec<u8>,
}

impl AdminAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().into_bytes(),
        }
    }

    /// Reads `TOOLGATE_ADMIN_KEY` from the environment. A missing or empty
    /// key disables admin routes entirely rather than falling back to an
    /// insecure default.
    pub fn from_env() -> Result<Self, ApiError> {
        let key = std::env::var("TOOLGATE_ADMIN_KEY").map_err(|_| {
            ApiError::Internal("TOOLGATE_ADMIN_KEY environment variable is required".to_string())
        })?;
        if key.len() < 16 {
            return Err(ApiError::Internal(
                "TOOLGATE_ADMIN_KEY must be at least 16 characters".to_string(),
            ));
        }
        Ok(Self::new(key))
    }

    /// Validates the `Authorization: Bearer <key>` header using a
    /// constant-time comparison, so response timing doesn't leak how many
    /// leading bytes of a guessed key were correct.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let presented = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".to_string()))?;

        let presented = presented.as_bytes();
        let matches =
            presented.len() == self.key.len() && presented.ct_eq(&self.key).unwrap_u8() == 1;

        if matches {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("invalid admin key".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_matching_key() {
        let auth = AdminAuth::new("supersecretadminkey");
        assert!(auth.check(&headers_with("supersecretadminkey")).is_ok());
    }

    #[test]
    fn rejects_wrong_key() {
        let auth = AdminAuth::new("supersecretadminkey");
        assert!(auth.check(&headers_with("wrongkey")).is_err());
    }

    #[test]
    fn rejects_missing_header() {
        let auth = AdminAuth::new("supersecretadminkey");
        assert!(auth.check(&HeaderMap::new()).is_err());
    }
}
