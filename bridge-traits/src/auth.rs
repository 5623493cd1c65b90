//! Access-token generation boundary.
//!
//! The catalog API authenticates every request with a short-lived access
//! token appended to the URL. Token derivation is a host concern; the core
//! only requires that a fresh token can be produced per request.

/// Generates an access token for one authenticated catalog request.
pub trait AccessTokenProvider: Send + Sync {
    /// Produce a token valid for a request issued now.
    fn generate_token(&self) -> String;
}

/// Provider returning a fixed token, for hosts whose token never rotates
/// and for tests.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AccessTokenProvider for StaticTokenProvider {
    fn generate_token(&self) -> String {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_configured_token() {
        let provider = StaticTokenProvider::new("tok-123");
        assert_eq!(provider.generate_token(), "tok-123");
        assert_eq!(provider.generate_token(), "tok-123");
    }
}
