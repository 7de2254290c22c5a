use std::fmt;
use std::time::{Duration, Instant};

/// Opaque platform credential that authorizes one capture session.
///
/// `authorize` takes the token by value, so a token can only ever be spent once.
pub struct CaptureToken {
    grant: String,
    expires_at: Option<Instant>,
}

impl CaptureToken {
    pub fn new(grant: impl Into<String>) -> Self {
        Self {
            grant: grant.into(),
            expires_at: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = Instant::now().checked_add(ttl);
        self
    }

    pub fn with_expiry(mut self, expires_at: Instant) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn grant(&self) -> &str {
        &self.grant
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl fmt::Debug for CaptureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureToken")
            .field("grant", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_observed() {
        let past = Instant::now();
        let token = CaptureToken::new("grant").with_expiry(past);
        assert!(token.is_expired());
        let token = CaptureToken::new("grant").with_ttl(Duration::from_secs(60));
        assert!(!token.is_expired());
        assert!(!CaptureToken::new("grant").is_expired());
    }
}
