//! API key authentication.

use crate::error::{GatewayError, GatewayResult};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Checks caller keys against the configured service key.
///
/// Only the SHA-256 digest of the secret is kept. Digests are compared in
/// constant time, so timing does not depend on how many bytes match.
#[derive(Clone)]
pub struct KeyAuthenticator {
    secret_digest: [u8; 32],
}

impl KeyAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            secret_digest: digest(secret),
        }
    }

    /// Authenticate a supplied key. An absent or empty key never matches.
    pub fn authenticate(&self, supplied: Option<&str>) -> GatewayResult<()> {
        let key = match supplied {
            Some(key) if !key.is_empty() => key,
            _ => {
                debug!("Request without API key");
                return Err(GatewayError::MissingApiKey);
            }
        };

        let supplied_digest = digest(key);
        if bool::from(supplied_digest[..].ct_eq(&self.secret_digest[..])) {
            Ok(())
        } else {
            warn!("API key rejected");
            Err(GatewayError::InvalidApiKey)
        }
    }
}

impl std::fmt::Debug for KeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyAuthenticator").finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Short, non-reversible tag for a caller identity, safe to log.
pub fn fingerprint(value: &str) -> String {
    digest(value)[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_key() {
        let auth = KeyAuthenticator::new("service-secret");
        assert!(auth.authenticate(Some("service-secret")).is_ok());
    }

    #[test]
    fn test_wrong_key() {
        let auth = KeyAuthenticator::new("service-secret");
        assert_eq!(
            auth.authenticate(Some("service-secreT")),
            Err(GatewayError::InvalidApiKey)
        );
        assert_eq!(
            auth.authenticate(Some("service-secret ")),
            Err(GatewayError::InvalidApiKey)
        );
        assert_eq!(
            auth.authenticate(Some("x")),
            Err(GatewayError::InvalidApiKey)
        );
    }

    #[test]
    fn test_missing_key() {
        let auth = KeyAuthenticator::new("service-secret");
        assert_eq!(auth.authenticate(None), Err(GatewayError::MissingApiKey));
        assert_eq!(auth.authenticate(Some("")), Err(GatewayError::MissingApiKey));
    }

    #[test]
    fn test_debug_hides_digest() {
        let auth = KeyAuthenticator::new("service-secret");
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("secret_digest"));
    }

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let tag = fingerprint("service-secret");
        assert_eq!(tag.len(), 8);
        assert_eq!(tag, fingerprint("service-secret"));
        assert_ne!(tag, fingerprint("other"));
        assert!(!tag.contains("secret"));
    }
}
