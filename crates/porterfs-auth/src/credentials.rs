//! Credential lookup for signature verification.

use crate::error::AuthError;

/// Resolves an access key ID to its secret key.
///
/// PorterFS is single-tenant with one static pair, but the verifier only
/// depends on this trait so the credential source stays swappable.
pub trait CredentialProvider: Send + Sync {
    /// Look up the secret key for `access_key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownAccessKey`] if the access key is not known.
    fn secret_key(&self, access_key_id: &str) -> Result<String, AuthError>;
}

/// The single static credential pair from the server configuration.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    access_key_id: String,
    secret_access_key: String,
}

impl StaticCredentials {
    /// Create a provider holding one access-key/secret pair.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        if access_key_id == self.access_key_id {
            Ok(self.secret_access_key.clone())
        } else {
            Err(AuthError::UnknownAccessKey(access_key_id.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_known_access_key() {
        let provider = StaticCredentials::new("AKID", "secret");
        assert_eq!(provider.secret_key("AKID").unwrap(), "secret");
    }

    #[test]
    fn test_should_reject_unknown_access_key() {
        let provider = StaticCredentials::new("AKID", "secret");
        assert!(matches!(
            provider.secret_key("OTHER"),
            Err(AuthError::UnknownAccessKey(_))
        ));
    }
}
