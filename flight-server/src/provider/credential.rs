//! Credential supply.
//!
//! Storage and rotation live outside the service; the transport asks for
//! the current bearer token on every call.

use std::sync::Arc;

use parking_lot::RwLock;

use super::error::ProviderError;

/// Source of the current upstream bearer token.
pub trait CredentialSource: Send + Sync {
    fn current_credential(&self) -> Result<String, ProviderError>;
}

/// A token fixed at start-up, replaceable in place.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    token: Arc<RwLock<String>>,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token.into())),
        }
    }

    /// Swap in a rotated token.
    pub fn rotate(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }
}

impl CredentialSource for StaticCredential {
    fn current_credential(&self) -> Result<String, ProviderError> {
        let token = self.token.read();
        if token.is_empty() {
            return Err(ProviderError::Credential("empty token".to_string()));
        }
        Ok(token.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn current_credential(&self) -> Result<String, ProviderError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ProviderError::Credential(format!("{} is not set", self.var))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_credential_rotates() {
        let cred = StaticCredential::new("first");
        let shared = cred.clone();
        assert_eq!(cred.current_credential().unwrap(), "first");

        shared.rotate("second");
        assert_eq!(cred.current_credential().unwrap(), "second");
    }

    #[test]
    fn empty_token_is_an_error() {
        let cred = StaticCredential::new("");
        assert!(matches!(
            cred.current_credential(),
            Err(ProviderError::Credential(_))
        ));
    }

    #[test]
    fn missing_env_var_is_an_error() {
        let cred = EnvCredential::new("FLIGHT_SERVER_TEST_SURELY_UNSET_TOKEN");
        assert!(cred.current_credential().is_err());
    }
}
