//! Credential loading.

use std::fmt;

use crate::domain::ConfigError;

/// Environment variable holding the GitHub token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Bearer token for the workflow API. `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from the environment.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if the variable is unset or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_value(std::env::var(TOKEN_ENV).ok())
    }

    fn from_value(value: Option<String>) -> Result<Self, ConfigError> {
        match value.map(|v| v.trim().to_string()) {
            Some(token) if !token.is_empty() => Ok(Self { token }),
            _ => Err(ConfigError::MissingCredential(TOKEN_ENV)),
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("token", &"***").finish()
    }
}
