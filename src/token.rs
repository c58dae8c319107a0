//! Credential source (spec §6: "The core itself consumes only a token
//! provider"). Config file format, OAuth flow, and credential storage are
//! external collaborators and out of scope for this crate.

use crate::error::{Error, Result};

/// Supplies the bearer token the concrete [`crate::BlobStore`]
/// implementation authenticates with.
pub trait TokenProvider {
    fn token(&self) -> Result<String>;
}

/// Reads a token from a single environment variable.
///
/// This is a reference implementation, not the credential system: a real
/// deployment would plug in OAuth-backed storage here instead.
pub struct EnvTokenProvider {
    var_name: String,
}

impl EnvTokenProvider {
    pub const DEFAULT_VAR: &'static str = "GIT_REMOTE_DROPBOX_TOKEN";

    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl TokenProvider for EnvTokenProvider {
    fn token(&self) -> Result<String> {
        std::env::var(&self.var_name).map_err(|_| Error::NoToken)
    }
}

/// Always returns the same token. Used when the URL embeds an inline token
/// (`dropbox://:<token>@/path`), which takes precedence over the
/// environment provider.
pub struct FixedTokenProvider(String);

impl FixedTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for FixedTokenProvider {
    fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Resolve a token, preferring one embedded in the URL over the given
/// fallback provider.
pub fn resolve(inline_token: Option<&str>, fallback: &dyn TokenProvider) -> Result<String> {
    match inline_token {
        Some(tok) => Ok(tok.to_string()),
        None => fallback.token(),
    }
}
