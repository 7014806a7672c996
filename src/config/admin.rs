use anyhow::{anyhow, Result};
use std::env;

/// How the configured admin secret is stored.
#[derive(Clone, PartialEq, Eq)]
pub enum AdminSecret {
    /// `ADMIN_PASSWORD`: plaintext, compared in constant time.
    Plain(String),
    /// `ADMIN_PASSWORD_HASH`: bcrypt hash.
    BcryptHash(String),
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminSecret::Plain(_) => f.write_str("Plain(<redacted>)"),
            AdminSecret::BcryptHash(_) => f.write_str("BcryptHash(<redacted>)"),
        }
    }
}

/// The single shared administrator credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub username: String,
    pub secret: AdminSecret,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = lookup("ADMIN_USER")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("ADMIN_USER environment variable must be set"))?;

        // Basic auth splits on the first ':'.
        if username.contains(':') {
            return Err(anyhow!("ADMIN_USER must not contain ':'"));
        }

        let hash = lookup("ADMIN_PASSWORD_HASH").filter(|h| !h.trim().is_empty());
        let plain = lookup("ADMIN_PASSWORD").filter(|p| !p.is_empty());

        let secret = match (hash, plain) {
            (Some(hash), plain) => {
                if plain.is_some() {
                    tracing::warn!("Both ADMIN_PASSWORD_HASH and ADMIN_PASSWORD set, using the hash");
                }
                AdminSecret::BcryptHash(hash.trim().to_string())
            }
            (None, Some(plain)) => AdminSecret::Plain(plain),
            (None, None) => {
                return Err(anyhow!(
                    "ADMIN_PASSWORD or ADMIN_PASSWORD_HASH environment variable must be set"
                ))
            }
        };

        Ok(Self { username, secret })
    }
}
