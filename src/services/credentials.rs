use crate::config::admin::{AdminConfig, AdminSecret};
use crate::utils::{secret_tag, tag_matches, verify_password};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Roles an authenticated identity can hold. Only one exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
}

/// An authenticated moderator, inserted into request extensions by
/// [`crate::middleware::admin::admin_auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser {
    pub username: String,
    pub role: Role,
}

/// Maps a presented identity and secret to an [`AdminUser`].
pub trait CredentialStore: Send + Sync {
    fn authenticate(&self, username: &str, secret: &str) -> Option<AdminUser>;
}

pub type SharedCredentialStore = Arc<dyn CredentialStore>;

enum SecretCheck {
    Tag(Vec<u8>),
    Bcrypt(String),
}

/// The single configured administrator.
pub struct StaticCredentialStore {
    username: String,
    username_tag: Vec<u8>,
    secret: SecretCheck,
}

impl StaticCredentialStore {
    pub fn new(config: &AdminConfig) -> anyhow::Result<Self> {
        let secret = match &config.secret {
            AdminSecret::Plain(plain) => SecretCheck::Tag(secret_tag(plain)?),
            AdminSecret::BcryptHash(hash) => SecretCheck::Bcrypt(hash.clone()),
        };

        Ok(Self {
            username: config.username.clone(),
            username_tag: secret_tag(&config.username)?,
            secret,
        })
    }

    pub fn shared(config: &AdminConfig) -> anyhow::Result<SharedCredentialStore> {
        Ok(Arc::new(Self::new(config)?))
    }
}

impl CredentialStore for StaticCredentialStore {
    fn authenticate(&self, username: &str, secret: &str) -> Option<AdminUser> {
        // Evaluate both halves so a wrong username costs the same as a wrong secret.
        let user_ok = tag_matches(username, &self.username_tag);
        let secret_ok = match &self.secret {
            SecretCheck::Tag(tag) => tag_matches(secret, tag),
            SecretCheck::Bcrypt(hash) => match verify_password(secret, hash) {
                Ok(ok) => ok,
                Err(e) => {
                    tracing::error!("Admin password hash check failed: {:?}", e);
                    false
                }
            },
        };

        (user_ok && secret_ok).then(|| AdminUser {
            username: self.username.clone(),
            role: Role::Administrator,
        })
    }
}
