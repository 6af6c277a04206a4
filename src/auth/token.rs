//! Token verification.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::auth::{AuthError, Principal};
use crate::config::TokenConfig;

/// Resolves a raw token into the principal it was issued to.
///
/// Signed-token implementations (JWT and friends) plug in here.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

#[derive(Debug, Clone)]
struct Entry {
    principal: Principal,
    is_active: bool,
}

/// Verifier backed by a fixed table of tokens from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Entry>,
}

impl StaticTokenVerifier {
    pub fn from_config(tokens: &[TokenConfig]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                let entry = Entry {
                    principal: Principal {
                        user_id: t.user_id.clone(),
                        email: t.email.clone(),
                    },
                    is_active: t.is_active,
                };
                (t.token.clone(), entry)
            })
            .collect();
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(
            token.into(),
            Entry {
                principal,
                is_active: true,
            },
        );
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let entry = self.tokens.get(token).ok_or(AuthError::InvalidToken)?;
        if !entry.is_active {
            tracing::info!(user_id = %entry.principal.user_id, "Rejected token for disabled account");
            return Err(AuthError::Disabled);
        }
        Ok(entry.principal.clone())
    }
}
