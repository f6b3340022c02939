// src/security/auth.rs — Operator credential verification

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::infra::config::AdminUser;
use crate::security::cookies;
use crate::slack::signature::constant_time_eq;

/// An authenticated dashboard operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

impl Identity {
    /// Email if known, otherwise the uid.
    pub fn display(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.uid)
    }
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// One-time setup. Safe to call again; later calls are no-ops.
    /// An error here must abort boot.
    async fn initialize(&self) -> anyhow::Result<()>;

    /// Resolve a presented token to an identity.
    async fn verify(&self, token: &str) -> Option<Identity>;

    /// Whether `uid` is a known, enabled operator.
    async fn identity_exists(&self, uid: &str) -> bool;
}

/// Operators declared in `[[admin.users]]`, matched by token digest.
pub struct StaticCredentialVerifier {
    users: Vec<AdminUser>,
    /// token digest (lowercase hex) → index into `users`
    index: OnceLock<HashMap<String, usize>>,
}

impl StaticCredentialVerifier {
    pub fn new(users: Vec<AdminUser>) -> Self {
        Self {
            users,
            index: OnceLock::new(),
        }
    }

    fn build_index(&self) -> anyhow::Result<HashMap<String, usize>> {
        if self.users.is_empty() {
            anyhow::bail!("no dashboard operators configured ([[admin.users]] is empty)");
        }
        let mut index = HashMap::with_capacity(self.users.len());
        for (i, user) in self.users.iter().enumerate() {
            let digest = user.token_sha256.trim().to_ascii_lowercase();
            if digest.len() != 64 || hex::decode(&digest).is_err() {
                anyhow::bail!("operator {} has a malformed token_sha256", user.uid);
            }
            if index.insert(digest, i).is_some() {
                anyhow::bail!("operator {} shares a token with another operator", user.uid);
            }
        }
        Ok(index)
    }
}

/// Lowercase hex SHA-256 of a token, as stored in `token_sha256`.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn initialize(&self) -> anyhow::Result<()> {
        if self.index.get().is_some() {
            tracing::info!("Credential verifier already initialized");
            return Ok(());
        }
        let index = self.build_index()?;
        let count = index.len();
        // a concurrent initialize may have won; either index is identical
        let _ = self.index.set(index);
        tracing::info!(operators = count, "Credential verifier initialized");
        Ok(())
    }

    async fn verify(&self, token: &str) -> Option<Identity> {
        if token.is_empty() {
            tracing::warn!("Empty token presented");
            return None;
        }
        let Some(index) = self.index.get() else {
            tracing::warn!("Token presented before the verifier was initialized");
            return None;
        };

        let digest = token_digest(token);
        // compare against every entry so timing does not reveal a prefix match
        let mut found = None;
        for (stored, &i) in index {
            if constant_time_eq(stored.as_bytes(), digest.as_bytes()) {
                found = Some(i);
            }
        }

        let user = &self.users[found?];
        tracing::info!(uid = %user.uid, "Token verified");
        Some(Identity {
            uid: user.uid.clone(),
            email: user.email.clone(),
        })
    }

    async fn identity_exists(&self, uid: &str) -> bool {
        match self.users.iter().find(|u| u.uid == uid) {
            Some(user) if user.disabled => {
                tracing::warn!(uid, "User is disabled");
                false
            }
            Some(_) => true,
            None => {
                tracing::warn!(uid, "User not found");
                false
            }
        }
    }
}

/// Token from the auth cookie, else from `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookies::read_cookie(headers, cookies::AUTH_COOKIE) {
        if !token.is_empty() {
            return Some(token);
        }
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Verify the request's token and that its owner is still an operator.
pub async fn current_user(
    verifier: &dyn CredentialVerifier,
    headers: &HeaderMap,
) -> Option<Identity> {
    let token = extract_token(headers)?;
    let identity = verifier.verify(&token).await?;
    if !verifier.identity_exists(&identity.uid).await {
        tracing::warn!(
            user = identity.display(),
            "Valid token but user not registered or disabled"
        );
        return None;
    }
    Some(identity)
}
