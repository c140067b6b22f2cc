use std::fmt;

use async_trait::async_trait;
use uptree_model::{MemberCode, Rank};

/// Error type of the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// An account with the same email already exists.
    #[error("account already exists")]
    AlreadyExists,
    /// No such account.
    #[error("account not found")]
    NotFound,
    /// The provider is unreachable or failed unexpectedly.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Opaque account id assigned by the identity provider. Doubles as the
/// member id of the corresponding member document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fresh session credential.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a new session token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Claims attached to a provider account after signup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CustomClaims {
    /// The member's unique code.
    pub member_code: MemberCode,
    /// The member's current rank.
    pub rank: Rank,
}

/// The identity provider consumed by the engine.
///
/// Account creation and deletion must be usable as a
/// create/compensate pair: a deleted account id is free to recreate.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account, returning its id.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<AccountId, ProviderError>;

    /// Delete an account. Used as compensation when member creation
    /// fails after the account exists.
    async fn delete_account(&self, id: &AccountId) -> Result<(), ProviderError>;

    /// Look up an account by email.
    async fn account_by_email(&self, email: &str) -> Result<Option<AccountId>, ProviderError>;

    /// Issue a fresh session token for the account.
    async fn issue_session_token(&self, id: &AccountId) -> Result<SessionToken, ProviderError>;

    /// Attach custom claims to the account.
    async fn set_custom_claims(
        &self,
        id: &AccountId,
        claims: CustomClaims,
    ) -> Result<(), ProviderError>;
}
