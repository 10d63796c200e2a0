//! Credential store contract.
//!
//! The gateway reads two things from storage: a user's password hash and
//! enabled flag, and a user's roles. The demo provisioning path additionally
//! needs to create organizations and users. Implementations live in infra.

use async_trait::async_trait;
use thiserror::Error;

use turnstile_core::{OrganizationId, UserId};

use crate::Role;

/// Result of the username/password/enabled lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub username: String,
    /// Encoded password (PHC string). May be empty for accounts created
    /// without a password; such accounts never verify.
    pub password_hash: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub name: String,
    pub description: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub organization_id: OrganizationId,
    pub username: String,
    /// Already-encoded password, stored as given.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Uniqueness on username was violated (e.g. a concurrent insert won).
    #[error("username already exists: {0}")]
    UsernameTaken(String),

    #[error("organization already exists: {0}")]
    OrganizationExists(String),

    #[error("unknown organization: {0}")]
    UnknownOrganization(OrganizationId),

    #[error("credential store failure: {0}")]
    Backend(String),
}

/// The two read queries authentication depends on.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<UserCredentials>, StoreError>;
    async fn find_roles(&self, username: &str) -> Result<Vec<Role>, StoreError>;
}

/// Writes used by demo provisioning.
#[async_trait]
pub trait UserManager: Send + Sync {
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;
    /// Fails with [`StoreError::OrganizationExists`] when the name is taken.
    async fn create_organization(&self, organization: NewOrganization) -> Result<OrganizationId, StoreError>;
    async fn find_organization(&self, name: &str) -> Result<Option<OrganizationId>, StoreError>;
    /// Fails with [`StoreError::UsernameTaken`] when the username exists.
    async fn insert_user(&self, user: NewUser) -> Result<UserId, StoreError>;
}
