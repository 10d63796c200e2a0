//! Username/password authentication against the credential store.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use turnstile_auth::{CredentialStore, Principal, StoreError};

use crate::PasswordEncoder;

#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// Unknown user, user without roles, or wrong password. Not further
    /// distinguished so responses do not reveal which usernames exist.
    #[error("bad credentials")]
    BadCredentials,

    #[error("account disabled")]
    Disabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { store, encoder }
    }

    /// Resolve a principal: load the user and its roles, reject disabled
    /// accounts, then verify the password.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Principal, AuthenticationError> {
        let Some(credentials) = self.store.find_user(username).await? else {
            debug!("unknown username");
            return Err(AuthenticationError::BadCredentials);
        };

        let roles = self.store.find_roles(username).await?;
        if roles.is_empty() {
            debug!("user has no roles");
            return Err(AuthenticationError::BadCredentials);
        }
        if let Some(unknown) = roles.iter().find(|r| !r.is_catalogued()) {
            warn!(role = %unknown, "credential store returned a role no rule refers to");
        }

        if !credentials.enabled {
            return Err(AuthenticationError::Disabled);
        }
        if !self.encoder.matches(password, &credentials.password_hash) {
            debug!("password mismatch");
            return Err(AuthenticationError::BadCredentials);
        }

        Ok(Principal::new(credentials.username, roles))
    }
}
