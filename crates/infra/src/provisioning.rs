//! Demo-mode account provisioning.
//!
//! Before a login attempt is authenticated, an unknown username gets an
//! organization named after it and an OWNER account in that organization.
//! The account's stored password is the empty string, so it cannot be used
//! to log in until a password is set through another path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use turnstile_auth::{NewOrganization, NewUser, Role, StoreError, UserManager};
use turnstile_core::{OrganizationId, UserId};

pub const DEMO_ORGANIZATION_DESCRIPTION: &str = "Demo organization";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRecord {
    pub username: String,
    pub organization_id: OrganizationId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// The username was already known; nothing was written.
    AlreadyExists,
    Provisioned(ProvisioningRecord),
    /// A concurrent request created the account first; proceed as if it
    /// already existed.
    LostRace,
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct DemoProvisioner {
    users: Arc<dyn UserManager>,
}

impl DemoProvisioner {
    pub fn new(users: Arc<dyn UserManager>) -> Self {
        Self { users }
    }

    /// Idempotent: an existing username is a plain lookup.
    #[instrument(skip(self))]
    pub async fn ensure_account(&self, username: &str) -> Result<ProvisioningOutcome, ProvisioningError> {
        if self.users.username_exists(username).await? {
            return Ok(ProvisioningOutcome::AlreadyExists);
        }

        let organization = NewOrganization {
            name: username.to_string(),
            description: DEMO_ORGANIZATION_DESCRIPTION.to_string(),
            email: username.to_string(),
        };
        let organization_id = match self.users.create_organization(organization).await {
            Ok(id) => id,
            Err(StoreError::OrganizationExists(name)) => {
                if self.users.username_exists(username).await? {
                    debug!("account created concurrently");
                    return Ok(ProvisioningOutcome::LostRace);
                }
                // Left behind by an earlier attempt whose user insert failed,
                // or a concurrent attempt still between its two inserts.
                let Some(id) = self.users.find_organization(&name).await? else {
                    return Err(StoreError::Backend(format!("organization '{name}' disappeared")).into());
                };
                debug!(organization_id = %id, "reusing existing organization");
                id
            }
            Err(err) => return Err(err.into()),
        };

        let user = NewUser {
            organization_id,
            username: username.to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            email: username.to_string(),
            role: Role::OWNER,
        };
        match self.users.insert_user(user).await {
            Ok(user_id) => {
                info!(%organization_id, %user_id, "provisioned demo account");
                Ok(ProvisioningOutcome::Provisioned(ProvisioningRecord {
                    username: username.to_string(),
                    organization_id,
                    user_id,
                }))
            }
            Err(StoreError::UsernameTaken(_)) => {
                debug!("user created concurrently");
                Ok(ProvisioningOutcome::LostRace)
            }
            Err(err) => Err(err.into()),
        }
    }
}
