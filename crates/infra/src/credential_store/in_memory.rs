use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use turnstile_auth::{
    CredentialStore, NewOrganization, NewUser, Role, StoreError, UserCredentials, UserManager,
};
use turnstile_core::{OrganizationId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrganization {
    pub id: OrganizationId,
    pub name: String,
    pub description: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub id: UserId,
    pub organization_id: Option<OrganizationId>,
    pub credentials: UserCredentials,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, StoredUser>,
    roles: HashMap<String, Vec<Role>>,
    organizations: HashMap<OrganizationId, StoredOrganization>,
}

/// In-memory credential store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<State>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user outside any organization.
    pub fn with_user(
        self,
        username: &str,
        password_hash: &str,
        enabled: bool,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        if let Ok(mut state) = self.inner.write() {
            state.users.insert(
                username.to_string(),
                StoredUser {
                    id: UserId::new(),
                    organization_id: None,
                    credentials: UserCredentials {
                        username: username.to_string(),
                        password_hash: password_hash.to_string(),
                        enabled,
                    },
                    first_name: String::new(),
                    last_name: String::new(),
                    email: String::new(),
                },
            );
            state.roles.insert(username.to_string(), roles.into_iter().collect());
        }
        self
    }

    pub fn user(&self, username: &str) -> Option<StoredUser> {
        self.read().ok()?.users.get(username).cloned()
    }

    pub fn organizations(&self) -> Vec<StoredOrganization> {
        match self.read() {
            Ok(state) => state.organizations.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    pub fn user_count(&self) -> usize {
        self.read().map(|s| s.users.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("credential store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("credential store lock poisoned".into()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        Ok(self.read()?.users.get(username).map(|u| u.credentials.clone()))
    }

    async fn find_roles(&self, username: &str) -> Result<Vec<Role>, StoreError> {
        Ok(self.read()?.roles.get(username).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl UserManager for InMemoryCredentialStore {
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.users.contains_key(username))
    }

    async fn create_organization(&self, organization: NewOrganization) -> Result<OrganizationId, StoreError> {
        let mut state = self.write()?;
        if state.organizations.values().any(|o| o.name == organization.name) {
            return Err(StoreError::OrganizationExists(organization.name));
        }

        let id = OrganizationId::new();
        state.organizations.insert(
            id,
            StoredOrganization {
                id,
                name: organization.name,
                description: organization.description,
                email: organization.email,
            },
        );
        Ok(id)
    }

    async fn find_organization(&self, name: &str) -> Result<Option<OrganizationId>, StoreError> {
        Ok(self
            .read()?
            .organizations
            .values()
            .find(|o| o.name == name)
            .map(|o| o.id))
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let mut state = self.write()?;
        if !state.organizations.contains_key(&user.organization_id) {
            return Err(StoreError::UnknownOrganization(user.organization_id));
        }
        if state.users.contains_key(&user.username) {
            return Err(StoreError::UsernameTaken(user.username));
        }

        let id = UserId::new();
        state.roles.insert(user.username.clone(), vec![user.role]);
        state.users.insert(
            user.username.clone(),
            StoredUser {
                id,
                organization_id: Some(user.organization_id),
                credentials: UserCredentials {
                    username: user.username,
                    password_hash: user.password_hash,
                    enabled: true,
                },
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
            },
        );
        Ok(id)
    }
}
