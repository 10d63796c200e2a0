use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use turnstile_auth::{CredentialStore, Role, StoreError, UserManager};
use turnstile_infra::{
    Argon2PasswordEncoder, InMemoryCredentialStore, PasswordEncoder, PasswordError, PostgresCredentialStore,
};

use crate::config::GatewayConfig;

/// Username of the administrator seeded from `TURNSTILE_ADMIN_PASSWORD`.
pub const BOOTSTRAP_ADMIN: &str = "admin";

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Credential lookups, provisioning writes, and password checks. One store
/// usually backs both trait objects.
#[derive(Clone)]
pub struct AppServices {
    pub credentials: Arc<dyn CredentialStore>,
    pub users: Arc<dyn UserManager>,
    pub encoder: Arc<dyn PasswordEncoder>,
}

impl AppServices {
    pub fn in_memory(store: Arc<InMemoryCredentialStore>) -> Self {
        Self {
            credentials: store.clone(),
            users: store,
            encoder: Arc::new(Argon2PasswordEncoder::new()),
        }
    }

    pub fn postgres(store: Arc<PostgresCredentialStore>) -> Self {
        Self {
            credentials: store.clone(),
            users: store,
            encoder: Arc::new(Argon2PasswordEncoder::new()),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn PasswordEncoder>) -> Self {
        self.encoder = encoder;
        self
    }
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store
/// (optionally seeded with a bootstrap administrator).
pub async fn build_services(config: &GatewayConfig) -> Result<AppServices, ServicesError> {
    if let Some(url) = &config.database_url {
        let store = PostgresCredentialStore::connect(url).await?;
        info!("using postgres credential store");
        if config.admin_password.is_some() {
            warn!("TURNSTILE_ADMIN_PASSWORD is ignored with a database-backed store");
        }
        return Ok(AppServices::postgres(Arc::new(store)));
    }

    warn!("DATABASE_URL not set; using in-memory credential store");
    let mut store = InMemoryCredentialStore::new();
    if let Some(password) = &config.admin_password {
        let hash = Argon2PasswordEncoder::new().encode(password)?;
        store = store.with_user(BOOTSTRAP_ADMIN, &hash, true, [Role::ADMIN]);
        info!(username = BOOTSTRAP_ADMIN, "seeded bootstrap administrator");
    }
    Ok(AppServices::in_memory(Arc::new(store)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_seeds_the_bootstrap_admin() {
        let config = GatewayConfig {
            admin_password: Some("letmein".into()),
            ..GatewayConfig::default()
        };
        let services = build_services(&config).await.unwrap();

        let user = services.credentials.find_user(BOOTSTRAP_ADMIN).await.unwrap().unwrap();
        assert!(user.enabled);
        assert!(services.encoder.matches("letmein", &user.password_hash));
        assert_eq!(
            services.credentials.find_roles(BOOTSTRAP_ADMIN).await.unwrap(),
            vec![Role::ADMIN]
        );
    }

    #[tokio::test]
    async fn without_admin_password_the_store_starts_empty() {
        let services = build_services(&GatewayConfig::default()).await.unwrap();
        assert!(services.credentials.find_user(BOOTSTRAP_ADMIN).await.unwrap().is_none());
        assert!(!services.users.username_exists(BOOTSTRAP_ADMIN).await.unwrap());
    }
}
