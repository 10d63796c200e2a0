//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: credential store selection and seeding
//! - `routes/`: placeholder handlers behind the gateway
//! - `errors.rs`: consistent error and rejection responses

use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tower::ServiceBuilder;
use tracing::info;

use turnstile_auth::policy::default_selector;
use turnstile_infra::{Authenticator, DemoProvisioner, VerificationError, VerificationGate};

use crate::config::GatewayConfig;
use crate::middleware::{self, GatewayState};
use crate::session::SessionStore;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, ServicesError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid security policy: {0}")]
    Policy(#[from] turnstile_auth::ConfigError),

    #[error("verification client: {0}")]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Services(#[from] ServicesError),
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &GatewayConfig) -> Result<Router, AppError> {
    let services = services::build_services(config).await?;
    build_router(config, services)
}

/// Build the router over already-constructed services.
pub fn build_router(config: &GatewayConfig, services: AppServices) -> Result<Router, AppError> {
    Ok(gateway_router(gateway_state(config, services)?))
}

/// Gateway state for `config`: policy, a fresh session store and the
/// services the login pipeline calls.
pub fn gateway_state(config: &GatewayConfig, services: AppServices) -> Result<GatewayState, AppError> {
    let gateway = GatewayState {
        selector: Arc::new(default_selector(config.policy_settings())?),
        sessions: Arc::new(SessionStore::new(config.session_idle)),
        authenticator: Authenticator::new(services.credentials.clone(), services.encoder.clone()),
        verification: VerificationGate::http(config.verify_url.clone(), config.verify_timeout)?,
        verification_secret: config.recaptcha_secret.as_deref().map(Arc::from),
        provisioner: config
            .is_demo()
            .then(|| DemoProvisioner::new(services.users.clone())),
    };

    info!(
        profiles = ?config.profiles,
        verification = gateway.verification_secret.is_some(),
        provisioning = gateway.provisioner.is_some(),
        "security gateway configured"
    );
    Ok(gateway)
}

/// Every route behind the security gateway.
pub fn gateway_router(gateway: GatewayState) -> Router {
    routes::router().layer(
        ServiceBuilder::new().layer(axum::middleware::from_fn_with_state(
            gateway,
            middleware::security_gateway,
        )),
    )
}
