//! Infrastructure layer: credential storage, password encoding, the
//! authenticator, and clients for external services.

pub mod authenticator;
pub mod credential_store;
pub mod password;
pub mod provisioning;
pub mod verification;

pub use authenticator::{AuthenticationError, Authenticator};
pub use credential_store::{InMemoryCredentialStore, PostgresCredentialStore};
pub use password::{Argon2PasswordEncoder, PasswordEncoder, PasswordError};
pub use provisioning::{DemoProvisioner, ProvisioningError, ProvisioningOutcome, ProvisioningRecord};
pub use verification::{
    HttpVerificationTransport, VerificationError, VerificationGate, VerificationResponse,
    VerificationTransport,
};
