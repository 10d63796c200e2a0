//! Credential store implementations.
//!
//! Both implement the read contract ([`turnstile_auth::CredentialStore`]) and
//! the provisioning writes ([`turnstile_auth::UserManager`]). Uniqueness of
//! usernames is enforced by the store itself; losing an insert race surfaces
//! as [`turnstile_auth::StoreError::UsernameTaken`].

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryCredentialStore, StoredOrganization, StoredUser};
pub use postgres::PostgresCredentialStore;
