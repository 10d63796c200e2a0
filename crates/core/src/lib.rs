//! `turnstile-core`: shared identifiers and their parse errors.
//!
//! This crate has no knowledge of HTTP, sessions, or storage.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{OrganizationId, SessionId, UserId};
