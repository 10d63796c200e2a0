//! `turnstile-auth`: the request-authorization policy engine.
//!
//! Chain selection, access rules, CSRF protection and the credential store
//! contract. This crate is intentionally decoupled from HTTP frameworks and
//! storage: it sees requests only through [`RequestInfo`].

pub mod chain;
pub mod credentials;
pub mod csrf;
pub mod error;
pub mod matcher;
pub mod pattern;
pub mod policy;
pub mod principal;
pub mod request;
pub mod roles;
pub mod rules;

pub use chain::{AuthenticationMechanism, ChainSelector, FormLogin, SecurityChain, SessionPolicy};
pub use credentials::{CredentialStore, NewOrganization, NewUser, StoreError, UserCredentials, UserManager};
pub use csrf::{CsrfCheck, CsrfError, CsrfGuard, CsrfToken, CsrfTokenRepository};
pub use error::ConfigError;
pub use matcher::RequestMatcher;
pub use pattern::PathPattern;
pub use principal::Principal;
pub use request::{HttpMethod, RequestInfo};
pub use roles::{Role, RoleSet};
pub use rules::{Access, AccessRule, AccessRuleTable, Decision, DenyReason, Effect};
