use turnstile_auth::{Principal, RoleSet};

/// The security chain that handled a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContext {
    name: String,
}

impl ChainContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Principal context for a request (authenticated identity + roles).
///
/// Absent from the request extensions for anonymous callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn username(&self) -> &str {
        self.principal.username()
    }

    pub fn roles(&self) -> &RoleSet {
        self.principal.roles()
    }
}
