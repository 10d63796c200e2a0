//! Ordered access rules.
//!
//! A table is a priority list: the first rule whose path pattern and method
//! match the request decides, regardless of how specific later rules are.

use serde::Serialize;

use crate::matcher::method_matches;
use crate::{ConfigError, HttpMethod, PathPattern, Role, RoleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// What a matching rule grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Open to everyone, anonymous callers included.
    PermitAll,
    /// Any authenticated caller.
    Authenticated,
    /// Authenticated callers holding at least one of the roles.
    HasAnyRole(RoleSet),
    /// Nobody, whatever their identity.
    DenyAll,
}

impl Access {
    pub fn has_role(role: Role) -> Self {
        Self::HasAnyRole(RoleSet::of([role]))
    }

    pub fn has_any_role(roles: impl IntoIterator<Item = Role>) -> Self {
        Self::HasAnyRole(RoleSet::of(roles))
    }

    pub fn effect(&self) -> Effect {
        match self {
            Access::DenyAll => Effect::Deny,
            _ => Effect::Allow,
        }
    }

    /// Roles a caller must hold one of; empty when the rule names none.
    pub fn required_roles(&self) -> RoleSet {
        match self {
            Access::HasAnyRole(roles) => roles.clone(),
            _ => RoleSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The rule blocks the endpoint for everyone.
    DenyAll,
    /// The caller is authenticated but holds none of the listed roles.
    InsufficientRole,
    /// The rule needs an identity and the caller is anonymous.
    Unauthenticated,
}

impl core::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DenyReason::DenyAll => f.write_str("access denied"),
            DenyReason::InsufficientRole => f.write_str("insufficient role"),
            DenyReason::Unauthenticated => f.write_str("authentication required"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pattern: PathPattern,
    method: Option<HttpMethod>,
    access: Access,
}

impl AccessRule {
    pub fn new(pattern: &str, method: Option<HttpMethod>, access: Access) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            method,
            access,
        })
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    pub fn matches(&self, path: &str, method: HttpMethod) -> bool {
        method_matches(self.method, method) && self.pattern.matches(path)
    }

    /// Apply this rule to a caller; `None` roles means anonymous.
    pub fn decide(&self, caller_roles: Option<&RoleSet>) -> Decision {
        match (&self.access, caller_roles) {
            (Access::PermitAll, _) => Decision::Allow,
            (Access::DenyAll, _) => Decision::Deny(DenyReason::DenyAll),
            (Access::Authenticated, Some(_)) => Decision::Allow,
            (Access::HasAnyRole(required), Some(held)) if held.intersects(required) => Decision::Allow,
            (Access::HasAnyRole(_), Some(_)) => Decision::Deny(DenyReason::InsufficientRole),
            (_, None) => Decision::Deny(DenyReason::Unauthenticated),
        }
    }

    fn is_terminal(&self) -> bool {
        self.method.is_none()
            && self.pattern.is_catch_all()
            && matches!(self.access, Access::PermitAll | Access::Authenticated)
    }
}

impl core::fmt::Display for AccessRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let method = self.method.map(|m| m.as_str()).unwrap_or("ANY");
        write!(f, "{method} {} -> {:?}", self.pattern, self.access)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRuleTable {
    rules: Vec<AccessRule>,
}

impl AccessRuleTable {
    pub fn builder() -> AccessRuleTableBuilder {
        AccessRuleTableBuilder::default()
    }

    /// Build from explicit rules; the last one must be the catch-all.
    pub fn new(rules: Vec<AccessRule>) -> Result<Self, ConfigError> {
        let last = rules.last().ok_or(ConfigError::EmptyRuleTable)?;
        if !last.is_terminal() {
            return Err(ConfigError::MissingCatchAll(last.to_string()));
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// The first rule matching the request, with its position.
    pub fn matching_rule(&self, path: &str, method: HttpMethod) -> Option<(usize, &AccessRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(path, method))
    }

    /// Decide a request. Pure: no IO, no state.
    pub fn evaluate(&self, path: &str, method: HttpMethod, caller_roles: Option<&RoleSet>) -> Decision {
        match self.matching_rule(path, method) {
            Some((_, rule)) => rule.decide(caller_roles),
            // Unreachable for tables built through `new`, which end in a catch-all.
            None => Decision::Deny(DenyReason::DenyAll),
        }
    }
}

/// Builder mirroring how rules are declared: one call per rule, in priority
/// order. The first configuration error is kept and returned by `build`.
#[derive(Debug, Default)]
pub struct AccessRuleTableBuilder {
    rules: Vec<AccessRule>,
    error: Option<ConfigError>,
}

impl AccessRuleTableBuilder {
    /// Rule for any method.
    pub fn rule(self, pattern: &str, access: Access) -> Self {
        self.push(pattern, None, access)
    }

    /// Rule for one method.
    pub fn rule_for(self, method: HttpMethod, pattern: &str, access: Access) -> Self {
        self.push(pattern, Some(method), access)
    }

    /// Several patterns sharing one access requirement, kept in order.
    pub fn rules(self, patterns: &[&str], access: Access) -> Self {
        patterns
            .iter()
            .fold(self, |builder, pattern| builder.push(pattern, None, access.clone()))
    }

    pub fn build(self) -> Result<AccessRuleTable, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        AccessRuleTable::new(self.rules)
    }

    fn push(mut self, pattern: &str, method: Option<HttpMethod>, access: Access) -> Self {
        if self.error.is_none() {
            match AccessRule::new(pattern, method, access) {
                Ok(rule) => self.rules.push(rule),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }
}
