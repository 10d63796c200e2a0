use thiserror::Error;

/// Security configuration error.
///
/// Raised while building patterns, rule tables and chains. These are fatal
/// at startup and never reach an end user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("access rule table has no rules")]
    EmptyRuleTable,

    #[error("access rule table must end with a catch-all '/**' rule granting permitAll or authenticated (last rule: {0})")]
    MissingCatchAll(String),

    #[error("no security chains configured")]
    NoChains,

    #[error("no security chain matches every request")]
    NoDefaultChain,

    #[error("security chains '{first}' and '{second}' share order {order}")]
    DuplicateOrder {
        first: String,
        second: String,
        order: i32,
    },

    #[error("security chain '{0}' is ordered after a match-everything chain and can never be selected")]
    UnreachableChain(String),

    #[error("security chain '{0}' is stateless but uses session-bound features (CSRF or form login)")]
    SessionFeatureOnStatelessChain(String),
}

impl ConfigError {
    pub(crate) fn pattern(pattern: &str, reason: &'static str) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        }
    }
}
