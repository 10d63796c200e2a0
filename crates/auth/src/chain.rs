//! Security chains and the selector that dispatches requests to them.

use crate::{AccessRuleTable, ConfigError, CsrfGuard, HttpMethod, RequestInfo, RequestMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Never creates or reads a session; each request authenticates itself.
    Stateless,
    Stateful,
}

/// Endpoints and redirect targets of browser form login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLogin {
    pub login_page: String,
    pub processing: RequestMatcher,
    pub success_url: String,
    pub failure_url: String,
    pub verification_failure_url: String,
    pub logout: RequestMatcher,
    pub logout_success_url: String,
    pub access_denied_page: String,
    /// Requests answered with bare status codes instead of redirects.
    pub ajax: RequestMatcher,
}

impl FormLogin {
    pub fn new(login_page: &str, processing_path: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            login_page: login_page.to_string(),
            processing: RequestMatcher::path(processing_path, Some(HttpMethod::Post))?,
            success_url: "/admin".to_string(),
            failure_url: format!("{login_page}?failed"),
            verification_failure_url: format!("{login_page}?recaptchaFailed"),
            logout: RequestMatcher::path("/logout", Some(HttpMethod::Post))?,
            logout_success_url: format!("{login_page}?logout"),
            access_denied_page: "/session-expired".to_string(),
            ajax: RequestMatcher::header_equals("X-Requested-With", "XMLHttpRequest"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationMechanism {
    HttpBasic { realm: String },
    FormLogin(FormLogin),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityChain {
    name: String,
    order: i32,
    matcher: RequestMatcher,
    session: SessionPolicy,
    rules: AccessRuleTable,
    csrf: Option<CsrfGuard>,
    authentication: AuthenticationMechanism,
    secure_channel: bool,
}

impl SecurityChain {
    /// A stateful chain without CSRF protection or channel requirement.
    pub fn new(
        name: impl Into<String>,
        order: i32,
        matcher: RequestMatcher,
        rules: AccessRuleTable,
        authentication: AuthenticationMechanism,
    ) -> Self {
        Self {
            name: name.into(),
            order,
            matcher,
            session: SessionPolicy::Stateful,
            rules,
            csrf: None,
            authentication,
            secure_channel: false,
        }
    }

    pub fn stateless(mut self) -> Self {
        self.session = SessionPolicy::Stateless;
        self
    }

    pub fn with_csrf(mut self, guard: CsrfGuard) -> Self {
        self.csrf = Some(guard);
        self
    }

    pub fn require_secure_channel(mut self, required: bool) -> Self {
        self.secure_channel = required;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn matcher(&self) -> &RequestMatcher {
        &self.matcher
    }

    pub fn session_policy(&self) -> SessionPolicy {
        self.session
    }

    pub fn is_stateless(&self) -> bool {
        self.session == SessionPolicy::Stateless
    }

    pub fn rules(&self) -> &AccessRuleTable {
        &self.rules
    }

    pub fn csrf(&self) -> Option<&CsrfGuard> {
        self.csrf.as_ref()
    }

    pub fn authentication(&self) -> &AuthenticationMechanism {
        &self.authentication
    }

    pub fn form_login(&self) -> Option<&FormLogin> {
        match &self.authentication {
            AuthenticationMechanism::FormLogin(form) => Some(form),
            AuthenticationMechanism::HttpBasic { .. } => None,
        }
    }

    pub fn requires_secure_channel(&self) -> bool {
        self.secure_channel
    }

    pub fn matches(&self, request: &RequestInfo) -> bool {
        self.matcher.matches(request)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.is_stateless() && (self.csrf.is_some() || self.form_login().is_some()) {
            return Err(ConfigError::SessionFeatureOnStatelessChain(self.name.clone()));
        }
        Ok(())
    }
}

/// Dispatches each request to exactly one chain: the lowest-order chain
/// whose predicate accepts it.
#[derive(Debug, Clone)]
pub struct ChainSelector {
    chains: Vec<SecurityChain>,
}

impl ChainSelector {
    /// Validate and order chains.
    ///
    /// Fails on: no chains, no match-everything chain, two chains sharing an
    /// order, a chain ordered after the match-everything chain, or a
    /// stateless chain using session features.
    pub fn new(mut chains: Vec<SecurityChain>) -> Result<Self, ConfigError> {
        if chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        chains.sort_by_key(SecurityChain::order);

        for pair in chains.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(ConfigError::DuplicateOrder {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                    order: pair[0].order,
                });
            }
        }
        for chain in &chains {
            chain.validate()?;
        }

        let default_at = chains
            .iter()
            .position(|c| c.matcher.matches_everything())
            .ok_or(ConfigError::NoDefaultChain)?;
        if let Some(unreachable) = chains.get(default_at + 1) {
            return Err(ConfigError::UnreachableChain(unreachable.name.clone()));
        }

        Ok(Self { chains })
    }

    pub fn chains(&self) -> &[SecurityChain] {
        &self.chains
    }

    pub fn select(&self, request: &RequestInfo) -> &SecurityChain {
        let chain = self
            .chains
            .iter()
            .find(|c| c.matches(request))
            .unwrap_or_else(|| self.default_chain());
        tracing::trace!(chain = chain.name(), path = request.path(), "security chain selected");
        chain
    }

    fn default_chain(&self) -> &SecurityChain {
        // `new` guarantees the last chain matches everything.
        &self.chains[self.chains.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Access;

    fn open_rules() -> AccessRuleTable {
        AccessRuleTable::builder().rule("/**", Access::PermitAll).build().unwrap()
    }

    fn basic(name: &str, order: i32, matcher: RequestMatcher) -> SecurityChain {
        SecurityChain::new(
            name,
            order,
            matcher,
            open_rules(),
            AuthenticationMechanism::HttpBasic { realm: "test".into() },
        )
        .stateless()
    }

    #[test]
    fn lowest_order_matching_chain_wins() {
        let selector = ChainSelector::new(vec![
            basic("fallback", 10, RequestMatcher::Any),
            basic("api", 1, RequestMatcher::header_present("Authorization")),
        ])
        .unwrap();

        let with_header = RequestInfo::new(HttpMethod::Get, "/").with_header("Authorization", "Basic x");
        assert_eq!(selector.select(&with_header).name(), "api");
        assert_eq!(selector.select(&RequestInfo::new(HttpMethod::Get, "/")).name(), "fallback");
    }

    #[test]
    fn zero_chains_is_a_config_error() {
        assert_eq!(ChainSelector::new(vec![]).unwrap_err(), ConfigError::NoChains);
    }

    #[test]
    fn missing_default_chain_is_a_config_error() {
        let err = ChainSelector::new(vec![basic("api", 1, RequestMatcher::header_present("Authorization"))])
            .unwrap_err();
        assert_eq!(err, ConfigError::NoDefaultChain);
    }

    #[test]
    fn duplicate_order_is_ambiguous() {
        let err = ChainSelector::new(vec![
            basic("a", 1, RequestMatcher::header_present("Authorization")),
            basic("b", 1, RequestMatcher::Any),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOrder { order: 1, .. }));
    }

    #[test]
    fn chain_after_default_is_unreachable() {
        let err = ChainSelector::new(vec![
            basic("default", 1, RequestMatcher::Any),
            basic("never", 2, RequestMatcher::header_present("Authorization")),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::UnreachableChain("never".into()));
    }

    #[test]
    fn stateless_chain_cannot_carry_csrf() {
        let chain = basic("api", 1, RequestMatcher::Any).with_csrf(CsrfGuard::new(false).unwrap());
        assert_eq!(
            ChainSelector::new(vec![chain]).unwrap_err(),
            ConfigError::SessionFeatureOnStatelessChain("api".into())
        );
    }
}
