//! The gateway's shipped security configuration: one stateless chain for
//! clients that announce themselves with an `Authorization` header, one
//! stateful form-login chain for browsers.

use crate::{
    Access, AccessRuleTable, AuthenticationMechanism, ChainSelector, ConfigError, CsrfGuard,
    FormLogin, HttpMethod, RequestMatcher, Role, SecurityChain,
};

pub const ADMIN_API: &str = "/admin/api";
pub const LOGIN_PAGE: &str = "/authentication";
pub const LOGIN_PROCESSING_PATH: &str = "/authenticate";
pub const BASIC_REALM: &str = "turnstile";

/// Deployment-time switches that shape the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicySettings {
    /// Browser chain redirects plain-HTTP requests to HTTPS.
    pub require_secure_channel: bool,
    /// CSRF exemptions use exact matching.
    pub strict_csrf: bool,
}

fn admin_api(suffix: &str) -> String {
    format!("{ADMIN_API}{suffix}")
}

/// Rules for programmatic/mobile clients.
pub fn api_client_rules() -> Result<AccessRuleTable, ConfigError> {
    AccessRuleTable::builder()
        .rule(&admin_api("/check-in/**"), Access::has_any_role([Role::OPERATOR, Role::SUPERVISOR]))
        .rule_for(
            HttpMethod::Get,
            &admin_api("/events"),
            Access::has_any_role([Role::OPERATOR, Role::SUPERVISOR, Role::SPONSOR]),
        )
        .rule(
            &admin_api("/user-type"),
            Access::has_any_role([Role::OPERATOR, Role::SUPERVISOR, Role::SPONSOR]),
        )
        .rule(&admin_api("/**"), Access::DenyAll)
        .rule_for(HttpMethod::Post, "/api/attendees/sponsor-scan", Access::has_role(Role::SPONSOR))
        .rule("/**", Access::Authenticated)
        .build()
}

/// Rules for browser clients.
pub fn browser_rules() -> Result<AccessRuleTable, ConfigError> {
    let administrators = || Access::has_any_role([Role::ADMIN, Role::OWNER]);
    let staff = || Access::has_any_role([Role::ADMIN, Role::OWNER, Role::SUPERVISOR]);

    AccessRuleTable::builder()
        .rules(
            &[admin_api("/configuration/**").as_str(), admin_api("/users/**").as_str()],
            administrators(),
        )
        .rule(&admin_api("/organizations/new"), Access::has_role(Role::ADMIN))
        .rule(&admin_api("/check-in/**"), staff())
        .rule_for(HttpMethod::Get, &admin_api("/**"), staff())
        .rule(&admin_api("/**"), administrators())
        .rule("/admin/**/export/**", administrators())
        .rule("/admin/**", staff())
        .rule("/api/attendees/**", Access::DenyAll)
        .rule("/**", Access::PermitAll)
        .build()
}

pub fn api_client_chain() -> Result<SecurityChain, ConfigError> {
    Ok(SecurityChain::new(
        "api-client",
        1,
        RequestMatcher::header_present("Authorization"),
        api_client_rules()?,
        AuthenticationMechanism::HttpBasic {
            realm: BASIC_REALM.to_string(),
        },
    )
    .stateless())
}

pub fn browser_chain(settings: PolicySettings) -> Result<SecurityChain, ConfigError> {
    Ok(SecurityChain::new(
        "browser",
        2,
        RequestMatcher::Any,
        browser_rules()?,
        AuthenticationMechanism::FormLogin(FormLogin::new(LOGIN_PAGE, LOGIN_PROCESSING_PATH)?),
    )
    .with_csrf(CsrfGuard::new(settings.strict_csrf)?)
    .require_secure_channel(settings.require_secure_channel))
}

pub fn default_selector(settings: PolicySettings) -> Result<ChainSelector, ConfigError> {
    ChainSelector::new(vec![api_client_chain()?, browser_chain(settings)?])
}
