use crate::{ConfigError, HttpMethod, PathPattern, RequestInfo};

/// Predicate over a request, expressed as a value so configurations can be
/// inspected (e.g. to prove a chain matches everything).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMatcher {
    /// Matches every request.
    Any,
    /// Header is present, whatever its value.
    HeaderPresent(String),
    /// Header is present with exactly this value.
    HeaderEquals { name: String, value: String },
    /// Path matches a pattern; `None` method means any method.
    Path {
        pattern: PathPattern,
        method: Option<HttpMethod>,
    },
    /// Path equals this string byte for byte.
    ExactPath {
        path: String,
        method: Option<HttpMethod>,
    },
    Not(Box<RequestMatcher>),
}

impl RequestMatcher {
    pub fn header_present(name: impl Into<String>) -> Self {
        Self::HeaderPresent(name.into())
    }

    pub fn header_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::HeaderEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn path(pattern: &str, method: Option<HttpMethod>) -> Result<Self, ConfigError> {
        Ok(Self::Path {
            pattern: PathPattern::parse(pattern)?,
            method,
        })
    }

    pub fn exact_path(path: impl Into<String>, method: Option<HttpMethod>) -> Self {
        Self::ExactPath {
            path: path.into(),
            method,
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches(&self, request: &RequestInfo) -> bool {
        match self {
            RequestMatcher::Any => true,
            RequestMatcher::HeaderPresent(name) => request.has_header(name),
            RequestMatcher::HeaderEquals { name, value } => request.header(name) == Some(value.as_str()),
            RequestMatcher::Path { pattern, method } => {
                method_matches(*method, request.method()) && pattern.matches(request.path())
            }
            RequestMatcher::ExactPath { path, method } => {
                method_matches(*method, request.method()) && request.path() == path
            }
            RequestMatcher::Not(inner) => !inner.matches(request),
        }
    }

    /// True only for matchers that provably accept every request.
    pub fn matches_everything(&self) -> bool {
        match self {
            RequestMatcher::Any => true,
            RequestMatcher::Path { pattern, method: None } => pattern.is_catch_all(),
            _ => false,
        }
    }
}

pub(crate) fn method_matches(expected: Option<HttpMethod>, actual: HttpMethod) -> bool {
    expected.is_none_or(|m| m == actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matchers() {
        let req = RequestInfo::new(HttpMethod::Get, "/").with_header("X-Requested-With", "XMLHttpRequest");
        assert!(RequestMatcher::header_present("x-requested-with").matches(&req));
        assert!(RequestMatcher::header_equals("X-Requested-With", "XMLHttpRequest").matches(&req));
        assert!(!RequestMatcher::header_equals("X-Requested-With", "fetch").matches(&req));
        assert!(!RequestMatcher::header_present("Authorization").matches(&req));
    }

    #[test]
    fn path_matcher_respects_method() {
        let login = RequestMatcher::path("/authenticate", Some(HttpMethod::Post)).unwrap();
        assert!(login.matches(&RequestInfo::new(HttpMethod::Post, "/authenticate")));
        assert!(!login.matches(&RequestInfo::new(HttpMethod::Get, "/authenticate")));
    }

    #[test]
    fn exact_path_is_byte_for_byte() {
        let m = RequestMatcher::exact_path("/report-csp-violation", None);
        assert!(m.matches(&RequestInfo::new(HttpMethod::Post, "/report-csp-violation")));
        assert!(!m.matches(&RequestInfo::new(HttpMethod::Post, "/report-csp-violation/")));
    }

    #[test]
    fn negation_and_everything() {
        let m = RequestMatcher::header_present("Authorization").negate();
        assert!(m.matches(&RequestInfo::new(HttpMethod::Get, "/")));
        assert!(!m.matches_everything());
        assert!(RequestMatcher::Any.matches_everything());
        assert!(RequestMatcher::path("/**", None).unwrap().matches_everything());
        assert!(!RequestMatcher::path("/**", Some(HttpMethod::Get)).unwrap().matches_everything());
    }
}
