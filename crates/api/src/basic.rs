//! `Authorization: Basic` credential extraction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasicCredentials {
    /// No `Authorization` header, or one using another scheme.
    None,
    /// A Basic header that does not decode to `user:password`.
    Malformed,
    Present { username: String, password: String },
}

pub fn parse(header: Option<&str>) -> BasicCredentials {
    let Some(value) = header.map(str::trim) else {
        return BasicCredentials::None;
    };
    let (scheme, encoded) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return BasicCredentials::None;
    }

    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return BasicCredentials::Malformed;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return BasicCredentials::Malformed;
    };
    match decoded.split_once(':') {
        Some((username, password)) => BasicCredentials::Present {
            username: username.to_string(),
            password: password.to_string(),
        },
        None => BasicCredentials::Malformed,
    }
}
