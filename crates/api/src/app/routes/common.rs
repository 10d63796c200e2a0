use axum::extract::Extension;
use axum::http::{Method, Uri};
use axum::Json;
use serde_json::{Value, json};

use crate::context::{ChainContext, PrincipalContext};

/// JSON description of the caller as the gateway resolved it.
pub fn caller(chain: Option<&ChainContext>, principal: Option<&PrincipalContext>) -> Value {
    json!({
        "chain": chain.map(ChainContext::name),
        "username": principal.map(PrincipalContext::username),
        "roles": principal
            .map(|p| p.roles().iter().map(|r| r.as_str().to_string()).collect::<Vec<_>>())
            .unwrap_or_default(),
    })
}

/// Placeholder handler: reports the request and its caller.
pub async fn echo(
    method: Method,
    uri: Uri,
    chain: Option<Extension<ChainContext>>,
    principal: Option<Extension<PrincipalContext>>,
) -> Json<Value> {
    let mut body = caller(chain.as_deref(), principal.as_deref());
    body["method"] = json!(method.as_str());
    body["path"] = json!(uri.path());
    Json(body)
}
