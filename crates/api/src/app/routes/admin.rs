//! Administration endpoints. Access is decided entirely by the gateway's
//! rules; the handlers only echo the caller.

use axum::Router;
use axum::routing::{any, get, post};

use crate::app::routes::common::echo;

pub fn router() -> Router {
    Router::new()
        .route("/admin", get(echo))
        .route("/admin/api/events", get(echo).post(echo))
        .route("/admin/api/user-type", get(echo))
        .route("/admin/api/check-in/:event/ticket/:ticket", post(echo))
        .route("/admin/api/configuration/*rest", any(echo))
        .route("/admin/api/users/*rest", any(echo))
        .route("/admin/api/organizations/new", post(echo))
        .route("/admin/events/:event/export/*rest", get(echo))
}
