use axum::Router;
use axum::routing::{get, post};

pub mod admin;
pub mod attendees;
pub mod common;
pub mod system;

/// Every route of the application behind the gateway. Paths without a
/// dedicated handler fall through to [`common::echo`].
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/whoami", get(system::whoami))
        .route("/authentication", get(system::login_page))
        .route("/session-expired", get(system::session_expired))
        .route("/report-csp-violation", post(system::report_csp_violation))
        .route("/report-csp-violation/*rest", post(system::report_csp_violation))
        .merge(admin::router())
        .merge(attendees::router())
        .fallback(common::echo)
}
