use axum::Router;
use axum::routing::post;

use crate::app::routes::common::echo;

pub fn router() -> Router {
    Router::new().route("/api/attendees/sponsor-scan", post(echo))
}
