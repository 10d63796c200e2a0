//! HTTP surface of the gateway: configuration, sessions, the security
//! middleware, and the placeholder application behind it.

pub mod app;
pub mod basic;
pub mod config;
pub mod context;
pub mod middleware;
pub mod session;
