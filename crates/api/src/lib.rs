//! Demo HTTP applications meant to run behind a Lambda web adapter.

pub mod app;
pub mod context;
pub mod middleware;
pub mod server;
