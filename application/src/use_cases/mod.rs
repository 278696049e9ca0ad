//! Use cases (application services)

pub mod debug_session;
