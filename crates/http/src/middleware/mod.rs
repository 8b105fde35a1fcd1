//! Request middleware applied by the router builder.

pub mod auth;
pub mod trace_context;

pub use auth::require_auth;
pub use trace_context::trace_context;
