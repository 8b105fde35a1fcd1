//! Books service application library.
//!
//! Holds the `books` module (models, storage, and routes) mounted by the
//! server binary and shared with the client crates for the wire types.

pub mod modules;

pub use modules::{books, register_all};
