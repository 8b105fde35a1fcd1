//! Client side of the books API: a traced HTTP data service and the
//! library view-model that drives it.

pub mod api;
pub mod error;
pub mod http;
pub mod view;

pub use api::BooksApi;
pub use error::ClientError;
pub use http::{BooksClient, CLIENT_TRACER_NAME, DEFAULT_BASE_URL};
pub use view::{BookForm, Confirm, LibraryView, Status};
