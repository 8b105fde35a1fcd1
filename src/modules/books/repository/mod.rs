//! Storage behind the book routes.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Book, BookPatch, NewBook};

mod memory;
mod postgres;

pub use memory::MemoryBookRepository;
pub use postgres::PgBookRepository;

/// Failure reported by a repository. The message becomes the `details`
/// field of the 500 response.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// CRUD and search over the `books` table.
///
/// Lookups by id return `Ok(None)` when no row matches; "not found" is a
/// routing concern, not a storage failure.
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn insert(&self, book: NewBook) -> Result<Book, StorageError>;

    /// All rows, newest id first.
    async fn list(&self) -> Result<Vec<Book>, StorageError>;

    async fn find(&self, id: i32) -> Result<Option<Book>, StorageError>;

    /// Overwrite the supplied fields, keep the rest.
    async fn update(&self, id: i32, patch: BookPatch) -> Result<Option<Book>, StorageError>;

    /// Remove the row and hand back its former values.
    async fn delete(&self, id: i32) -> Result<Option<Book>, StorageError>;

    /// Case-insensitive substring match on title or author, ordered by title.
    async fn search(&self, query: &str) -> Result<Vec<Book>, StorageError>;
}
