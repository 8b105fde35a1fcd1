use async_trait::async_trait;
use shelf_app::books::models::{Book, BookMessage, CreateBookRequest, UpdateBookRequest};

use crate::error::ClientError;

/// The six calls the books API offers.
#[async_trait]
pub trait BooksApi: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Book>, ClientError>;

    async fn get_by_id(&self, id: i32) -> Result<Book, ClientError>;

    async fn create(&self, book: &CreateBookRequest) -> Result<BookMessage, ClientError>;

    async fn update(&self, id: i32, book: &UpdateBookRequest) -> Result<BookMessage, ClientError>;

    async fn delete(&self, id: i32) -> Result<BookMessage, ClientError>;

    async fn search(&self, query: &str) -> Result<Vec<Book>, ClientError>;
}
