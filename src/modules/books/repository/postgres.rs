use async_trait::async_trait;
use shelf_db::PgPool;

use super::{BookRepository, StorageError};
use crate::modules::books::models::{Book, BookPatch, NewBook};

const COLUMNS: &str = "id, title, author, genre, year_published, available_copies";

/// `books` table access through the shared pool.
#[derive(Debug, Clone)]
pub struct PgBookRepository {
    pool: PgPool,
}

impl PgBookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn insert(&self, book: NewBook) -> Result<Book, StorageError> {
        let sql = format!(
            "INSERT INTO books (title, author, genre, year_published, available_copies) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, Book>(&sql)
            .bind(book.title)
            .bind(book.author)
            .bind(book.genre)
            .bind(book.year_published)
            .bind(book.available_copies)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Book>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM books ORDER BY id DESC");
        let rows = sqlx::query_as::<_, Book>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find(&self, id: i32) -> Result<Option<Book>, StorageError> {
        let sql = format!("SELECT {COLUMNS} FROM books WHERE id = $1");
        let row = sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, id: i32, patch: BookPatch) -> Result<Option<Book>, StorageError> {
        let sql = format!(
            "UPDATE books SET \
                title = COALESCE($1, title), \
                author = COALESCE($2, author), \
                genre = COALESCE($3, genre), \
                year_published = COALESCE($4, year_published), \
                available_copies = COALESCE($5, available_copies) \
             WHERE id = $6 RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, Book>(&sql)
            .bind(patch.title)
            .bind(patch.author)
            .bind(patch.genre)
            .bind(patch.year_published)
            .bind(patch.available_copies)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> Result<Option<Book>, StorageError> {
        let sql = format!("DELETE FROM books WHERE id = $1 RETURNING {COLUMNS}");
        let row = sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>, StorageError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM books WHERE title ILIKE $1 OR author ILIKE $1 ORDER BY title"
        );
        let rows = sqlx::query_as::<_, Book>(&sql)
            .bind(format!("%{query}%"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
