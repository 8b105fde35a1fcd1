use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Copies recorded when a create request leaves `available_copies` out.
pub const DEFAULT_AVAILABLE_COPIES: i32 = 1;

/// A row from the `books` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub year_published: Option<i32>,
    pub available_copies: Option<i32>,
}

/// Validated values for an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub year_published: Option<i32>,
    pub available_copies: i32,
}

/// Values for a partial update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub year_published: Option<i32>,
    pub available_copies: Option<i32>,
}

impl BookPatch {
    /// Apply the supplied fields to `book`.
    pub fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(genre) = self.genre {
            book.genre = Some(genre);
        }
        if let Some(year) = self.year_published {
            book.year_published = Some(year);
        }
        if let Some(copies) = self.available_copies {
            book.available_copies = Some(copies);
        }
    }
}

/// Body of `POST /books`. Every field is optional on the wire so missing
/// values are reported as a validation error rather than a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub year_published: Option<i32>,
    pub available_copies: Option<i32>,
}

impl CreateBookRequest {
    /// `None` when title or author is missing or blank.
    pub fn into_new_book(self) -> Option<NewBook> {
        let title = self.title.filter(|title| !title.trim().is_empty())?;
        let author = self.author.filter(|author| !author.trim().is_empty())?;

        Some(NewBook {
            title,
            author,
            genre: self.genre,
            year_published: self.year_published,
            available_copies: self.available_copies.unwrap_or(DEFAULT_AVAILABLE_COPIES),
        })
    }
}

/// Body of `PUT /books/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub year_published: Option<i32>,
    pub available_copies: Option<i32>,
}

impl UpdateBookRequest {
    /// Supplying a blank title or author would break the row invariant.
    pub fn has_blank_required_field(&self) -> bool {
        [&self.title, &self.author]
            .into_iter()
            .flatten()
            .any(|value| value.trim().is_empty())
    }

    pub fn into_patch(self) -> BookPatch {
        BookPatch {
            title: self.title,
            author: self.author,
            genre: self.genre,
            year_published: self.year_published,
            available_copies: self.available_copies,
        }
    }
}

/// `GET /books` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookList {
    pub count: usize,
    pub books: Vec<Book>,
}

/// `GET /books/search/{query}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub count: usize,
    pub query: String,
    pub books: Vec<Book>,
}

/// Create, update, and delete responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMessage {
    pub message: String,
    pub book: Book,
}
