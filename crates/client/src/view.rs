//! Library view-model.
//!
//! Holds what a books screen shows (the list, one create-or-edit form, the
//! search box, one status line) and the actions that change it. Every action
//! that mutates the server reloads the full list afterwards. Rendering is left
//! to the caller.

use shelf_app::books::models::{
    Book, CreateBookRequest, UpdateBookRequest, DEFAULT_AVAILABLE_COPIES,
};

use crate::api::BooksApi;

pub const TITLE_AND_AUTHOR_REQUIRED: &str = "Title and Author are required";
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this book?";

const LOAD_FAILED: &str = "Failed to load books";
const CREATE_FAILED: &str = "Failed to create book";
const UPDATE_FAILED: &str = "Failed to update book";
const DELETE_FAILED: &str = "Failed to delete book";
const SEARCH_FAILED: &str = "Search failed";

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// The single status line. Loading, error, and success never show together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Error(String),
    Success(String),
}

impl Status {
    pub fn is_loading(&self) -> bool {
        matches!(self, Status::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Status::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn success(&self) -> Option<&str> {
        match self {
            Status::Success(message) => Some(message),
            _ => None,
        }
    }
}

/// Create-or-edit form contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookForm {
    pub id: Option<i32>,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub year_published: Option<i32>,
    pub available_copies: Option<i32>,
    /// The edited book had a genre, so a blank field clears it.
    had_genre: bool,
}

impl Default for BookForm {
    fn default() -> Self {
        Self {
            id: None,
            title: String::new(),
            author: String::new(),
            genre: String::new(),
            year_published: None,
            available_copies: Some(DEFAULT_AVAILABLE_COPIES),
            had_genre: false,
        }
    }
}

impl BookForm {
    pub fn from_book(book: &Book) -> Self {
        Self {
            id: Some(book.id),
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone().unwrap_or_default(),
            year_published: book.year_published,
            available_copies: book.available_copies,
            had_genre: book.genre.is_some(),
        }
    }

    fn is_missing_required(&self) -> bool {
        self.title.trim().is_empty() || self.author.trim().is_empty()
    }

    fn genre(&self) -> Option<String> {
        let genre = self.genre.trim();
        (!genre.is_empty()).then(|| genre.to_string())
    }

    pub fn to_create_request(&self) -> CreateBookRequest {
        CreateBookRequest {
            title: Some(self.title.clone()),
            author: Some(self.author.clone()),
            genre: self.genre(),
            year_published: self.year_published,
            available_copies: self.available_copies,
        }
    }

    pub fn to_update_request(&self) -> UpdateBookRequest {
        UpdateBookRequest {
            title: Some(self.title.clone()),
            author: Some(self.author.clone()),
            genre: self
                .genre()
                .or_else(|| self.had_genre.then(String::new)),
            year_published: self.year_published,
            available_copies: self.available_copies,
        }
    }
}

pub struct LibraryView<A: BooksApi> {
    api: A,
    books: Vec<Book>,
    form: BookForm,
    edit_mode: bool,
    search_query: String,
    status: Status,
}

impl<A: BooksApi> LibraryView<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            books: Vec::new(),
            form: BookForm::default(),
            edit_mode: false,
            search_query: String::new(),
            status: Status::Idle,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn form(&self) -> &BookForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut BookForm {
        &mut self.form
    }

    pub fn is_editing(&self) -> bool {
        self.edit_mode
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Replace the list with every book. Returns whether the load worked.
    pub async fn load_books(&mut self) -> bool {
        self.status = Status::Loading;

        match self.api.get_all().await {
            Ok(books) => {
                tracing::debug!(count = books.len(), "books loaded");
                self.books = books;
                self.status = Status::Idle;
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load books");
                self.status = Status::Error(LOAD_FAILED.to_string());
                false
            }
        }
    }

    /// Create from the form, or update when editing a loaded book.
    pub async fn submit(&mut self) {
        if self.form.is_missing_required() {
            self.status = Status::Error(TITLE_AND_AUTHOR_REQUIRED.to_string());
            return;
        }

        self.status = Status::Loading;

        let result = match (self.edit_mode, self.form.id) {
            (true, Some(id)) => self
                .api
                .update(id, &self.form.to_update_request())
                .await
                .map_err(|err| (UPDATE_FAILED, err)),
            _ => self
                .api
                .create(&self.form.to_create_request())
                .await
                .map_err(|err| (CREATE_FAILED, err)),
        };

        match result {
            Ok(response) => {
                if self.load_books().await {
                    self.reset_form();
                    self.status = Status::Success(response.message);
                }
            }
            Err((message, err)) => {
                tracing::error!(error = %err, "{message}");
                self.status = Status::Error(message.to_string());
            }
        }
    }

    /// Load `book` into the form and switch to edit mode.
    pub fn edit(&mut self, book: &Book) {
        self.form = BookForm::from_book(book);
        self.edit_mode = true;
    }

    pub async fn delete(&mut self, id: i32, confirm: &dyn Confirm) {
        if !confirm.confirm(DELETE_PROMPT) {
            return;
        }

        self.status = Status::Loading;

        match self.api.delete(id).await {
            Ok(response) => {
                if self.load_books().await {
                    self.status = Status::Success(response.message);
                }
            }
            Err(err) => {
                tracing::error!(book_id = id, error = %err, "failed to delete book");
                self.status = Status::Error(DELETE_FAILED.to_string());
            }
        }
    }

    /// Search by the current query; a blank query shows every book.
    pub async fn search(&mut self) {
        if self.search_query.trim().is_empty() {
            self.load_books().await;
            return;
        }

        self.status = Status::Loading;

        match self.api.search(&self.search_query).await {
            Ok(books) => {
                self.books = books;
                self.status = Status::Idle;
            }
            Err(err) => {
                tracing::error!(query = %self.search_query, error = %err, "search failed");
                self.status = Status::Error(SEARCH_FAILED.to_string());
            }
        }
    }

    pub async fn clear_search(&mut self) {
        self.search_query.clear();
        self.load_books().await;
    }

    /// Empty form, create mode, no status.
    pub fn reset_form(&mut self) {
        self.form = BookForm::default();
        self.edit_mode = false;
        self.status = Status::Idle;
    }
}
