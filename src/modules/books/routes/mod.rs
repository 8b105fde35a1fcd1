//! HTTP handlers for `/books`.
//!
//! Each handler validates its input, runs exactly one repository call inside
//! a traced storage span, bumps the operation counter, and shapes the JSON
//! response. Storage failures become 500s with the driver message as details.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use opentelemetry::KeyValue;
use shelf_http::AppError;
use shelf_telemetry::{Instrumentation, OperationStatus};

use super::{
    models::{
        Book, BookList, BookMessage, CreateBookRequest, SearchResults, UpdateBookRequest,
    },
    repository::BookRepository,
};

const TITLE_AND_AUTHOR_REQUIRED: &str = "Title and author are required";
const INVALID_BOOK_ID: &str = "Invalid book ID";
const BOOK_NOT_FOUND: &str = "Book not found";

/// Shared by every books handler.
#[derive(Clone)]
pub struct BooksState {
    pub repository: Arc<dyn BookRepository>,
    pub instrumentation: Instrumentation,
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/search/{query}", get(search_books))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(state)
}

/// Span attributes shared by every storage call, plus the call's own.
fn db_attributes(operation: &'static str, extra: impl IntoIterator<Item = KeyValue>) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new("db.operation", operation),
        KeyValue::new("db.table", "books"),
        KeyValue::new("db.system", "postgresql"),
    ];
    attributes.extend(extra);
    attributes
}

/// Ids are whole integers; anything else is a client error.
fn parse_id(raw: &str, operation: &'static str) -> Result<i32, AppError> {
    raw.parse::<i32>().map_err(|_| {
        tracing::warn!(operation, id = %raw, "invalid book ID provided");
        AppError::bad_request(INVALID_BOOK_ID)
    })
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>, operation: &'static str) -> Result<T, AppError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::warn!(operation, error = %rejection.body_text(), "invalid request body");
            Err(AppError::bad_request_with(
                "Invalid request body",
                rejection.body_text(),
            ))
        }
    }
}

async fn create_book(
    State(state): State<BooksState>,
    body: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookMessage>), AppError> {
    let request = json_body(body, "CREATE_BOOK")?;

    tracing::info!(
        operation = "CREATE_BOOK",
        title = ?request.title,
        author = ?request.author,
        "creating new book"
    );

    let Some(new_book) = request.into_new_book() else {
        tracing::warn!(operation = "CREATE_BOOK_VALIDATION_ERROR", "title and author are required");
        return Err(AppError::bad_request(TITLE_AND_AUTHOR_REQUIRED));
    };

    let attributes = db_attributes(
        "INSERT",
        [
            KeyValue::new("book.title", new_book.title.clone()),
            KeyValue::new("book.author", new_book.author.clone()),
        ],
    );
    let title = new_book.title.clone();
    let author = new_book.author.clone();

    let result = state
        .instrumentation
        .execute("db.insert.books", attributes, state.repository.insert(new_book))
        .await;

    match result {
        Ok(book) => {
            state.instrumentation.count("create", OperationStatus::Success);
            tracing::info!(
                operation = "CREATE_BOOK_SUCCESS",
                book_id = book.id,
                title = %book.title,
                author = %book.author,
                "book created successfully"
            );
            Ok((
                StatusCode::CREATED,
                Json(BookMessage {
                    message: "Book created successfully".to_string(),
                    book,
                }),
            ))
        }
        Err(err) => {
            state.instrumentation.count("create", OperationStatus::Error);
            tracing::error!(
                operation = "CREATE_BOOK_ERROR",
                %title,
                %author,
                error = %err,
                "error creating book"
            );
            Err(AppError::storage("Failed to create book", err))
        }
    }
}

async fn list_books(State(state): State<BooksState>) -> Result<Json<BookList>, AppError> {
    tracing::info!(operation = "GET_ALL_BOOKS", "fetching all books");

    let result = state
        .instrumentation
        .execute(
            "db.select.books.all",
            db_attributes("SELECT", []),
            state.repository.list(),
        )
        .await;

    match result {
        Ok(books) => {
            state.instrumentation.count("read_all", OperationStatus::Success);
            tracing::info!(
                operation = "GET_ALL_BOOKS_SUCCESS",
                count = books.len(),
                "books fetched successfully"
            );
            Ok(Json(BookList {
                count: books.len(),
                books,
            }))
        }
        Err(err) => {
            state.instrumentation.count("read_all", OperationStatus::Error);
            tracing::error!(operation = "GET_ALL_BOOKS_ERROR", error = %err, "error fetching books");
            Err(AppError::storage("Failed to fetch books", err))
        }
    }
}

async fn get_book(
    State(state): State<BooksState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let id = parse_id(&raw_id, "GET_BOOK_BY_ID")?;

    tracing::info!(operation = "GET_BOOK_BY_ID", book_id = id, "fetching book by ID");

    let result = state
        .instrumentation
        .execute(
            "db.select.books.by_id",
            db_attributes("SELECT", [KeyValue::new("book.id", i64::from(id))]),
            state.repository.find(id),
        )
        .await;

    match result {
        Ok(Some(book)) => {
            state.instrumentation.count("read_one", OperationStatus::Success);
            tracing::info!(
                operation = "GET_BOOK_BY_ID_SUCCESS",
                book_id = id,
                title = %book.title,
                "book fetched successfully"
            );
            Ok(Json(book))
        }
        Ok(None) => {
            state.instrumentation.count("read_one", OperationStatus::NotFound);
            tracing::warn!(operation = "GET_BOOK_BY_ID_NOT_FOUND", book_id = id, "book not found");
            Err(AppError::not_found(BOOK_NOT_FOUND))
        }
        Err(err) => {
            state.instrumentation.count("read_one", OperationStatus::Error);
            tracing::error!(
                operation = "GET_BOOK_BY_ID_ERROR",
                book_id = id,
                error = %err,
                "error fetching book"
            );
            Err(AppError::storage("Failed to fetch book", err))
        }
    }
}

async fn update_book(
    State(state): State<BooksState>,
    Path(raw_id): Path<String>,
    body: Result<Json<UpdateBookRequest>, JsonRejection>,
) -> Result<Json<BookMessage>, AppError> {
    let id = parse_id(&raw_id, "UPDATE_BOOK")?;
    let request = json_body(body, "UPDATE_BOOK")?;

    tracing::info!(operation = "UPDATE_BOOK", book_id = id, "updating book");

    if request.has_blank_required_field() {
        tracing::warn!(operation = "UPDATE_BOOK_VALIDATION_ERROR", book_id = id, "blank title or author");
        return Err(AppError::bad_request(TITLE_AND_AUTHOR_REQUIRED));
    }

    let result = state
        .instrumentation
        .execute(
            "db.update.books",
            db_attributes("UPDATE", [KeyValue::new("book.id", i64::from(id))]),
            state.repository.update(id, request.into_patch()),
        )
        .await;

    match result {
        Ok(Some(book)) => {
            state.instrumentation.count("update", OperationStatus::Success);
            tracing::info!(
                operation = "UPDATE_BOOK_SUCCESS",
                book_id = id,
                title = %book.title,
                "book updated successfully"
            );
            Ok(Json(BookMessage {
                message: "Book updated successfully".to_string(),
                book,
            }))
        }
        Ok(None) => {
            state.instrumentation.count("update", OperationStatus::NotFound);
            tracing::warn!(operation = "UPDATE_BOOK_NOT_FOUND", book_id = id, "book not found for update");
            Err(AppError::not_found(BOOK_NOT_FOUND))
        }
        Err(err) => {
            state.instrumentation.count("update", OperationStatus::Error);
            tracing::error!(
                operation = "UPDATE_BOOK_ERROR",
                book_id = id,
                error = %err,
                "error updating book"
            );
            Err(AppError::storage("Failed to update book", err))
        }
    }
}

async fn delete_book(
    State(state): State<BooksState>,
    Path(raw_id): Path<String>,
) -> Result<Json<BookMessage>, AppError> {
    let id = parse_id(&raw_id, "DELETE_BOOK")?;

    tracing::info!(operation = "DELETE_BOOK", book_id = id, "deleting book");

    let result = state
        .instrumentation
        .execute(
            "db.delete.books",
            db_attributes("DELETE", [KeyValue::new("book.id", i64::from(id))]),
            state.repository.delete(id),
        )
        .await;

    match result {
        Ok(Some(book)) => {
            state.instrumentation.count("delete", OperationStatus::Success);
            tracing::info!(
                operation = "DELETE_BOOK_SUCCESS",
                book_id = id,
                title = %book.title,
                "book deleted successfully"
            );
            Ok(Json(BookMessage {
                message: "Book deleted successfully".to_string(),
                book,
            }))
        }
        Ok(None) => {
            state.instrumentation.count("delete", OperationStatus::NotFound);
            tracing::warn!(operation = "DELETE_BOOK_NOT_FOUND", book_id = id, "book not found for deletion");
            Err(AppError::not_found(BOOK_NOT_FOUND))
        }
        Err(err) => {
            state.instrumentation.count("delete", OperationStatus::Error);
            tracing::error!(
                operation = "DELETE_BOOK_ERROR",
                book_id = id,
                error = %err,
                "error deleting book"
            );
            Err(AppError::storage("Failed to delete book", err))
        }
    }
}

async fn search_books(
    State(state): State<BooksState>,
    Path(query): Path<String>,
) -> Result<Json<SearchResults>, AppError> {
    tracing::info!(operation = "SEARCH_BOOKS", search_query = %query, "searching books");

    let result = state
        .instrumentation
        .execute(
            "db.select.books.search",
            db_attributes("SELECT", [KeyValue::new("search.query", query.clone())]),
            state.repository.search(&query),
        )
        .await;

    match result {
        Ok(books) => {
            state.instrumentation.count("search", OperationStatus::Success);
            tracing::info!(
                operation = "SEARCH_BOOKS_SUCCESS",
                search_query = %query,
                results_count = books.len(),
                "search completed"
            );
            Ok(Json(SearchResults {
                count: books.len(),
                query,
                books,
            }))
        }
        Err(err) => {
            state.instrumentation.count("search", OperationStatus::Error);
            tracing::error!(
                operation = "SEARCH_BOOKS_ERROR",
                search_query = %query,
                error = %err,
                "error searching books"
            );
            Err(AppError::storage("Failed to search books", err))
        }
    }
}
