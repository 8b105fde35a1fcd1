pub mod models;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use once_cell::sync::OnceCell;
use serde_json::json;
use shelf_kernel::{InitCtx, Module};
use shelf_telemetry::Instrumentation;

use repository::{BookRepository, PgBookRepository};
use routes::BooksState;

/// The `/books` resource: CRUD plus search over the `books` table.
pub struct BooksModule {
    state: OnceCell<BooksState>,
}

impl BooksModule {
    /// Module that builds its PostgreSQL repository during `init`.
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }

    /// Module with its storage and instrumentation already in place; `init`
    /// leaves them untouched.
    pub fn with_repository(
        repository: Arc<dyn BookRepository>,
        instrumentation: Instrumentation,
    ) -> Self {
        Self {
            state: OnceCell::with_value(BooksState {
                repository,
                instrumentation,
            }),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let mut created = false;
        self.state.get_or_init(|| {
            created = true;
            BooksState {
                repository: Arc::new(PgBookRepository::new(ctx.db.clone())),
                instrumentation: ctx.instrumentation.clone(),
            }
        });

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            storage = if created { "postgresql" } else { "preset" },
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.state.get() {
            Some(state) => routes::router(state.clone()),
            None => {
                tracing::error!(module = self.name(), "routes requested before init, mounting nothing");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}

fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn json_response(description: &str, schema: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn id_parameter() -> serde_json::Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer" }
    })
}

fn openapi_fragment() -> serde_json::Value {
    let security = json!([{ "bearerAuth": [] }]);

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books, newest first",
                    "tags": ["Books"],
                    "security": security,
                    "responses": {
                        "200": json_response("All books", "BookList"),
                        "401": error_response("Missing or invalid token"),
                        "500": error_response("Failed to fetch books")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "security": security,
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/CreateBook" }
                            }
                        }
                    },
                    "responses": {
                        "201": json_response("Book created", "BookMessage"),
                        "400": error_response("Title and author are required"),
                        "401": error_response("Missing or invalid token"),
                        "500": error_response("Failed to create book")
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get a book by id",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": json_response("The book", "Book"),
                        "400": error_response("Invalid book ID"),
                        "404": error_response("Book not found"),
                        "500": error_response("Failed to fetch book")
                    }
                },
                "put": {
                    "summary": "Update the supplied fields of a book",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [id_parameter()],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/UpdateBook" }
                            }
                        }
                    },
                    "responses": {
                        "200": json_response("Book updated", "BookMessage"),
                        "400": error_response("Invalid book ID"),
                        "404": error_response("Book not found"),
                        "500": error_response("Failed to update book")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [id_parameter()],
                    "responses": {
                        "200": json_response("Book deleted", "BookMessage"),
                        "400": error_response("Invalid book ID"),
                        "404": error_response("Book not found"),
                        "500": error_response("Failed to delete book")
                    }
                }
            },
            "/search/{query}": {
                "get": {
                    "summary": "Case-insensitive search on title or author",
                    "tags": ["Books"],
                    "security": security,
                    "parameters": [{
                        "name": "query",
                        "in": "path",
                        "required": true,
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "200": json_response("Matching books ordered by title", "SearchResults"),
                        "500": error_response("Failed to search books")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "genre": { "type": ["string", "null"] },
                        "year_published": { "type": ["integer", "null"] },
                        "available_copies": { "type": ["integer", "null"] }
                    },
                    "required": ["id", "title", "author"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "genre": { "type": "string" },
                        "year_published": { "type": "integer" },
                        "available_copies": { "type": "integer", "default": 1 }
                    },
                    "required": ["title", "author"]
                },
                "UpdateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "genre": { "type": "string" },
                        "year_published": { "type": "integer" },
                        "available_copies": { "type": "integer" }
                    }
                },
                "BookMessage": {
                    "type": "object",
                    "properties": {
                        "message": { "type": "string" },
                        "book": { "$ref": "#/components/schemas/Book" }
                    },
                    "required": ["message", "book"]
                },
                "BookList": {
                    "type": "object",
                    "properties": {
                        "count": { "type": "integer" },
                        "books": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
                    },
                    "required": ["count", "books"]
                },
                "SearchResults": {
                    "type": "object",
                    "properties": {
                        "count": { "type": "integer" },
                        "query": { "type": "string" },
                        "books": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
                    },
                    "required": ["count", "query", "books"]
                }
            }
        }
    })
}
