use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BookRepository, StorageError};
use crate::modules::books::models::{Book, BookPatch, NewBook};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    books: BTreeMap<i32, Book>,
    failure: Option<String>,
}

impl MemoryState {
    fn check(&self) -> Result<(), StorageError> {
        match &self.failure {
            Some(message) => Err(StorageError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

/// Process-local book store with the same ordering and matching rules as
/// the PostgreSQL repository, for exercising the routes without a database.
#[derive(Debug, Default)]
pub struct MemoryBookRepository {
    state: Mutex<MemoryState>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `message` until cleared.
    pub async fn fail_with(&self, message: Option<&str>) {
        self.state.lock().await.failure = message.map(str::to_string);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.books.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn insert(&self, book: NewBook) -> Result<Book, StorageError> {
        let mut state = self.state.lock().await;
        state.check()?;

        state.next_id += 1;
        let row = Book {
            id: state.next_id,
            title: book.title,
            author: book.author,
            genre: book.genre,
            year_published: book.year_published,
            available_copies: Some(book.available_copies),
        };
        state.books.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Book>, StorageError> {
        let state = self.state.lock().await;
        state.check()?;
        Ok(state.books.values().rev().cloned().collect())
    }

    async fn find(&self, id: i32) -> Result<Option<Book>, StorageError> {
        let state = self.state.lock().await;
        state.check()?;
        Ok(state.books.get(&id).cloned())
    }

    async fn update(&self, id: i32, patch: BookPatch) -> Result<Option<Book>, StorageError> {
        let mut state = self.state.lock().await;
        state.check()?;

        Ok(state.books.get_mut(&id).map(|book| {
            patch.apply(book);
            book.clone()
        }))
    }

    async fn delete(&self, id: i32) -> Result<Option<Book>, StorageError> {
        let mut state = self.state.lock().await;
        state.check()?;
        Ok(state.books.remove(&id))
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>, StorageError> {
        let state = self.state.lock().await;
        state.check()?;

        let needle = query.to_lowercase();
        let mut matches: Vec<Book> = state
            .books
            .values()
            .filter(|book| {
                book.title.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book(title: &str, author: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: author.to_string(),
            genre: None,
            year_published: None,
            available_copies: 1,
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_and_listed_newest_first() {
        let repo = MemoryBookRepository::new();
        let first = repo.insert(new_book("Dune", "Herbert")).await.unwrap();
        let second = repo.insert(new_book("Emma", "Austen")).await.unwrap();

        assert!(second.id > first.id);
        let ids: Vec<i32> = repo.list().await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let repo = MemoryBookRepository::new();
        let first = repo.insert(new_book("Dune", "Herbert")).await.unwrap();
        repo.delete(first.id).await.unwrap();

        let second = repo.insert(new_book("Dune", "Herbert")).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn search_matches_title_or_author_ignoring_case() {
        let repo = MemoryBookRepository::new();
        repo.insert(new_book("The Hobbit", "Tolkien")).await.unwrap();
        repo.insert(new_book("Anathem", "Stephenson")).await.unwrap();
        repo.insert(new_book("Silmarillion", "J.R.R. TOLKIEN")).await.unwrap();

        for query in ["hobbit", "HOBBIT", "Hob"] {
            let found = repo.search(query).await.unwrap();
            assert_eq!(found.len(), 1, "query {query}");
            assert_eq!(found[0].title, "The Hobbit");
        }

        let titles: Vec<String> = repo
            .search("tolkien")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Silmarillion", "The Hobbit"]);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_none() {
        let repo = MemoryBookRepository::new();
        assert!(repo.update(42, BookPatch::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failure_is_reported() {
        let repo = MemoryBookRepository::new();
        repo.fail_with(Some("connection refused")).await;

        let err = repo.list().await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");

        repo.fail_with(None).await;
        assert!(repo.list().await.unwrap().is_empty());
    }
}
