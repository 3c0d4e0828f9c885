use crate::domain::{Book, BookCopy, BookId, CopyId};
use crate::ports::catalog_store::{CatalogStore as CatalogStoreTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::guard;

/// In-memory implementation of CatalogStore
#[derive(Default)]
pub struct CatalogStore {
    pub(super) books: Mutex<HashMap<BookId, Book>>,
    pub(super) copies: Mutex<HashMap<CopyId, BookCopy>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a book (seeding helper)
    pub fn add_book(&self, book: Book) -> Result<()> {
        guard(&self.books)?.insert(book.book_id, book);
        Ok(())
    }

    /// Register a copy (seeding helper)
    pub fn add_copy(&self, copy: BookCopy) -> Result<()> {
        guard(&self.copies)?.insert(copy.copy_id, copy);
        Ok(())
    }
}

#[async_trait]
impl CatalogStoreTrait for CatalogStore {
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(guard(&self.books)?.get(&book_id).cloned())
    }

    async fn save_book(&self, book: Book) -> Result<()> {
        self.add_book(book)
    }

    async fn get_copy(&self, copy_id: CopyId) -> Result<Option<BookCopy>> {
        Ok(guard(&self.copies)?.get(&copy_id).cloned())
    }

    async fn save_copy(&self, copy: BookCopy) -> Result<()> {
        self.add_copy(copy)
    }

    async fn copies_of_book(&self, book_id: BookId) -> Result<Vec<BookCopy>> {
        let mut copies: Vec<BookCopy> = guard(&self.copies)?
            .values()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        copies.sort_by_key(|c| c.copy_id);
        Ok(copies)
    }
}
