//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, NewBook, UpdateBook, DEFAULT_GENRE},
        ids::BookId,
    },
    repository::Repository,
    services::{clock::Clock, non_blank, required, uploads::UploadsService},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    uploads: UploadsService,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(repository: Repository, uploads: UploadsService, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            uploads,
            clock,
        }
    }

    /// All books, newest first
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: BookId) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Create a new book; title and author are mandatory
    pub async fn create_book(&self, request: CreateBook) -> AppResult<Book> {
        let title = required(request.title.as_deref(), "title")?;
        let author = required(request.author.as_deref(), "author")?;
        request.validate()?;

        let book = NewBook {
            id: BookId::new(),
            title: title.to_string(),
            author: author.to_string(),
            genre: non_blank(request.genre.as_deref())
                .unwrap_or(DEFAULT_GENRE)
                .to_string(),
            year: request.year,
            isbn: non_blank(request.isbn.as_deref()).map(str::to_string),
            cover: non_blank(request.cover.as_deref())
                .unwrap_or(self.uploads.default_cover())
                .to_string(),
            created_at: self.clock.now(),
        };

        let created = self.repository.books.create(book).await?;
        tracing::info!("Catalog: created book {} ({})", created.id, created.title);
        Ok(created)
    }

    /// Merge the supplied fields into an existing book
    pub async fn update_book(&self, request: UpdateBook) -> AppResult<Book> {
        let id = BookId::parse_field(request.id.as_deref(), "id")?;
        request.validate()?;
        for (field, value) in [("title", &request.title), ("author", &request.author)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(AppError::Validation(format!("{} cannot be empty", field)));
            }
        }

        let previous = self.get_book(id).await?;
        if request.is_empty() {
            return Ok(previous);
        }

        let updated = self
            .repository
            .books
            .update(id, &request)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

        if updated.cover != previous.cover {
            self.uploads.remove_cover(&previous.cover).await;
        }

        Ok(updated)
    }

    /// Delete a book that is not on loan, then drop its uploaded cover
    pub async fn delete_book(&self, raw_id: &str) -> AppResult<Book> {
        let id = BookId::parse_field(Some(raw_id), "id")?;
        let book = self.get_book(id).await?;
        if book.is_borrowed() {
            return Err(AppError::Conflict("Cannot delete a borrowed book".to_string()));
        }

        let deleted = self
            .repository
            .books
            .delete_available(id)
            .await?
            .ok_or_else(|| AppError::Conflict("Cannot delete a borrowed book".to_string()))?;

        self.uploads.remove_cover(&deleted.cover).await;
        tracing::info!("Catalog: deleted book {}", id);

        Ok(deleted)
    }
}
