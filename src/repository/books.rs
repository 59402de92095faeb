//! Catalog store

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, NewBook, UpdateBook},
        ids::BookId,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksRepository: Send + Sync {
    /// All books, most recently created first
    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn get_by_id(&self, id: BookId) -> AppResult<Option<Book>>;

    async fn create(&self, book: NewBook) -> AppResult<Book>;

    /// Merge supplied fields; `None` when the id does not resolve
    async fn update(&self, id: BookId, update: &UpdateBook) -> AppResult<Option<Book>>;

    /// Delete the book unless it is currently borrowed.
    /// Returns the removed record, `None` if nothing was removed.
    async fn delete_available(&self, id: BookId) -> AppResult<Option<Book>>;

    /// Books by lifetime borrow count, ties in creation order
    async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<Book>>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn get_by_id(&self, id: BookId) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, genre, year, isbn, cover, status, borrow_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'available', 0, $8)
            RETURNING *
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(book.year)
        .bind(&book.isbn)
        .bind(&book.cover)
        .bind(book.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: BookId, update: &UpdateBook) -> AppResult<Option<Book>> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title  = COALESCE($2, title),
                author = COALESCE($3, author),
                genre  = COALESCE($4, genre),
                year   = CASE WHEN $5 THEN $6 ELSE year END,
                isbn   = CASE WHEN $7 THEN $8 ELSE isbn END,
                cover  = COALESCE($9, cover)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.genre)
        .bind(update.year.is_some())
        .bind(update.year.flatten())
        .bind(update.isbn.is_some())
        .bind(update.isbn.clone().flatten())
        .bind(&update.cover)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete_available(&self, id: BookId) -> AppResult<Option<Book>> {
        let deleted = sqlx::query_as::<_, Book>(
            "DELETE FROM books WHERE id = $1 AND status = 'available' RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deleted)
    }

    async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            ORDER BY borrow_count DESC, created_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }
}
