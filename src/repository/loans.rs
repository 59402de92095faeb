//! Loan ledger and the atomic borrow / return units

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookStatus,
        ids::{BookId, MemberId},
        loan::{Checkout, FinePolicy, LoanRecord, ReturnReceipt},
        member::BorrowedBook,
        report::MemberLoanCount,
    },
};

use super::conflict_on_unique;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansRepository: Send + Sync {
    /// Open a loan: flip the book to `Borrowed`, record it on the member and
    /// append an open ledger row, all or nothing.
    ///
    /// Fails with `NotFound` when the book or member is unknown and with
    /// `Conflict` when the book is not available.
    async fn borrow(&self, checkout: &Checkout) -> AppResult<()>;

    /// Close the loan on `book_id`: flip the book back to `Available`, drop
    /// it from its borrower and close the borrower's open ledger row with the
    /// fine `policy` charges at `returned_on`, all or nothing.
    ///
    /// The loan is always settled against the book's `borrowed_by`, whoever
    /// brings it back. Fails with `NotFound` for an unknown book and
    /// `Conflict` when the book is not borrowed. A missing ledger row is
    /// tolerated and reported in the receipt.
    async fn return_book(
        &self,
        book_id: BookId,
        returned_on: DateTime<Utc>,
        policy: FinePolicy,
    ) -> AppResult<ReturnReceipt>;

    /// Ledger rows, newest first; `open` filters on open / closed rows
    async fn list(&self, open: Option<bool>) -> AppResult<Vec<LoanRecord>>;

    /// Ledger row counts per member, highest first, ties by earliest loan
    async fn count_by_member(&self, limit: i64) -> AppResult<Vec<MemberLoanCount>>;
}

pub(crate) fn book_not_found(id: BookId) -> AppError {
    AppError::NotFound(format!("Book {} not found", id))
}

pub(crate) fn member_not_found(id: MemberId) -> AppError {
    AppError::NotFound(format!("Member {} not found", id))
}

pub(crate) fn already_borrowed() -> AppError {
    AppError::Conflict("Book is already borrowed".to_string())
}

pub(crate) fn not_borrowed() -> AppError {
    AppError::Conflict("Book is not currently borrowed".to_string())
}

pub(crate) fn inconsistent_loan(id: BookId) -> AppError {
    AppError::Internal(format!("Borrowed book {} has no borrower or due date", id))
}

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansRepository for PgLoansRepository {
    async fn borrow(&self, checkout: &Checkout) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let status: Option<BookStatus> = sqlx::query_scalar("SELECT status FROM books WHERE id = $1")
            .bind(checkout.book_id)
            .fetch_optional(&mut *tx)
            .await?;
        let status = status.ok_or_else(|| book_not_found(checkout.book_id))?;

        let member_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
                .bind(checkout.member_id)
                .fetch_one(&mut *tx)
                .await?;
        if !member_exists {
            return Err(member_not_found(checkout.member_id));
        }

        if status == BookStatus::Borrowed {
            return Err(already_borrowed());
        }

        // Compare-and-set: only one concurrent borrower can flip the status
        let claimed = sqlx::query(
            r#"
            UPDATE books
            SET status = 'borrowed', borrowed_by = $2, due_date = $3, borrow_count = borrow_count + 1
            WHERE id = $1 AND status = 'available'
            "#,
        )
        .bind(checkout.book_id)
        .bind(checkout.member_id)
        .bind(checkout.due_date)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(already_borrowed());
        }

        let entry = BorrowedBook {
            book_id: checkout.book_id,
            borrowed_on: checkout.borrowed_on,
            due_date: checkout.due_date,
        };
        sqlx::query("UPDATE members SET borrowed_books = borrowed_books || $2 WHERE id = $1")
            .bind(checkout.member_id)
            .bind(Json(vec![entry]))
            .execute(&mut *tx)
            .await?;

        let record = checkout.open_record();
        sqlx::query(
            r#"
            INSERT INTO loans (id, book_id, member_id, borrowed_on, due_date, returned_on, fine)
            VALUES ($1, $2, $3, $4, $5, NULL, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.book_id)
        .bind(record.member_id)
        .bind(record.borrowed_on)
        .bind(record.due_date)
        .bind(record.fine)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "An open loan already exists for this book and member"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn return_book(
        &self,
        book_id: BookId,
        returned_on: DateTime<Utc>,
        policy: FinePolicy,
    ) -> AppResult<ReturnReceipt> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(BookStatus, Option<MemberId>, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT status, borrowed_by, due_date FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (status, borrower, due_date) = row.ok_or_else(|| book_not_found(book_id))?;
        if status != BookStatus::Borrowed {
            return Err(not_borrowed());
        }
        let (borrower, due_date) = borrower
            .zip(due_date)
            .ok_or_else(|| inconsistent_loan(book_id))?;

        let fine = policy.fine_for(due_date, returned_on);

        sqlx::query(
            "UPDATE books SET status = 'available', borrowed_by = NULL, due_date = NULL WHERE id = $1",
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE members SET borrowed_books = COALESCE(
                (SELECT jsonb_agg(entry ORDER BY position)
                 FROM jsonb_array_elements(borrowed_books) WITH ORDINALITY AS t(entry, position)
                 WHERE entry->>'bookId' <> $2),
                '[]'::jsonb)
            WHERE id = $1
            "#,
        )
        .bind(borrower)
        .bind(book_id.to_string())
        .execute(&mut *tx)
        .await?;

        let closed = sqlx::query(
            r#"
            UPDATE loans SET returned_on = $3, fine = $4
            WHERE book_id = $1 AND member_id = $2 AND returned_on IS NULL
            "#,
        )
        .bind(book_id)
        .bind(borrower)
        .bind(returned_on)
        .bind(fine)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ReturnReceipt {
            borrower,
            due_date,
            fine,
            ledger_closed: closed.rows_affected() > 0,
        })
    }

    async fn list(&self, open: Option<bool>) -> AppResult<Vec<LoanRecord>> {
        let loans = sqlx::query_as::<_, LoanRecord>(
            r#"
            SELECT * FROM loans
            WHERE $1::boolean IS NULL OR (returned_on IS NULL) = $1
            ORDER BY borrowed_on DESC, id
            "#,
        )
        .bind(open)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn count_by_member(&self, limit: i64) -> AppResult<Vec<MemberLoanCount>> {
        let counts = sqlx::query_as::<_, MemberLoanCount>(
            r#"
            SELECT member_id, COUNT(*) AS borrow_count
            FROM loans
            GROUP BY member_id
            ORDER BY borrow_count DESC, MIN(borrowed_on) ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}
