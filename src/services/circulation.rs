//! Circulation service: borrowing and returning books

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    config::CirculationConfig,
    error::AppResult,
    models::{
        ids::{BookId, MemberId},
        loan::{Checkout, FinePolicy, LoanDays, LoanRecord},
    },
    repository::Repository,
    services::clock::Clock,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    default_loan_days: i64,
    max_loan_days: i64,
    fine_policy: FinePolicy,
}

impl CirculationService {
    pub fn new(repository: Repository, config: &CirculationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            default_loan_days: config.default_loan_days,
            max_loan_days: config.max_loan_days,
            fine_policy: FinePolicy::new(config.fine_per_day),
        }
    }

    /// Coerce a client-supplied loan length, falling back to the configured default
    pub fn loan_days(&self, value: Option<&serde_json::Value>) -> LoanDays {
        LoanDays::coerce(value, self.default_loan_days, self.max_loan_days)
    }

    /// Lend `book_id` to `member_id` and return the due date
    pub async fn borrow(
        &self,
        book_id: BookId,
        member_id: MemberId,
        days: LoanDays,
    ) -> AppResult<DateTime<Utc>> {
        let now = self.clock.now();
        let checkout = Checkout {
            book_id,
            member_id,
            borrowed_on: now,
            due_date: days.due_from(now)?,
        };

        self.repository.loans.borrow(&checkout).await?;

        tracing::info!(
            "Circulation: book {} lent to member {} for {} day(s), due {}",
            book_id,
            member_id,
            days.days(),
            checkout.due_date
        );

        Ok(checkout.due_date)
    }

    /// Take `book_id` back and return the late fine charged.
    ///
    /// The loan is settled against the member holding the book, even when
    /// `member_id` names someone else.
    pub async fn return_book(&self, book_id: BookId, member_id: MemberId) -> AppResult<Decimal> {
        let receipt = self
            .repository
            .loans
            .return_book(book_id, self.clock.now(), self.fine_policy)
            .await?;

        if receipt.borrower != member_id {
            tracing::warn!(
                "Circulation: book {} returned under member {} but was lent to member {}",
                book_id,
                member_id,
                receipt.borrower
            );
        }
        if !receipt.ledger_closed {
            tracing::warn!(
                "Circulation: no open ledger entry for book {} and member {}; book returned anyway",
                book_id,
                receipt.borrower
            );
        }

        tracing::info!(
            "Circulation: book {} returned by member {}, fine {}",
            book_id,
            receipt.borrower,
            receipt.fine
        );

        Ok(receipt.fine)
    }

    /// Ledger rows, newest first
    pub async fn list_loans(&self, open: Option<bool>) -> AppResult<Vec<LoanRecord>> {
        self.repository.loans.list(open).await
    }
}
