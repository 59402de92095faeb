//! Loan ledger model and fine computation

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

use super::ids::{BookId, LoanId, MemberId};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// One row of the loan ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanRecord {
    pub id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub borrowed_on: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Absent while the loan is open
    pub returned_on: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine: Decimal,
}

impl LoanRecord {
    pub fn is_open(&self) -> bool {
        self.returned_on.is_none()
    }
}

/// Everything needed to open a loan
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub book_id: BookId,
    pub member_id: MemberId,
    pub borrowed_on: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl Checkout {
    pub fn open_record(&self) -> LoanRecord {
        LoanRecord {
            id: LoanId::new(),
            book_id: self.book_id,
            member_id: self.member_id,
            borrowed_on: self.borrowed_on,
            due_date: self.due_date,
            returned_on: None,
            fine: Decimal::ZERO,
        }
    }
}

/// Outcome of closing a loan
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnReceipt {
    /// Member the book was lent to
    pub borrower: MemberId,
    pub due_date: DateTime<Utc>,
    pub fine: Decimal,
    /// False when the borrower had no open ledger row for the book
    pub ledger_closed: bool,
}

/// Loan length in whole days.
///
/// Clients may send a number, a numeric string or nothing at all. Anything
/// that does not yield a positive integer no greater than `max_days` falls
/// back to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanDays(i64);

impl LoanDays {
    pub fn coerce(value: Option<&serde_json::Value>, default_days: i64, max_days: i64) -> Self {
        let parsed = match value {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Some(serde_json::Value::String(s)) => leading_integer(s),
            _ => None,
        };
        match parsed {
            Some(days) if days > 0 && days <= max_days => Self(days),
            _ => Self(default_days),
        }
    }

    pub fn days(&self) -> i64 {
        self.0
    }

    pub fn due_from(&self, start: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        Duration::try_days(self.0)
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| AppError::Validation(format!("Loan length of {} days is out of range", self.0)))
    }
}

/// Integer prefix of a string ("12 days" -> 12), ignoring leading whitespace
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Late-return fine schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinePolicy {
    pub per_day: Decimal,
}

impl FinePolicy {
    pub fn new(per_day: Decimal) -> Self {
        Self { per_day }
    }

    /// Whole days late, rounding any partial day up.
    pub fn days_late(due: DateTime<Utc>, returned_on: DateTime<Utc>) -> i64 {
        let late_ms = (returned_on - due).num_milliseconds();
        if late_ms <= 0 {
            return 0;
        }
        (late_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }

    pub fn fine_for(&self, due: DateTime<Utc>, returned_on: DateTime<Utc>) -> Decimal {
        self.per_day * Decimal::from(Self::days_late(due, returned_on))
    }
}

impl Default for FinePolicy {
    fn default() -> Self {
        Self::new(Decimal::from(5))
    }
}
