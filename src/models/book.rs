//! Book (catalog entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use super::ids::{BookId, MemberId};

/// Genre used when a book is created without one
pub const DEFAULT_GENRE: &str = "Unknown";

/// Circulation status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

// SQLx conversion for BookStatus (stored as TEXT)
impl sqlx::Type<Postgres> for BookStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BookStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    /// Cover image URI (placeholder unless an upload was attached)
    pub cover: String,
    pub status: BookStatus,
    /// Present exactly when `status` is `Borrowed`
    pub borrowed_by: Option<MemberId>,
    /// Present exactly when `status` is `Borrowed`
    pub due_date: Option<DateTime<Utc>>,
    /// Lifetime number of loans; never decremented
    pub borrow_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn is_borrowed(&self) -> bool {
        self.status == BookStatus::Borrowed
    }

    /// Transition to `Borrowed` for `member_id` until `due_date`.
    pub fn check_out(&mut self, member_id: MemberId, due_date: DateTime<Utc>) {
        self.status = BookStatus::Borrowed;
        self.borrowed_by = Some(member_id);
        self.due_date = Some(due_date);
        self.borrow_count += 1;
    }

    /// Transition back to `Available`; the lifetime counter is kept.
    pub fn check_in(&mut self) {
        self.status = BookStatus::Available;
        self.borrowed_by = None;
        self.due_date = None;
    }
}

/// Create book request
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    #[validate(range(min = 0, max = 9999, message = "Year must be between 0 and 9999"))]
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub cover: Option<String>,
}

/// Validated fields of a book about to be inserted
#[derive(Debug, Clone)]
pub struct NewBook {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub cover: String,
    pub created_at: DateTime<Utc>,
}

impl NewBook {
    pub fn into_book(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            genre: self.genre,
            year: self.year,
            isbn: self.isbn,
            cover: self.cover,
            status: BookStatus::Available,
            borrowed_by: None,
            due_date: None,
            borrow_count: 0,
            created_at: self.created_at,
        }
    }
}

/// Update book request.
///
/// Every field is optional and only supplied fields are merged. `year` and
/// `isbn` distinguish "absent" (keep) from `null` (clear).
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    pub id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    #[validate(range(min = 0, max = 9999, message = "Year must be between 0 and 9999"))]
    pub year: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub isbn: Option<Option<String>>,
    pub cover: Option<String>,
}

impl UpdateBook {
    /// Merge the supplied fields into `book`, leaving the rest untouched.
    pub fn apply(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref genre) = self.genre {
            book.genre = genre.clone();
        }
        if let Some(year) = self.year {
            book.year = year;
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(ref cover) = self.cover {
            book.cover = cover.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.genre.is_none()
            && self.year.is_none()
            && self.isbn.is_none()
            && self.cover.is_none()
    }
}
