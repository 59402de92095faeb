//! Member model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::ids::{BookId, MemberId};

/// Role assigned to members created without one
pub const DEFAULT_MEMBER_ROLE: &str = "student";

/// One open loan as seen from the member record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowedBook {
    pub book_id: BookId,
    pub borrowed_on: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Library member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Open loans in borrow order, one entry per book
    pub borrowed_books: Vec<BorrowedBook>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn push_loan(&mut self, entry: BorrowedBook) {
        self.borrowed_books.push(entry);
    }

    /// Drop the entry for `book_id`; returns whether one was present.
    pub fn remove_loan(&mut self, book_id: BookId) -> bool {
        let before = self.borrowed_books.len();
        self.borrowed_books.retain(|entry| entry.book_id != book_id);
        self.borrowed_books.len() != before
    }
}

/// Create member request
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Validated fields of a member about to be inserted
#[derive(Debug, Clone)]
pub struct NewMember {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl NewMember {
    pub fn into_member(self) -> Member {
        Member {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            borrowed_books: Vec::new(),
            created_at: self.created_at,
        }
    }
}

/// Update member request (partial merge)
#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    pub id: Option<String>,
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<String>,
}

impl UpdateMember {
    /// Merge the supplied fields into `member`, leaving the rest untouched.
    pub fn apply(&self, member: &mut Member) {
        if let Some(ref name) = self.name {
            member.name = name.clone();
        }
        if let Some(ref email) = self.email {
            member.email = email.clone();
        }
        if let Some(ref role) = self.role {
            member.role = role.clone();
        }
    }
}

/// Normalize an email for storage and uniqueness checks
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_loan_matches_by_book() {
        let now = Utc::now();
        let kept = BookId::new();
        let returned = BookId::new();
        let mut member = NewMember {
            id: MemberId::new(),
            name: "Alice".into(),
            email: "a@x.com".into(),
            role: DEFAULT_MEMBER_ROLE.into(),
            created_at: now,
        }
        .into_member();
        member.push_loan(BorrowedBook {
            book_id: kept,
            borrowed_on: now,
            due_date: now,
        });
        member.push_loan(BorrowedBook {
            book_id: returned,
            borrowed_on: now,
            due_date: now,
        });

        assert!(member.remove_loan(returned));
        assert!(!member.remove_loan(returned));
        assert_eq!(member.borrowed_books.len(), 1);
        assert_eq!(member.borrowed_books[0].book_id, kept);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
