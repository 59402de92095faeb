//! Data models for Libris

pub mod book;
pub mod ids;
pub mod loan;
pub mod member;
pub mod report;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookStatus};
pub use ids::{BookId, LoanId, MemberId, UserId};
pub use loan::{FinePolicy, LoanDays, LoanRecord};
pub use member::{BorrowedBook, Member};
pub use user::{PublicUser, Role, User};
