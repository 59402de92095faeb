//! In-memory stores.
//!
//! Every store lives behind one lock, so borrow and return observe and
//! mutate books, members and the ledger as a single unit just like the
//! Postgres transaction does. Data is lost on restart.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, NewBook, UpdateBook},
        ids::{BookId, MemberId, UserId},
        loan::{Checkout, FinePolicy, LoanRecord, ReturnReceipt},
        member::{BorrowedBook, Member, NewMember, UpdateMember},
        report::MemberLoanCount,
        user::{NewUser, User},
    },
};

use super::{
    books::BooksRepository,
    loans::{
        already_borrowed, book_not_found, inconsistent_loan, member_not_found, not_borrowed,
        LoansRepository,
    },
    members::MembersRepository,
    users::UsersRepository,
};

/// Records kept in insertion order
#[derive(Debug, Default)]
struct MemoryState {
    books: Vec<Book>,
    members: Vec<Member>,
    users: Vec<User>,
    loans: Vec<LoanRecord>,
}

impl MemoryState {
    fn book_mut(&mut self, id: BookId) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.id == id)
    }

    fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn member_email_taken(&self, email: &str, exclude: Option<MemberId>) -> bool {
        self.members
            .iter()
            .any(|m| m.email.eq_ignore_ascii_case(email) && Some(m.id) != exclude)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        Ok(state.books.iter().rev().cloned().collect())
    }

    async fn get_by_id(&self, id: BookId) -> AppResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.books.iter().find(|b| b.id == id).cloned())
    }

    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let book = book.into_book();
        self.state.write().await.books.push(book.clone());
        Ok(book)
    }

    async fn update(&self, id: BookId, update: &UpdateBook) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        Ok(state.book_mut(id).map(|book| {
            update.apply(book);
            book.clone()
        }))
    }

    async fn delete_available(&self, id: BookId) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        let position = state.books.iter().position(|b| b.id == id && !b.is_borrowed());
        Ok(position.map(|i| state.books.remove(i)))
    }

    async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        let mut books = state.books.clone();
        // stable sort keeps creation order among equal counts
        books.sort_by(|a, b| b.borrow_count.cmp(&a.borrow_count));
        books.truncate(limit.max(0) as usize);
        Ok(books)
    }
}

#[async_trait]
impl MembersRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Member>> {
        Ok(self.state.read().await.members.clone())
    }

    async fn get_by_id(&self, id: MemberId) -> AppResult<Option<Member>> {
        let state = self.state.read().await;
        Ok(state.members.iter().find(|m| m.id == id).cloned())
    }

    async fn get_many(&self, ids: &[MemberId]) -> AppResult<Vec<Member>> {
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn email_exists(&self, email: &str, exclude: Option<MemberId>) -> AppResult<bool> {
        Ok(self.state.read().await.member_email_taken(email, exclude))
    }

    async fn create(&self, member: NewMember) -> AppResult<Member> {
        let mut state = self.state.write().await;
        if state.member_email_taken(&member.email, None) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        let member = member.into_member();
        state.members.push(member.clone());
        Ok(member)
    }

    async fn update(&self, id: MemberId, update: &UpdateMember) -> AppResult<Option<Member>> {
        let mut state = self.state.write().await;
        if let Some(ref email) = update.email {
            if state.member_email_taken(email, Some(id)) {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
        Ok(state.member_mut(id).map(|member| {
            update.apply(member);
            member.clone()
        }))
    }

    async fn delete(&self, id: MemberId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let before = state.members.len();
        state.members.retain(|m| m.id != id);
        Ok(state.members.len() != before)
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        let user = user.into_user();
        state.users.push(user.clone());
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.iter().any(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn admin_exists(&self) -> AppResult<bool> {
        Ok(self.state.read().await.users.iter().any(User::is_admin))
    }

    async fn set_session(&self, id: UserId, token_hash: &str, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.user_mut(id) {
            user.token_hash = Some(token_hash.to_string());
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn clear_session(&self, id: UserId) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.user_mut(id) {
            user.token_hash = None;
        }
        Ok(())
    }
}

#[async_trait]
impl LoansRepository for MemoryStore {
    async fn borrow(&self, checkout: &Checkout) -> AppResult<()> {
        let mut state = self.state.write().await;

        let available = state
            .books
            .iter()
            .find(|b| b.id == checkout.book_id)
            .map(|b| !b.is_borrowed())
            .ok_or_else(|| book_not_found(checkout.book_id))?;
        if state.member_mut(checkout.member_id).is_none() {
            return Err(member_not_found(checkout.member_id));
        }
        if !available {
            return Err(already_borrowed());
        }

        if let Some(book) = state.book_mut(checkout.book_id) {
            book.check_out(checkout.member_id, checkout.due_date);
        }
        if let Some(member) = state.member_mut(checkout.member_id) {
            member.push_loan(BorrowedBook {
                book_id: checkout.book_id,
                borrowed_on: checkout.borrowed_on,
                due_date: checkout.due_date,
            });
        }
        state.loans.push(checkout.open_record());

        Ok(())
    }

    async fn return_book(
        &self,
        book_id: BookId,
        returned_on: DateTime<Utc>,
        policy: FinePolicy,
    ) -> AppResult<ReturnReceipt> {
        let mut state = self.state.write().await;

        let book = state.book_mut(book_id).ok_or_else(|| book_not_found(book_id))?;
        if !book.is_borrowed() {
            return Err(not_borrowed());
        }
        let (borrower, due_date) = book
            .borrowed_by
            .zip(book.due_date)
            .ok_or_else(|| inconsistent_loan(book_id))?;
        let fine = policy.fine_for(due_date, returned_on);
        book.check_in();

        if let Some(member) = state.member_mut(borrower) {
            member.remove_loan(book_id);
        }

        let open = state
            .loans
            .iter_mut()
            .find(|l| l.book_id == book_id && l.member_id == borrower && l.is_open());
        let ledger_closed = match open {
            Some(loan) => {
                loan.returned_on = Some(returned_on);
                loan.fine = fine;
                true
            }
            None => false,
        };

        Ok(ReturnReceipt {
            borrower,
            due_date,
            fine,
            ledger_closed,
        })
    }

    async fn list(&self, open: Option<bool>) -> AppResult<Vec<LoanRecord>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .iter()
            .rev()
            .filter(|l| open.map_or(true, |want_open| l.is_open() == want_open))
            .cloned()
            .collect())
    }

    async fn count_by_member(&self, limit: i64) -> AppResult<Vec<MemberLoanCount>> {
        let state = self.state.read().await;
        let mut order: Vec<MemberId> = Vec::new();
        let mut counts: HashMap<MemberId, i64> = HashMap::new();
        for loan in &state.loans {
            let count = counts.entry(loan.member_id).or_insert_with(|| {
                order.push(loan.member_id);
                0
            });
            *count += 1;
        }

        let mut grouped: Vec<MemberLoanCount> = order
            .into_iter()
            .map(|member_id| MemberLoanCount {
                member_id,
                borrow_count: counts[&member_id],
            })
            .collect();
        grouped.sort_by(|a, b| b.borrow_count.cmp(&a.borrow_count));
        grouped.truncate(limit.max(0) as usize);
        Ok(grouped)
    }
}
