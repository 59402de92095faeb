//! Read-only aggregations over the catalog and the loan ledger

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::CirculationConfig,
    error::AppResult,
    models::{
        book::Book,
        loan::FinePolicy,
        report::{ActiveMember, OverdueLoan},
    },
    repository::Repository,
    services::clock::Clock,
};

pub const DEFAULT_REPORT_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    fine_policy: FinePolicy,
}

impl ReportsService {
    pub fn new(repository: Repository, config: &CirculationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            fine_policy: FinePolicy::new(config.fine_per_day),
        }
    }

    /// Books ordered by borrow count, ties in creation order
    pub async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<Book>> {
        self.repository.books.most_borrowed(limit.max(0)).await
    }

    /// Members with the most ledger rows, joined to their current record
    pub async fn active_members(&self, limit: i64) -> AppResult<Vec<ActiveMember>> {
        let counts = self.repository.loans.count_by_member(limit.max(0)).await?;
        if counts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<_> = counts.iter().map(|c| c.member_id).collect();
        let mut members: HashMap<_, _> = self
            .repository
            .members
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        Ok(counts
            .into_iter()
            .map(|count| ActiveMember {
                member_id: count.member_id,
                borrow_count: count.borrow_count,
                member: members.remove(&count.member_id),
            })
            .collect())
    }

    /// Open loans past their due date, most overdue first
    pub async fn overdue(&self) -> AppResult<Vec<OverdueLoan>> {
        let now = self.clock.now();
        let mut overdue: Vec<OverdueLoan> = self
            .repository
            .loans
            .list(Some(true))
            .await?
            .into_iter()
            .filter(|loan| loan.due_date < now)
            .map(|loan| OverdueLoan {
                days_late: FinePolicy::days_late(loan.due_date, now),
                fine: self.fine_policy.fine_for(loan.due_date, now),
                loan,
            })
            .collect();

        overdue.sort_by_key(|o| o.loan.due_date);
        Ok(overdue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            book::NewBook,
            ids::{BookId, MemberId},
            loan::{Checkout, LoanDays},
            member::NewMember,
            report::MemberLoanCount,
        },
        repository::{
            books::MockBooksRepository, loans::MockLoansRepository,
            members::MockMembersRepository, users::MockUsersRepository,
        },
        services::clock::ManualClock,
    };
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap())
    }

    fn reports(repository: Repository, clock: &ManualClock) -> ReportsService {
        ReportsService::new(repository, &CirculationConfig::default(), Arc::new(clock.clone()))
    }

    async fn add_book(repository: &Repository, clock: &ManualClock, title: &str) -> BookId {
        clock.advance(Duration::seconds(1));
        repository
            .books
            .create(NewBook {
                id: BookId::new(),
                title: title.into(),
                author: "Anon".into(),
                genre: "Unknown".into(),
                year: None,
                isbn: None,
                cover: "/images/placeholder-cover.svg".into(),
                created_at: clock.now(),
            })
            .await
            .unwrap()
            .id
    }

    async fn add_member(repository: &Repository, clock: &ManualClock, email: &str) -> MemberId {
        repository
            .members
            .create(NewMember {
                id: MemberId::new(),
                name: email.into(),
                email: email.into(),
                role: "student".into(),
                created_at: clock.now(),
            })
            .await
            .unwrap()
            .id
    }

    async fn lend(repository: &Repository, clock: &ManualClock, book: BookId, member: MemberId, days: i64) {
        let now = clock.now();
        repository
            .loans
            .borrow(&Checkout {
                book_id: book,
                member_id: member,
                borrowed_on: now,
                due_date: LoanDays::coerce(Some(&serde_json::json!(days)), 7, 365).due_from(now).unwrap(),
            })
            .await
            .unwrap();
    }

    async fn give_back(repository: &Repository, clock: &ManualClock, book: BookId) {
        repository
            .loans
            .return_book(book, clock.now(), FinePolicy::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_most_borrowed_is_bounded_and_stable() {
        let repository = Repository::in_memory();
        let clock = clock();
        let member = add_member(&repository, &clock, "a@x.com").await;

        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(add_book(&repository, &clock, &format!("Book {}", i)).await);
        }
        for _ in 0..2 {
            lend(&repository, &clock, ids[5], member, 7).await;
            give_back(&repository, &clock, ids[5]).await;
        }
        lend(&repository, &clock, ids[9], member, 7).await;

        let top = reports(repository, &clock).most_borrowed(DEFAULT_REPORT_LIMIT).await.unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].id, ids[5]);
        assert_eq!(top[1].id, ids[9]);
        assert!(top.windows(2).all(|w| w[0].borrow_count >= w[1].borrow_count));
        // untouched books keep creation order
        let rest: Vec<_> = top[2..].iter().map(|b| b.id).collect();
        let expected: Vec<_> = ids
            .iter()
            .copied()
            .filter(|id| *id != ids[5] && *id != ids[9])
            .take(8)
            .collect();
        assert_eq!(rest, expected);
    }

    #[tokio::test]
    async fn test_active_members_counts_and_joins() {
        let repository = Repository::in_memory();
        let clock = clock();
        let alice = add_member(&repository, &clock, "a@x.com").await;
        let bob = add_member(&repository, &clock, "b@x.com").await;
        let first = add_book(&repository, &clock, "Dune").await;
        let second = add_book(&repository, &clock, "Emma").await;

        lend(&repository, &clock, first, alice, 7).await;
        give_back(&repository, &clock, first).await;
        lend(&repository, &clock, second, alice, 7).await;
        lend(&repository, &clock, first, bob, 7).await;

        let active = reports(repository, &clock).active_members(10).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].member_id, alice);
        assert_eq!(active[0].borrow_count, 2);
        assert_eq!(active[0].member.as_ref().map(|m| m.id), Some(alice));
        assert_eq!(active[1].member_id, bob);
        assert_eq!(active[1].borrow_count, 1);
    }

    #[tokio::test]
    async fn test_active_members_tolerates_deleted_member() {
        let gone = MemberId::new();

        let mut loans = MockLoansRepository::new();
        loans.expect_count_by_member().returning(move |_| {
            Ok(vec![MemberLoanCount {
                member_id: gone,
                borrow_count: 3,
            }])
        });
        let mut members = MockMembersRepository::new();
        members.expect_get_many().returning(|_| Ok(Vec::new()));

        let repository = Repository::from_stores(
            Arc::new(MockBooksRepository::new()),
            Arc::new(members),
            Arc::new(MockUsersRepository::new()),
            Arc::new(loans),
        );

        let active = reports(repository, &clock()).active_members(10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].borrow_count, 3);
        assert!(active[0].member.is_none());
    }

    #[tokio::test]
    async fn test_overdue_lists_only_late_open_loans() {
        let repository = Repository::in_memory();
        let clock = clock();
        let alice = add_member(&repository, &clock, "a@x.com").await;
        let late = add_book(&repository, &clock, "Late").await;
        let fresh = add_book(&repository, &clock, "Fresh").await;

        lend(&repository, &clock, late, alice, 2).await;
        lend(&repository, &clock, fresh, alice, 30).await;
        clock.advance(Duration::days(4));

        let overdue = reports(repository, &clock).overdue().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].loan.book_id, late);
        assert_eq!(overdue[0].days_late, 2);
        assert_eq!(overdue[0].fine, Decimal::from(10));
    }
}
