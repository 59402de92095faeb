//! Membership store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        ids::MemberId,
        member::{BorrowedBook, Member, NewMember, UpdateMember},
    },
};

use super::conflict_on_unique;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembersRepository: Send + Sync {
    /// All members in registration order
    async fn list(&self) -> AppResult<Vec<Member>>;

    async fn get_by_id(&self, id: MemberId) -> AppResult<Option<Member>>;

    /// Members matching any of `ids`; unknown ids are skipped
    async fn get_many(&self, ids: &[MemberId]) -> AppResult<Vec<Member>>;

    /// Whether `email` is registered to a member other than `exclude`
    async fn email_exists(&self, email: &str, exclude: Option<MemberId>) -> AppResult<bool>;

    async fn create(&self, member: NewMember) -> AppResult<Member>;

    /// Merge supplied fields; `None` when the id does not resolve
    async fn update(&self, id: MemberId, update: &UpdateMember) -> AppResult<Option<Member>>;

    async fn delete(&self, id: MemberId) -> AppResult<bool>;
}

/// Members row as stored (borrowed books kept as a JSONB array)
#[derive(Debug, FromRow)]
struct MemberRow {
    id: MemberId,
    name: String,
    email: String,
    role: String,
    borrowed_books: Json<Vec<BorrowedBook>>,
    created_at: DateTime<Utc>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            borrowed_books: row.borrowed_books.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgMembersRepository {
    pool: Pool<Postgres>,
}

impl PgMembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembersRepository for PgMembersRepository {
    async fn list(&self) -> AppResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>("SELECT * FROM members ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn get_by_id(&self, id: MemberId) -> AppResult<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    async fn get_many(&self, ids: &[MemberId]) -> AppResult<Vec<Member>> {
        let ids: Vec<Uuid> = ids.iter().map(MemberId::as_uuid).collect();
        let rows = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn email_exists(&self, email: &str, exclude: Option<MemberId>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id != $2))",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, member: NewMember) -> AppResult<Member> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO members (id, name, email, role, borrowed_books, created_at)
            VALUES ($1, $2, $3, $4, '[]'::jsonb, $5)
            RETURNING *
            "#,
        )
        .bind(member.id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.role)
        .bind(member.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Email already registered"))?;

        Ok(row.into())
    }

    async fn update(&self, id: MemberId, update: &UpdateMember) -> AppResult<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            UPDATE members SET
                name  = COALESCE($2, name),
                email = COALESCE($3, email),
                role  = COALESCE($4, role)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.role)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Email already registered"))?;

        Ok(row.map(Member::from))
    }

    async fn delete(&self, id: MemberId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
