//! Membership management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        ids::MemberId,
        member::{normalize_email, CreateMember, Member, NewMember, UpdateMember, DEFAULT_MEMBER_ROLE},
    },
    repository::Repository,
    services::{clock::Clock, non_blank, required},
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl MembersService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn list_members(&self) -> AppResult<Vec<Member>> {
        self.repository.members.list().await
    }

    /// Register a member; the email must not be in use
    pub async fn create_member(&self, mut request: CreateMember) -> AppResult<Member> {
        let name = required(request.name.as_deref(), "name")?;
        let email = normalize_email(required(request.email.as_deref(), "email")?);
        request.email = Some(email.clone());
        request.validate()?;

        if self.repository.members.email_exists(&email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let member = self
            .repository
            .members
            .create(NewMember {
                id: MemberId::new(),
                name: name.to_string(),
                email,
                role: non_blank(request.role.as_deref())
                    .unwrap_or(DEFAULT_MEMBER_ROLE)
                    .to_string(),
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!("Membership: registered member {}", member.id);
        Ok(member)
    }

    /// Merge the supplied fields into an existing member
    pub async fn update_member(&self, mut request: UpdateMember) -> AppResult<Member> {
        let id = MemberId::parse_field(request.id.as_deref(), "id")?;
        if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        if let Some(email) = request.email.take() {
            let email = normalize_email(&email);
            if email.is_empty() {
                return Err(AppError::Validation("email cannot be empty".to_string()));
            }
            request.email = Some(email);
        }
        request.validate()?;

        if let Some(email) = request.email.as_deref() {
            if self.repository.members.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        self.repository
            .members
            .update(id, &request)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))
    }

    /// Remove a member record. Open loans stay on the books and in the ledger.
    pub async fn delete_member(&self, raw_id: &str) -> AppResult<()> {
        let id = MemberId::parse_field(Some(raw_id), "id")?;
        let member = self
            .repository
            .members
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

        if !member.borrowed_books.is_empty() {
            tracing::warn!(
                "Membership: deleting member {} with {} open loan(s)",
                id,
                member.borrowed_books.len()
            );
        }

        if !self.repository.members.delete(id).await? {
            return Err(AppError::NotFound(format!("Member {} not found", id)));
        }
        Ok(())
    }
}
