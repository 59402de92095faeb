//! Authentication service: signup, login and bearer-token lookup

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        ids::UserId,
        member::normalize_email,
        user::{Login, NewUser, PublicUser, Role, Signup, User},
    },
    repository::Repository,
    services::{clock::Clock, required},
};

const MIN_TOKEN_BYTES: usize = 16;

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            config,
            clock,
        }
    }

    /// Register a new credential record.
    ///
    /// The admin role is granted only to callers who are admins themselves,
    /// or to the first admin signup when none exists yet. Any other admin
    /// request is downgraded to a member account.
    pub async fn signup(&self, mut request: Signup, caller: Option<&User>) -> AppResult<PublicUser> {
        let name = required(request.name.as_deref(), "name")?;
        let email = normalize_email(required(request.email.as_deref(), "email")?);
        let password = required(request.password.as_deref(), "password")?;
        request.email = Some(email.clone());
        request.validate()?;

        if self.repository.users.email_exists(&email).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let role = self.granted_role(request.role.unwrap_or_default(), caller).await?;

        let user = self
            .repository
            .users
            .create(NewUser {
                id: UserId::new(),
                name: name.to_string(),
                email,
                password_hash: self.hash_password(password)?,
                role,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!("User {} signed up with role {}", user.id, user.role);

        Ok(PublicUser::from(&user))
    }

    async fn granted_role(&self, requested: Role, caller: Option<&User>) -> AppResult<Role> {
        if requested != Role::Admin || caller.is_some_and(User::is_admin) {
            return Ok(requested);
        }
        if !self.repository.users.admin_exists().await? {
            tracing::info!("Bootstrapping the first admin account");
            return Ok(Role::Admin);
        }
        tracing::warn!("Admin signup without an admin token downgraded to member");
        Ok(Role::Member)
    }

    /// Check credentials and issue a fresh session token.
    ///
    /// The new token replaces whatever token the user held before.
    pub async fn login(&self, request: Login) -> AppResult<(String, PublicUser)> {
        let email = normalize_email(required(request.email.as_deref(), "email")?);
        let password = required(request.password.as_deref(), "password")?;

        let user = self
            .repository
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(invalid_credentials)?;

        if !self.verify_password(&user, password)? {
            return Err(invalid_credentials());
        }

        let token = self.issue_token();
        self.repository
            .users
            .set_session(user.id, &token_digest(&token), self.clock.now())
            .await?;

        tracing::debug!("User {} logged in", user.id);

        Ok((token, PublicUser::from(&user)))
    }

    /// Resolve a bearer token to its user
    pub async fn lookup_token(&self, token: &str) -> AppResult<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.repository.users.get_by_token_hash(&token_digest(token)).await
    }

    /// Invalidate the user's current token
    pub async fn logout(&self, user: &User) -> AppResult<()> {
        self.repository.users.clear_session(user.id).await
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn issue_token(&self) -> String {
        let mut bytes = vec![0u8; self.config.token_bytes.max(MIN_TOKEN_BYTES)];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid email or password".to_string())
}

/// Digest under which a session token is persisted
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repository::{
            books::MockBooksRepository, loans::MockLoansRepository,
            members::MockMembersRepository, users::MockUsersRepository,
        },
        services::clock::SystemClock,
    };
    use chrono::Utc;

    fn service(repository: Repository) -> AuthService {
        AuthService::new(repository, AuthConfig::default(), Arc::new(SystemClock))
    }

    fn signup(email: &str, password: &str) -> Signup {
        Signup {
            name: Some("Alice".into()),
            email: Some(email.into()),
            password: Some(password.into()),
            role: None,
        }
    }

    fn login(email: &str, password: &str) -> Login {
        Login {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn test_signup_then_login_issues_resolvable_token() {
        let auth = service(Repository::in_memory());
        let created = auth.signup(signup("Alice@X.com", "secret"), None).await.unwrap();
        assert_eq!(created.email, "alice@x.com");
        assert_eq!(created.role, Role::Member);

        let (token, user) = auth.login(login("alice@x.com", "secret")).await.unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(user.id, created.id);

        let resolved = auth.lookup_token(&token).await.unwrap().unwrap();
        assert_eq!(resolved.id, created.id);
        assert!(resolved.last_login.is_some());
    }

    #[tokio::test]
    async fn test_new_login_invalidates_previous_token() {
        let auth = service(Repository::in_memory());
        auth.signup(signup("a@x.com", "secret"), None).await.unwrap();

        let (first, _) = auth.login(login("a@x.com", "secret")).await.unwrap();
        let (second, _) = auth.login(login("a@x.com", "secret")).await.unwrap();

        assert_ne!(first, second);
        assert!(auth.lookup_token(&first).await.unwrap().is_none());
        assert!(auth.lookup_token(&second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let auth = service(Repository::in_memory());
        auth.signup(signup("a@x.com", "secret"), None).await.unwrap();
        let err = auth.signup(signup("A@x.com", "other"), None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_signup_requires_fields() {
        let auth = service(Repository::in_memory());
        let mut request = signup("a@x.com", "secret");
        request.password = None;
        assert!(matches!(
            auth.signup(request, None).await,
            Err(AppError::MissingField("password"))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_issues_no_token() {
        let hash = service(Repository::in_memory()).hash_password("secret").unwrap();
        let stored = User {
            id: UserId::new(),
            name: "Alice".into(),
            email: "a@x.com".into(),
            password_hash: hash,
            role: Role::Member,
            token_hash: Some(token_digest("existing")),
            last_login: None,
            created_at: Utc::now(),
        };

        let mut users = MockUsersRepository::new();
        users
            .expect_get_by_email()
            .returning(move |_| Ok(Some(stored.clone())));
        users.expect_set_session().never();

        let repository = Repository::from_stores(
            Arc::new(MockBooksRepository::new()),
            Arc::new(MockMembersRepository::new()),
            Arc::new(users),
            Arc::new(MockLoansRepository::new()),
        );

        let err = service(repository)
            .login(login("a@x.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_unknown_email_is_unauthorized() {
        let auth = service(Repository::in_memory());
        let err = auth.login(login("nobody@x.com", "secret")).await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    fn admin_signup(email: &str) -> Signup {
        Signup {
            role: Some(Role::Admin),
            ..signup(email, "secret")
        }
    }

    #[tokio::test]
    async fn test_first_admin_signup_bootstraps() {
        let auth = service(Repository::in_memory());
        let first = auth.signup(admin_signup("root@x.com"), None).await.unwrap();
        assert_eq!(first.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_anonymous_admin_signup_is_downgraded_once_an_admin_exists() {
        let auth = service(Repository::in_memory());
        auth.signup(admin_signup("root@x.com"), None).await.unwrap();

        let second = auth.signup(admin_signup("mallory@x.com"), None).await.unwrap();
        assert_eq!(second.role, Role::Member);
    }

    #[tokio::test]
    async fn test_admin_can_create_admins() {
        let repository = Repository::in_memory();
        let auth = service(repository.clone());
        auth.signup(admin_signup("root@x.com"), None).await.unwrap();
        let root = repository.users.get_by_email("root@x.com").await.unwrap().unwrap();

        let granted = auth
            .signup(admin_signup("deputy@x.com"), Some(&root))
            .await
            .unwrap();
        assert_eq!(granted.role, Role::Admin);

        let deputy = repository.users.get_by_email("deputy@x.com").await.unwrap().unwrap();
        let by_member = auth.signup(signup("m@x.com", "secret"), Some(&deputy)).await.unwrap();
        assert_eq!(by_member.role, Role::Member);
    }

    #[tokio::test]
    async fn test_signup_validates_normalised_email() {
        let auth = service(Repository::in_memory());
        let created = auth.signup(signup("  Alice@X.com ", "secret"), None).await.unwrap();
        assert_eq!(created.email, "alice@x.com");

        let err = auth.signup(signup("not-an-email", "secret"), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
