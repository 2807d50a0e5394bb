//! Accounts and credentials: signup, login, token verification and the admin
//! role check.

mod password;
mod token;

pub use password::{MIN_PASSWORD_LEN, hash_password, verify_password};
pub use token::{Claims, TokenError, TokenSigner};

use chrono::Utc;
use document_store::{Role, User, UserStore, ValidationErrors, is_valid_email};
use serde::Deserialize;

use crate::error::{DomainError, NOT_AUTHORIZED};

/// Signup and admin-create body.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewAccount {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl NewAccount {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("name", self.name.as_deref().unwrap_or(""), "Please add a name");
        if !self.email.as_deref().is_some_and(|e| is_valid_email(e.trim())) {
            errors.push("email", "Please add a valid email");
        }
        match self.password.as_deref() {
            None | Some("") => errors.push("password", "Please add a password"),
            Some(p) if p.chars().count() < MIN_PASSWORD_LEN => errors.push(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            ),
            Some(_) => {}
        }
        errors.into_result()
    }
}

/// Login body.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Authentication service over a user store.
#[derive(Clone)]
pub struct AuthService<S: UserStore> {
    store: S,
    signer: TokenSigner,
}

impl<S: UserStore> AuthService<S> {
    pub fn new(store: S, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a `user` account and returns a token for it.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, account: NewAccount) -> Result<String, DomainError> {
        let user = self.create_account(account, Role::User).await?;
        self.issue(&user)
    }

    /// Exchanges an email and password for a token.
    #[tracing::instrument(skip(self))]
    pub async fn login(&self, request: LoginRequest) -> Result<String, DomainError> {
        let (Some(email), Some(password)) = (
            request.email.filter(|e| !e.trim().is_empty()),
            request.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(DomainError::BadRequest(
                "Please provide an email and password".to_string(),
            ));
        };

        let email = email.trim().to_lowercase();
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) if verify_password(&password, &user.password_hash) => user,
            _ => {
                metrics::counter!("auth_failures_total").increment(1);
                tracing::warn!("login rejected");
                return Err(DomainError::InvalidCredentials);
            }
        };

        self.issue(&user)
    }

    /// Creates an `admin` account.
    #[tracing::instrument(skip(self))]
    pub async fn create_admin(&self, account: NewAccount) -> Result<User, DomainError> {
        self.create_account(account, Role::Admin).await
    }

    /// Creates the first admin unless the email is already registered.
    ///
    /// Returns `None` when the account already exists.
    pub async fn seed_admin(&self, account: NewAccount) -> Result<Option<User>, DomainError> {
        let email = account.email.as_deref().unwrap_or("").trim().to_lowercase();
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Ok(None);
        }
        self.create_admin(account).await.map(Some)
    }

    /// Resolves a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<User, DomainError> {
        let claims = self.signer.verify(token, Utc::now()).map_err(|e| {
            metrics::counter!("auth_failures_total").increment(1);
            tracing::warn!(reason = %e, "token rejected");
            DomainError::Unauthorized
        })?;

        self.store
            .find_user(claims.id)
            .await?
            .ok_or_else(|| DomainError::NotFound("User not found".to_string()))
    }

    /// Fails with Forbidden unless `user` is an admin.
    pub fn require_admin(&self, user: &User) -> Result<(), DomainError> {
        if user.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user = %user.id, "admin route refused");
            Err(DomainError::Forbidden(NOT_AUTHORIZED.to_string()))
        }
    }

    /// Lists every account.
    pub async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        Ok(self.store.list_users().await?)
    }

    async fn create_account(&self, account: NewAccount, role: Role) -> Result<User, DomainError> {
        account.validate()?;

        let NewAccount {
            name: Some(name),
            email: Some(email),
            password: Some(password),
        } = account
        else {
            return Err(DomainError::BadRequest("Incomplete account".to_string()));
        };

        let hash = hash_password(&password)?;
        let user = User::new(name.trim(), &email, hash, role, Utc::now());
        let user = self.store.insert_user(user).await?;

        tracing::info!(user = %user.id, role = %user.role, "account created");
        Ok(user)
    }

    fn issue(&self, user: &User) -> Result<String, DomainError> {
        Ok(self.signer.issue(user.id, Utc::now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use document_store::InMemoryDocumentStore;
    use secrecy::SecretString;

    fn service() -> AuthService<InMemoryDocumentStore> {
        AuthService::new(
            InMemoryDocumentStore::new(),
            TokenSigner::new(SecretString::from("test-secret".to_string()), Duration::days(30)),
        )
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let auth = service();
        let token = auth
            .register(NewAccount::new("Ada", "Ada@Example.com", "secret1"))
            .await
            .unwrap();

        let user = auth.authenticate(&token).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::User);
        assert!(auth.require_admin(&user).is_err());
    }

    #[tokio::test]
    async fn login_checks_password() {
        let auth = service();
        auth.register(NewAccount::new("Ada", "ada@example.com", "secret1"))
            .await
            .unwrap();

        let ok = auth
            .login(LoginRequest {
                email: Some("ADA@example.com".to_string()),
                password: Some("secret1".to_string()),
            })
            .await;
        assert!(ok.is_ok());

        let wrong = auth
            .login(LoginRequest {
                email: Some("ada@example.com".to_string()),
                password: Some("secret2".to_string()),
            })
            .await;
        assert!(matches!(wrong, Err(DomainError::InvalidCredentials)));

        let missing = auth.login(LoginRequest::default()).await;
        assert!(matches!(missing, Err(DomainError::BadRequest(_))));
    }

    #[tokio::test]
    async fn account_validation_collects_messages() {
        let auth = service();
        let err = auth
            .register(NewAccount {
                name: None,
                email: Some("nope".to_string()),
                password: Some("123".to_string()),
            })
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Please add a name"));
        assert!(message.contains("Please add a valid email"));
        assert!(message.contains("at least 6 characters"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let auth = service();
        let account = NewAccount::new("Ada", "ada@example.com", "secret1");
        auth.register(account.clone()).await.unwrap();

        let err = auth.register(account).await.unwrap_err();
        assert!(matches!(err, DomainError::Duplicate { field: "email" }));
    }

    #[tokio::test]
    async fn bad_token_and_deleted_user() {
        let auth = service();
        assert!(matches!(
            auth.authenticate("not.a.token").await,
            Err(DomainError::Unauthorized)
        ));

        let orphan = auth.signer.issue(document_store::UserId::new(), Utc::now()).unwrap();
        let err = auth.authenticate(&orphan).await.unwrap_err();
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn seed_admin_is_idempotent() {
        let auth = service();
        let account = NewAccount::new("Root", "root@example.com", "rootpass");

        let first = auth.seed_admin(account.clone()).await.unwrap();
        assert!(first.is_some_and(|u| u.is_admin()));
        assert!(auth.seed_admin(account).await.unwrap().is_none());
        assert_eq!(auth.list_users().await.unwrap().len(), 1);
    }
}
