//! Password authentication.
//!
//! Accounts use Argon2id hashes. Shoppers register themselves with the
//! `customer` role; admins are created by the startup bootstrap.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::db::{RepositoryError, User, UserRepository, UserRole};
use crate::domain::aggregates::customer::normalize_email;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown email.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    UserAlreadyExists,

    #[error("Password validation failed: {0}")]
    WeakPassword(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing error")]
    PasswordHash,
}

/// Identity kept in the session after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool { self.role == UserRole::Admin }
}

impl From<User> for CurrentUser {
    fn from(u: User) -> Self {
        Self { id: u.id, name: u.name, email: u.email, role: u.role }
    }
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { users: UserRepository::new(pool) }
    }

    /// Register a shopper account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short, or
    /// `AuthError::UserAlreadyExists` if the email is registered.
    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &SecretString) -> Result<CurrentUser, AuthError> {
        self.create(name, email, password, UserRole::Customer).await
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<CurrentUser, AuthError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password.expose_secret(), &user.password_hash)?;
        Ok(user.into())
    }

    /// Session identity for a stored user id, if the account still exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn refresh(&self, id: Uuid) -> Result<Option<CurrentUser>, AuthError> {
        Ok(self.users.find_by_id(id).await?.map(CurrentUser::from))
    }

    /// Creates the configured admin unless one already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or insert fails.
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<(), AuthError> {
        if self.users.admin_exists().await? {
            return Ok(());
        }
        let user = self.create("Administrator", &admin.email, &admin.password, UserRole::Admin).await?;
        info!(email = %user.email, "Bootstrap admin created");
        Ok(())
    }

    async fn create(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
        role: UserRole,
    ) -> Result<CurrentUser, AuthError> {
        validate_password(password.expose_secret())?;
        let password_hash = hash_password(password.expose_secret())?;
        let user = self
            .users
            .create(name.trim(), &normalize_email(email), &password_hash, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;
        Ok(user.into())
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
