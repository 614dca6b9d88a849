// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User directory.
//!
//! The account store behind login and registration. Only the lookups the
//! session layer needs are part of [`UserDirectory`]; record ids are raw
//! sequential integers and never leave the process unencrypted.

use std::collections::HashMap;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::Role;

/// A stored account.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub role: Role,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Account to be created. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub role: Role,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{0} already registered")]
    Conflict(&'static str),

    #[error("password hashing failed")]
    PasswordHash,

    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up by username, falling back to email.
    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError>;
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<i64, UserRecord>,
    next_id: i64,
}

/// Directory kept in process memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<Accounts>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.accounts.read().await.by_id.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let accounts = self.accounts.read().await;
        let found = accounts
            .by_id
            .values()
            .find(|u| u.username == login)
            .or_else(|| accounts.by_id.values().find(|u| u.email.eq_ignore_ascii_case(login)))
            .cloned();
        Ok(found)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .by_id
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts.by_id.values().any(|u| u.username == user.username) {
            return Err(DirectoryError::Conflict("username"));
        }
        if accounts
            .by_id
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DirectoryError::Conflict("email"));
        }

        accounts.next_id += 1;
        let record = UserRecord {
            id: accounts.next_id,
            role: user.role,
            name: user.name,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        accounts.by_id.insert(record.id, record.clone());
        Ok(record)
    }
}

/// Hash a password into an Argon2 PHC string.
///
/// CPU-heavy; call from `spawn_blocking` on request paths.
pub fn hash_password(password: &str) -> Result<String, DirectoryError> {
    let mut salt_bytes = [0u8; 16];
    SystemRandom::new()
        .fill(&mut salt_bytes)
        .map_err(|_| DirectoryError::PasswordHash)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| DirectoryError::PasswordHash)?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|_| DirectoryError::PasswordHash)
}

/// Check a password against a PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            role: Role::User,
            name: "Test User".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password("s3cret").unwrap(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let phc = hash_password("correct horse").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("correct horse", &phc));
        assert!(!verify_password("battery staple", &phc));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let directory = InMemoryDirectory::new();
        let a = directory.create(new_user("alice", "alice@example.com")).await.unwrap();
        let b = directory.create(new_user("bob", "bob@example.com")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(directory.len().await, 2);
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let directory = InMemoryDirectory::new();
        directory.create(new_user("alice", "alice@example.com")).await.unwrap();

        assert!(matches!(
            directory.create(new_user("alice", "other@example.com")).await,
            Err(DirectoryError::Conflict("username"))
        ));
        assert!(matches!(
            directory.create(new_user("alice2", "ALICE@example.com")).await,
            Err(DirectoryError::Conflict("email"))
        ));
    }

    #[tokio::test]
    async fn find_by_login_accepts_username_or_email() {
        let directory = InMemoryDirectory::new();
        directory.create(new_user("alice", "alice@example.com")).await.unwrap();

        let by_username = directory.find_by_login("alice").await.unwrap().unwrap();
        let by_email = directory.find_by_login("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_username.id, by_email.id);
        assert!(directory.find_by_login("mallory").await.unwrap().is_none());
        assert!(directory.find_by_email("alice@example.com").await.unwrap().is_some());
    }
}
