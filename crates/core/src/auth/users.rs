//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! User records and the JSON-file user store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::auth::password::{encode_salt, generate_salt, hash_password, verify_password};
use crate::error::AuthError;

/// Account role. New accounts default to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    User,
    Admin,
}

/// A stored user record. The password is kept only as a salted PBKDF2 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Unique, compared case-insensitively.
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Credential verification and user record CRUD.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Case-insensitive username lookup.
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn add(&self, user: User) -> Result<(), AuthError>;

    async fn update(&self, user: User) -> Result<(), AuthError>;

    /// Verify a password against the stored hash; on success stamps
    /// `last_login_at` and persists the record. `Ok(None)` means the
    /// credentials did not match any account.
    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError>;

    /// Create a salted-hash user. Refuses usernames that already exist
    /// (case-insensitive).
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        role: UserRole,
    ) -> Result<User, AuthError>;
}

/// File-backed user store: an in-memory map guarded by a mutex, persisted as
/// pretty-printed JSON. Disk writes happen after the lock is released
/// (copy-then-write).
pub struct JsonUserStore {
    path: PathBuf,
    users: Mutex<HashMap<Uuid, User>>,
}

impl JsonUserStore {
    /// Open (or create) the store under `data_dir/users/users.json`.
    ///
    /// On an empty store an `admin` account is bootstrapped with a random
    /// password that is logged exactly once.
    pub fn open(data_dir: &Path) -> Result<Self, AuthError> {
        let dir = data_dir.join("users");
        std::fs::create_dir_all(&dir)
            .map_err(|e| AuthError::Store(format!("failed to create {}: {e}", dir.display())))?;
        let path = dir.join("users.json");

        let mut users = HashMap::new();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| AuthError::Store(format!("failed to read user store: {e}")))?;
            let records: Vec<User> = serde_json::from_str(&raw)
                .map_err(|e| AuthError::Store(format!("failed to parse user store JSON: {e}")))?;
            for user in records {
                users.insert(user.id, user);
            }
        }

        let store = Self {
            path,
            users: Mutex::new(users),
        };

        if store.users.lock().expect("user store lock").is_empty() {
            let password: String = OsRng
                .sample_iter(&Alphanumeric)
                .take(16)
                .map(char::from)
                .collect();
            let admin = build_user("admin", &password, "", UserRole::Admin);
            tracing::warn!(
                username = "admin",
                password = %password,
                "user store empty; bootstrapped admin account (change this password)"
            );
            store
                .users
                .lock()
                .expect("user store lock")
                .insert(admin.id, admin);
            store.persist_blocking()?;
        }

        Ok(store)
    }

    fn snapshot(&self) -> Vec<User> {
        let guard = self.users.lock().expect("user store lock");
        let mut records: Vec<User> = guard.values().cloned().collect();
        records.sort_by_key(|u| u.created_at);
        records
    }

    fn persist_blocking(&self) -> Result<(), AuthError> {
        let records = self.snapshot();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| AuthError::Store(format!("failed to serialize user store: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| AuthError::Store(format!("failed to write user store: {e}")))
    }

    async fn persist(&self) -> Result<(), AuthError> {
        let records = self.snapshot();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| AuthError::Store(format!("failed to serialize user store: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AuthError::Store(format!("failed to write user store: {e}")))
    }

    fn find_by_username(&self, username: &str) -> Option<User> {
        let guard = self.users.lock().expect("user store lock");
        guard
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
    }
}

fn build_user(username: &str, password: &str, email: &str, role: UserRole) -> User {
    let salt = generate_salt();
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password, &salt),
        password_salt: encode_salt(&salt),
        role,
        created_at: Utc::now(),
        last_login_at: None,
    }
}

#[async_trait]
impl UserRepository for JsonUserStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.lock().expect("user store lock").get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.find_by_username(username))
    }

    async fn add(&self, user: User) -> Result<(), AuthError> {
        self.users
            .lock()
            .expect("user store lock")
            .insert(user.id, user);
        self.persist().await
    }

    async fn update(&self, user: User) -> Result<(), AuthError> {
        self.users
            .lock()
            .expect("user store lock")
            .insert(user.id, user);
        self.persist().await
    }

    async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        let Some(mut user) = self.find_by_username(username) else {
            return Ok(None);
        };
        if !verify_password(password, &user.password_hash, &user.password_salt)? {
            return Ok(None);
        }
        user.last_login_at = Some(Utc::now());
        self.users
            .lock()
            .expect("user store lock")
            .insert(user.id, user.clone());
        self.persist().await?;
        Ok(Some(user))
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }
        if self.find_by_username(username).is_some() {
            return Err(AuthError::AccountExists(username.to_string()));
        }
        let user = build_user(username, password, email, role);
        self.users
            .lock()
            .expect("user store lock")
            .insert(user.id, user.clone());
        self.persist().await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_then_validate_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonUserStore::open(dir.path()).unwrap();

        let user = store
            .create_user("alice", "p@ss", "a@example.com", UserRole::User)
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::User);
        assert!(user.last_login_at.is_none());

        let validated = store.validate_credentials("alice", "p@ss").await.unwrap();
        let validated = validated.expect("credentials should match");
        assert_eq!(validated.id, user.id);
        assert!(validated.last_login_at.is_some());

        assert!(store
            .validate_credentials("alice", "wrong")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn username_lookup_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = JsonUserStore::open(dir.path()).unwrap();
        store
            .create_user("Alice", "p@ss", "", UserRole::User)
            .await
            .unwrap();

        assert!(store.get_by_username("aLiCe").await.unwrap().is_some());
        let err = store
            .create_user("ALICE", "other", "", UserRole::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountExists(_)));
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = JsonUserStore::open(dir.path()).unwrap();
            store
                .create_user("bob", "secret", "", UserRole::User)
                .await
                .unwrap()
                .id
        };
        let reopened = JsonUserStore::open(dir.path()).unwrap();
        let bob = reopened.get_by_id(id).await.unwrap().expect("bob persisted");
        assert_eq!(bob.username, "bob");
        assert!(reopened
            .validate_credentials("bob", "secret")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn empty_store_bootstraps_admin() {
        let dir = tempdir().unwrap();
        let store = JsonUserStore::open(dir.path()).unwrap();
        let admin = store.get_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn stored_json_never_contains_cleartext_password() {
        let dir = tempdir().unwrap();
        let store = JsonUserStore::open(dir.path()).unwrap();
        store
            .create_user("carol", "hunter2-cleartext", "", UserRole::User)
            .await
            .unwrap();
        let raw = std::fs::read_to_string(dir.path().join("users/users.json")).unwrap();
        assert!(!raw.contains("hunter2-cleartext"));
    }
}
