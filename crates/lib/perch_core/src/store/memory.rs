//! In-memory [`Store`] for tests and database-less deployments.
//!
//! One mutex guards every table, so each uniqueness check and the write it
//! protects happen atomically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{Store, StoreError, StoreResult};
use crate::models::auth::{AuthCredential, Forge, User};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    credentials: BTreeMap<i64, AuthCredential>,
    forges: Vec<Forge>,
    next_user_id: i64,
    next_credential_id: i64,
}

impl Tables {
    fn username_taken(&self, username: &str, except_user: i64) -> bool {
        self.credentials
            .values()
            .any(|c| c.username == username && c.user_id != except_user)
    }

    fn check_login(&self, user: &User) -> StoreResult<()> {
        if self
            .users
            .values()
            .any(|u| u.forge_id == user.forge_id && u.login == user.login)
        {
            return Err(StoreError::Conflict(format!(
                "user {} already exists",
                user.login
            )));
        }
        Ok(())
    }

    fn check_credential(&self, credential: &AuthCredential) -> StoreResult<()> {
        if self.username_taken(&credential.username, 0) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                credential.username
            )));
        }
        if self
            .credentials
            .values()
            .any(|c| c.user_id == credential.user_id)
        {
            return Err(StoreError::Conflict(format!(
                "user {} already has a credential",
                credential.user_id
            )));
        }
        Ok(())
    }

    fn insert_user(&mut self, mut user: User) -> User {
        self.next_user_id += 1;
        user.id = self.next_user_id;
        self.users.insert(user.id, user.clone());
        user
    }

    fn insert_credential(&mut self, mut credential: AuthCredential) -> AuthCredential {
        let now = Utc::now().timestamp();
        self.next_credential_id += 1;
        credential.id = self.next_credential_id;
        credential.created = now;
        credential.updated = now;
        self.credentials.insert(credential.id, credential.clone());
        credential
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the given forges configured.
    pub fn with_forges(forges: Vec<Forge>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                forges,
                ..Tables::default()
            }),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_credential_by_username(&self, username: &str) -> StoreResult<AuthCredential> {
        let tables = self.tables.lock().await;
        tables
            .credentials
            .values()
            .find(|c| c.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<User> {
        let tables = self.tables.lock().await;
        tables.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_user_by_login(&self, forge_id: i64, login: &str) -> StoreResult<User> {
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find(|u| u.forge_id == forge_id && u.login == login)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_email(&self, forge_id: i64, email: &str) -> StoreResult<User> {
        if email.is_empty() {
            return Err(StoreError::NotFound);
        }
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find(|u| u.forge_id == forge_id && u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_forges(&self) -> StoreResult<Vec<Forge>> {
        Ok(self.tables.lock().await.forges.clone())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        user.validate()?;
        let mut tables = self.tables.lock().await;
        tables.check_login(&user)?;
        Ok(tables.insert_user(user))
    }

    async fn create_user_with_credential(
        &self,
        user: User,
        password_hash: String,
    ) -> StoreResult<(User, AuthCredential)> {
        user.validate()?;
        let mut tables = self.tables.lock().await;
        tables.check_login(&user)?;
        let credential =
            AuthCredential::new(tables.next_user_id + 1, &user.login, password_hash);
        credential.validate()?;
        tables.check_credential(&credential)?;

        let user = tables.insert_user(user);
        let credential = tables.insert_credential(credential);
        Ok((user, credential))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.users.remove(&id).ok_or(StoreError::NotFound)?;
        tables.credentials.retain(|_, c| c.user_id != id);
        Ok(())
    }

    async fn create_credential(&self, credential: AuthCredential) -> StoreResult<AuthCredential> {
        credential.validate()?;
        let mut tables = self.tables.lock().await;
        tables.check_credential(&credential)?;
        Ok(tables.insert_credential(credential))
    }

    async fn update_credential(
        &self,
        mut credential: AuthCredential,
    ) -> StoreResult<AuthCredential> {
        credential.validate()?;
        let mut tables = self.tables.lock().await;
        if tables.username_taken(&credential.username, credential.user_id) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                credential.username
            )));
        }
        let now = Utc::now().timestamp();
        let existing = tables
            .credentials
            .values()
            .find(|c| c.user_id == credential.user_id)
            .map(|c| (c.id, c.created));
        match existing {
            Some((id, created)) => {
                credential.id = id;
                credential.created = created;
            }
            None => {
                tables.next_credential_id += 1;
                credential.id = tables.next_credential_id;
                credential.created = now;
            }
        }
        credential.updated = now;
        tables.credentials.insert(credential.id, credential.clone());
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::auth::DEFAULT_FORGE_ID;

    fn user(login: &str) -> User {
        User {
            id: 0,
            login: login.into(),
            email: format!("{login}@example.com"),
            avatar: String::new(),
            admin: false,
            hash: "secret".into(),
            forge_id: DEFAULT_FORGE_ID,
            forge_remote_id: "0".into(),
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let store = MemoryStore::new();
        let alice = store.create_user(user("alice")).await.unwrap();
        assert_eq!(alice.id, 1);
        assert_eq!(store.find_user_by_id(1).await.unwrap().login, "alice");
        assert_eq!(
            store
                .find_user_by_login(DEFAULT_FORGE_ID, "alice")
                .await
                .unwrap()
                .id,
            1
        );
        assert_eq!(
            store
                .find_user_by_email(DEFAULT_FORGE_ID, "alice@example.com")
                .await
                .unwrap()
                .id,
            1
        );
        assert!(store.find_user_by_login(2, "alice").await.unwrap_err().is_not_found());
        assert!(store.find_user_by_email(DEFAULT_FORGE_ID, "").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_login_in_forge_conflicts() {
        let store = MemoryStore::new();
        store.create_user(user("alice")).await.unwrap();
        assert!(matches!(
            store.create_user(user("alice")).await,
            Err(StoreError::Conflict(_))
        ));
        let mut other_forge = user("alice");
        other_forge.forge_id = 2;
        assert!(store.create_user(other_forge).await.is_ok());
    }

    #[tokio::test]
    async fn credential_uniqueness() {
        let store = MemoryStore::new();
        let a = store.create_user(user("alice")).await.unwrap();
        let b = store.create_user(user("bob")).await.unwrap();

        store
            .create_credential(AuthCredential::new(a.id, "alice", "$2b$digest".into()))
            .await
            .unwrap();
        // same username for another user
        assert!(matches!(
            store
                .create_credential(AuthCredential::new(b.id, "alice", "$2b$digest".into()))
                .await,
            Err(StoreError::Conflict(_))
        ));
        // second credential for the same user
        assert!(matches!(
            store
                .create_credential(AuthCredential::new(a.id, "alice2", "$2b$digest".into()))
                .await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn invalid_credential_is_never_persisted() {
        let store = MemoryStore::new();
        let a = store.create_user(user("alice")).await.unwrap();
        assert!(matches!(
            store
                .create_credential(AuthCredential::new(a.id, "alice", String::new()))
                .await,
            Err(StoreError::Invalid(_))
        ));
        assert!(store.find_credential_by_username("alice").await.is_err());
    }

    #[tokio::test]
    async fn update_credential_upserts_by_user() {
        let store = MemoryStore::new();
        let a = store.create_user(user("alice")).await.unwrap();

        let first = store
            .update_credential(AuthCredential::new(a.id, "alice", "one".into()))
            .await
            .unwrap();
        let second = store
            .update_credential(AuthCredential::new(a.id, "alice", "two".into()))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            store
                .find_credential_by_username("alice")
                .await
                .unwrap()
                .password_hash,
            "two"
        );
    }

    #[tokio::test]
    async fn delete_user_removes_credential() {
        let store = MemoryStore::new();
        let a = store.create_user(user("alice")).await.unwrap();
        store
            .create_credential(AuthCredential::new(a.id, "alice", "d".into()))
            .await
            .unwrap();
        store.delete_user(a.id).await.unwrap();
        assert!(store.find_credential_by_username("alice").await.is_err());
        assert!(store.delete_user(a.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn user_with_credential_is_all_or_nothing() {
        let store = MemoryStore::new();
        let (bob, cred) = store
            .create_user_with_credential(user("bob"), "d".into())
            .await
            .unwrap();
        assert_eq!((cred.user_id, cred.username.as_str()), (bob.id, "bob"));
        assert_eq!(
            store.find_credential_by_username("bob").await.unwrap().user_id,
            bob.id
        );

        // username taken by another forge's bob: no user row is kept
        let mut other = user("bob");
        other.forge_id = 2;
        assert!(matches!(
            store.create_user_with_credential(other, "d".into()).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store.find_user_by_login(2, "bob").await.unwrap_err().is_not_found());

        // invalid digest: nothing is persisted
        assert!(matches!(
            store.create_user_with_credential(user("carol"), String::new()).await,
            Err(StoreError::Invalid(_))
        ));
        assert!(
            store
                .find_user_by_login(DEFAULT_FORGE_ID, "carol")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_credential_creation_admits_one() {
        let store = Arc::new(MemoryStore::new());
        let u1 = store.create_user(user("bob")).await.unwrap();
        let mut u2 = user("bob");
        u2.forge_id = 2;
        let u2 = store.create_user(u2).await.unwrap();

        let tasks: Vec<_> = [u1.id, u2.id]
            .into_iter()
            .map(|uid| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_credential(AuthCredential::new(uid, "bob", "digest".into()))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, conflicts), (1, 1));
    }
}
