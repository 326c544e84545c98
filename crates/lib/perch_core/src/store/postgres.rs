//! PostgreSQL-backed [`Store`].
//!
//! Uniqueness is enforced by the schema in `perch_core/migrations/`; unique
//! violations surface as [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{Store, StoreError, StoreResult};
use crate::models::auth::{AuthCredential, Forge, User};

type UserRow = (i64, String, String, String, bool, String, i64, String);
type CredentialRow = (i64, i64, String, String, i64, i64);

const USER_COLUMNS: &str = "id, login, email, avatar, admin, hash, forge_id, forge_remote_id";
const CREDENTIAL_COLUMNS: &str = "id, user_id, username, password_hash, created, updated";

fn user_from_row(row: UserRow) -> User {
    let (id, login, email, avatar, admin, hash, forge_id, forge_remote_id) = row;
    User {
        id,
        login,
        email,
        avatar,
        admin,
        hash,
        forge_id,
        forge_remote_id,
    }
}

fn credential_from_row(row: CredentialRow) -> AuthCredential {
    let (id, user_id, username, password_hash, created, updated) = row;
    AuthCredential {
        id,
        user_id,
        username,
        password_hash,
        created,
        updated,
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_credential_by_username(&self, username: &str) -> StoreResult<AuthCredential> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM auth_users WHERE username = $1"
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(credential_from_row(row))
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(row))
    }

    async fn find_user_by_login(&self, forge_id: i64, login: &str) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE forge_id = $1 AND login = $2"
        ))
        .bind(forge_id)
        .bind(login)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(row))
    }

    async fn find_user_by_email(&self, forge_id: i64, email: &str) -> StoreResult<User> {
        if email.is_empty() {
            return Err(StoreError::NotFound);
        }
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE forge_id = $1 AND email = $2 ORDER BY id LIMIT 1"
        ))
        .bind(forge_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(row))
    }

    async fn list_forges(&self) -> StoreResult<Vec<Forge>> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, kind, url FROM forges ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, kind, url)| Forge { id, kind, url })
            .collect())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        user.validate()?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (login, email, avatar, admin, hash, forge_id, forge_remote_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(user.admin)
        .bind(&user.hash)
        .bind(user.forge_id)
        .bind(&user.forge_remote_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user_from_row(row))
    }

    async fn create_user_with_credential(
        &self,
        user: User,
        password_hash: String,
    ) -> StoreResult<(User, AuthCredential)> {
        user.validate()?;
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (login, email, avatar, admin, hash, forge_id, forge_remote_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(user.admin)
        .bind(&user.hash)
        .bind(user.forge_id)
        .bind(&user.forge_remote_id)
        .fetch_one(&mut *tx)
        .await?;
        let user = user_from_row(row);

        let credential = AuthCredential::new(user.id, &user.login, password_hash);
        credential.validate()?;
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "INSERT INTO auth_users (user_id, username, password_hash, created, updated) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(credential.user_id)
        .bind(&credential.username)
        .bind(&credential.password_hash)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        // Dropping `tx` on any early return rolls the user insert back.
        tx.commit().await?;
        Ok((user, credential_from_row(row)))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_credential(&self, credential: AuthCredential) -> StoreResult<AuthCredential> {
        credential.validate()?;
        let now = Utc::now().timestamp();
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "INSERT INTO auth_users (user_id, username, password_hash, created, updated) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(credential.user_id)
        .bind(&credential.username)
        .bind(&credential.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(credential_from_row(row))
    }

    async fn update_credential(&self, credential: AuthCredential) -> StoreResult<AuthCredential> {
        credential.validate()?;
        let now = Utc::now().timestamp();
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "INSERT INTO auth_users (user_id, username, password_hash, created, updated) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 username = EXCLUDED.username, \
                 password_hash = EXCLUDED.password_hash, \
                 updated = EXCLUDED.updated \
             RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(credential.user_id)
        .bind(&credential.username)
        .bind(&credential.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(credential_from_row(row))
    }
}
