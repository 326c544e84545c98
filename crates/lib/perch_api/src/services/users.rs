//! Local user administration.

use perch_core::auth::keys::generate_secret;
use perch_core::auth::password::hash_password_blocking;
use perch_core::models::auth::{AuthCredential, DEFAULT_FORGE_ID, User};
use perch_core::store::{Store, StoreError};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{CreateUserRequest, SetPasswordRequest};

async fn find_existing(
    store: &dyn Store,
    forge_id: i64,
    login: &str,
    email: &str,
) -> AppResult<Option<User>> {
    match store.find_user_by_login(forge_id, login).await {
        Ok(user) => return Ok(Some(user)),
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }
    match store.find_user_by_email(forge_id, email).await {
        Ok(user) => Ok(Some(user)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn already_exists(login: &str) -> AppError {
    AppError::Conflict(format!("user {login} already exists"))
}

/// Attach a credential to a user that already exists.
async fn add_credential(store: &dyn Store, user: User, digest: String) -> AppResult<User> {
    match store
        .create_credential(AuthCredential::new(user.id, &user.login, digest))
        .await
    {
        Ok(_) => Ok(user),
        Err(StoreError::Conflict(_)) => Err(already_exists(&user.login)),
        Err(e) => Err(e.into()),
    }
}

/// Find or create a user and, when a password is given, its credential.
///
/// A new user and its credential are inserted together, so a duplicate
/// username (409) never leaves a user behind and never touches another
/// request's user.
pub async fn create_user(store: &dyn Store, request: CreateUserRequest) -> AppResult<User> {
    let login = request.login.trim();
    if login.is_empty() {
        return Err(AppError::Validation("login required".into()));
    }
    let email = request.email.trim();
    let forge_id = request.forge_id.unwrap_or(DEFAULT_FORGE_ID);

    let digest = match request.password.filter(|p| !p.trim().is_empty()) {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    if let Some(user) = find_existing(store, forge_id, login, email).await? {
        return match digest {
            Some(digest) => add_credential(store, user, digest).await,
            None => Ok(user),
        };
    }

    let user = User {
        id: 0,
        login: login.to_string(),
        email: email.to_string(),
        avatar: request.avatar,
        admin: request.admin,
        hash: generate_secret(),
        forge_id,
        forge_remote_id: String::new(),
    };
    user.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let inserted = match &digest {
        Some(digest) => store
            .create_user_with_credential(user, digest.clone())
            .await
            .map(|(user, _)| user),
        None => store.create_user(user).await,
    };
    let user = match inserted {
        Ok(user) => user,
        // Another writer took the login or the username first.
        Err(StoreError::Conflict(_)) => {
            let Some(existing) = find_existing(store, forge_id, login, email).await? else {
                return Err(already_exists(login));
            };
            match digest {
                Some(digest) => add_credential(store, existing, digest).await?,
                None => existing,
            }
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, login = %user.login, "local user created");
    Ok(user)
}

/// Set (or create) the password credential of an existing user.
pub async fn set_password(
    store: &dyn Store,
    login: &str,
    request: SetPasswordRequest,
) -> AppResult<()> {
    if request.password.trim().is_empty() {
        return Err(AppError::Validation("password required".into()));
    }
    let forge_id = request.forge_id.unwrap_or(DEFAULT_FORGE_ID);
    let user = match store.find_user_by_login(forge_id, login).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(AppError::NotFound(format!("user {login}"))),
        Err(e) => return Err(e.into()),
    };
    let digest = hash_password_blocking(request.password).await?;
    store
        .update_credential(AuthCredential::new(user.id, &user.login, digest))
        .await?;
    info!(user_id = user.id, "password updated");
    Ok(())
}

/// Create `login` as an admin in the default forge unless it exists.
///
/// Returns whether a user was created.
pub async fn ensure_admin_user(store: &dyn Store, login: &str) -> AppResult<bool> {
    match store.find_user_by_login(DEFAULT_FORGE_ID, login).await {
        Ok(user) => {
            if !user.admin {
                warn!(login, "admin token user exists but is not an admin");
            }
            return Ok(false);
        }
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }
    let user = User {
        id: 0,
        login: login.to_string(),
        email: String::new(),
        avatar: String::new(),
        admin: true,
        hash: generate_secret(),
        forge_id: DEFAULT_FORGE_ID,
        forge_remote_id: String::new(),
    };
    user.validate().map_err(|e| AppError::Validation(e.to_string()))?;
    let user = store.create_user(user).await?;
    info!(user_id = user.id, login, "created admin token user");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use perch_core::store::MemoryStore;

    use super::*;

    fn request(login: &str, password: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            login: login.into(),
            password: password.map(str::to_string),
            ..CreateUserRequest::default()
        }
    }

    #[tokio::test]
    async fn creates_user_with_secret_and_credential() {
        let store = MemoryStore::new();
        let user = create_user(&store, request(" dave ", Some("pw"))).await.unwrap();
        assert_eq!(user.login, "dave");
        assert_eq!(user.hash.len(), 64);
        let cred = store.find_credential_by_username("dave").await.unwrap();
        assert_eq!(cred.user_id, user.id);
    }

    #[tokio::test]
    async fn existing_user_is_reused() {
        let store = MemoryStore::new();
        let first = create_user(&store, request("erin", None)).await.unwrap();
        let second = create_user(&store, request("erin", Some("pw"))).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn duplicate_credential_rolls_back_new_user() {
        let store = MemoryStore::new();
        create_user(&store, request("frank", Some("pw"))).await.unwrap();

        let mut other = request("frank", Some("pw"));
        other.forge_id = Some(9);
        let err = create_user(&store, other).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.find_user_by_login(9, "frank").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_creations_never_remove_the_winner() {
        let store = std::sync::Arc::new(MemoryStore::new());
        for trial in 0..10 {
            let login = format!("hank{trial}");
            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    let body = request(&login, Some("pw"));
                    tokio::spawn(async move { create_user(store.as_ref(), body).await })
                })
                .collect();

            let mut winners = Vec::new();
            let mut conflicts = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(user) => winners.push(user),
                    Err(AppError::Conflict(_)) => conflicts += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!((winners.len(), conflicts), (1, 1), "trial {trial}");
            let cred = store.find_credential_by_username(&login).await.unwrap();
            assert_eq!(cred.user_id, winners[0].id);
            assert!(store.find_user_by_id(winners[0].id).await.is_ok());
        }
    }

    #[tokio::test]
    async fn blank_login_and_invalid_login_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            create_user(&store, request("  ", None)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_user(&store, request("no spaces", None)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn set_password_upserts() {
        let store = MemoryStore::new();
        create_user(&store, request("gina", None)).await.unwrap();
        let body = SetPasswordRequest {
            password: "pw".into(),
            forge_id: None,
        };
        set_password(&store, "gina", body.clone()).await.unwrap();
        set_password(&store, "gina", body.clone()).await.unwrap();
        assert!(store.find_credential_by_username("gina").await.is_ok());
        assert!(matches!(
            set_password(&store, "nobody", body).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn ensure_admin_user_is_idempotent() {
        let store = MemoryStore::new();
        assert!(ensure_admin_user(&store, "root").await.unwrap());
        assert!(!ensure_admin_user(&store, "root").await.unwrap());
        let root = store.find_user_by_login(DEFAULT_FORGE_ID, "root").await.unwrap();
        assert!(root.admin);
    }
}
