//! Access gates layered on routes behind [`super::identity::resolve_identity`].
//!
//! A missing principal is 401; a principal without the required privilege is
//! 403.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use perch_core::models::auth::Perm;

use crate::error::AppError;
use crate::middleware::identity::current_user;

/// Require any authenticated principal.
pub async fn must_user(request: Request, next: Next) -> Result<Response, AppError> {
    if current_user(request.extensions()).is_none() {
        return Err(AppError::unauthorized());
    }
    Ok(next.run(request).await)
}

/// Require a site admin.
pub async fn must_admin(request: Request, next: Next) -> Result<Response, AppError> {
    match current_user(request.extensions()) {
        None => Err(AppError::unauthorized()),
        Some(user) if !user.admin => Err(AppError::forbidden()),
        Some(_) => Ok(next.run(request).await),
    }
}

/// Require admin permission on the addressed repository. The [`Perm`] is
/// inserted by whatever loaded the repository; without one the request is
/// refused.
pub async fn must_repo_admin(request: Request, next: Next) -> Result<Response, AppError> {
    if current_user(request.extensions()).is_none() {
        return Err(AppError::unauthorized());
    }
    let admin = request
        .extensions()
        .get::<Perm>()
        .is_some_and(|perm| perm.admin);
    if !admin {
        return Err(AppError::forbidden());
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use perch_core::models::auth::User;
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::identity::{Credential, Identity};

    #[derive(Clone, Copy)]
    enum Gate {
        User,
        Admin,
        RepoAdmin,
    }

    fn identity(admin: bool) -> Identity {
        Identity {
            user: User {
                id: 3,
                login: "carol".into(),
                email: String::new(),
                avatar: String::new(),
                admin,
                hash: "s".into(),
                forge_id: 1,
                forge_remote_id: String::new(),
            },
            credential: Credential::Api,
        }
    }

    async fn status(gate: Gate, identity: Option<Identity>, perm: Option<Perm>) -> StatusCode {
        let routes = Router::new().route("/", get(|| async { "ok" }));
        let routes = match gate {
            Gate::User => routes.route_layer(from_fn(must_user)),
            Gate::Admin => routes.route_layer(from_fn(must_admin)),
            Gate::RepoAdmin => routes.route_layer(from_fn(must_repo_admin)),
        };
        let app = routes.layer(from_fn(move |mut req: Request, next: Next| {
            let identity = identity.clone();
            async move {
                if let Some(identity) = identity {
                    req.extensions_mut().insert(identity);
                }
                if let Some(perm) = perm {
                    req.extensions_mut().insert(perm);
                }
                next.run(req).await
            }
        }));
        app.oneshot(axum::http::Request::new(Body::empty()))
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn must_user_distinguishes_anonymous() {
        assert_eq!(status(Gate::User, None, None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(status(Gate::User, Some(identity(false)), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn must_admin_requires_flag() {
        assert_eq!(status(Gate::Admin, None, None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(Gate::Admin, Some(identity(false)), None).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(status(Gate::Admin, Some(identity(true)), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn must_repo_admin_requires_perm() {
        let admin = Perm {
            pull: true,
            push: true,
            admin: true,
        };
        let reader = Perm {
            pull: true,
            ..Perm::default()
        };
        assert_eq!(
            status(Gate::RepoAdmin, None, Some(admin)).await,
            StatusCode::UNAUTHORIZED
        );
        // site admin without repository permission
        assert_eq!(
            status(Gate::RepoAdmin, Some(identity(true)), None).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(Gate::RepoAdmin, Some(identity(false)), Some(reader)).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(Gate::RepoAdmin, Some(identity(false)), Some(admin)).await,
            StatusCode::OK
        );
    }
}
