//! User handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use perch_core::models::auth::User;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::identity::CurrentUser;
use crate::models::{CreateUserRequest, SetPasswordRequest};
use crate::services::users;

/// `GET /api/user`: the current principal.
pub async fn current_user_handler(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// `POST /api/users`: create a local user (admin only).
pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> AppResult<Json<User>> {
    let user = users::create_user(state.store.as_ref(), body).await?;
    Ok(Json(user))
}

/// `PUT /api/users/{login}/password`: set a user's password (admin only).
pub async fn set_password_handler(
    State(state): State<AppState>,
    Path(login): Path<String>,
    Json(body): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    users::set_password(state.store.as_ref(), &login, body).await?;
    Ok(StatusCode::NO_CONTENT)
}
