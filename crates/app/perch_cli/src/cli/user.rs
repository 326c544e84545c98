//! `perch user ...`

use clap::{Args, Subcommand};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create a local user
    Add(AddArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Login name
    pub login: String,

    /// Email address
    #[arg(long, default_value = "")]
    pub email: String,

    /// Make the user a site admin
    #[arg(long)]
    pub admin: bool,

    /// Password for local login
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Serialize)]
struct CreateUser<'a> {
    login: &'a str,
    email: &'a str,
    admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreatedUser {
    id: i64,
    login: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Whether a failed response means the user already exists.
fn is_duplicate(status: StatusCode, message: &str) -> bool {
    let message = message.to_lowercase();
    status == StatusCode::CONFLICT
        || message.contains("duplicate")
        || message.contains("already exist")
}

pub fn add(server: &str, token: Option<&str>, args: &AddArgs) -> Result<()> {
    let url = format!("{}/api/users", server.trim_end_matches('/'));
    let mut request = reqwest::blocking::Client::new().post(&url).json(&CreateUser {
        login: &args.login,
        email: &args.email,
        admin: args.admin,
        password: args.password.as_deref(),
    });
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    log::debug!("POST {url}");
    let response = request.send()?;
    let status = response.status();
    if status.is_success() {
        let user: CreatedUser = response.json()?;
        println!("created user {} (id {})", user.login, user.id);
        return Ok(());
    }

    let body: ErrorBody = response.json().unwrap_or_default();
    if is_duplicate(status, &body.message) {
        return Err(Error::UserExists(args.login.clone()));
    }
    Err(Error::Api {
        status: status.as_u16(),
        message: body.message,
    })
}
