pub mod user;

use clap::{Parser, Subcommand};

pub use user::UserCommands;

#[derive(Parser, Debug)]
#[command(name = "perch", version, about = "Perch identity administration")]
pub struct Cli {
    /// Base URL of the Perch API server.
    #[arg(long, global = true, env = "PERCH_SERVER", default_value = "http://127.0.0.1:8000")]
    pub server: String,

    /// Bearer token used to authenticate (usually the admin token).
    #[arg(long, global = true, env = "PERCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommands),

    /// Print version
    Version,
}
