// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands, UserCommands};

mod cli;
mod logging;

fn main() -> Result<()> {
    let _logger = logging::init()?;

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = Cli::parse();

    match &args.command {
        Commands::User(UserCommands::Add(add)) => {
            cli::user::add(&args.server, args.token.as_deref(), add)?;
        }
        Commands::Version => {
            println!("perch {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
