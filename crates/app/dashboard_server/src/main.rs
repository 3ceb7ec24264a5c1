//! `dashboard`: serve the account API or administer accounts out of band.

pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};

mod cli;
mod db;
mod logging;
mod server;
mod user;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Cli::parse();

    if let Commands::Version = args.command {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    logging::init()?;

    match args.command {
        Commands::Server(server_args) => server::run(args.database, server_args).await,
        Commands::User(command) => user::run(args.database, command).await,
        Commands::Version => Ok(()),
    }
}
