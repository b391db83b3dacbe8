mod backup;
mod cli;
mod commands;
mod config;
mod lock;
mod profile;
mod store;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use profile::Profile;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Show);

    match command {
        Commands::Cc => commands::switch(Profile::Cc, cli.verbose, cli.dry_run)?,
        Commands::Glm => commands::switch(Profile::Glm, cli.verbose, cli.dry_run)?,
        Commands::List => commands::list()?,
        Commands::Restore { index } => commands::restore(index, cli.verbose, cli.dry_run)?,
        Commands::Show => commands::show()?,
        Commands::Completions { shell } => commands::completions(shell)?,
    }

    Ok(())
}
