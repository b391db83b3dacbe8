use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "ccglm")]
#[command(author, version, about = "Switch Claude Code between the Anthropic API and Zhipu GLM")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Print diagnostic output while running
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Compute and print what would change, without touching any file
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Switch settings back to the Anthropic API (removes GLM overrides)
    Cc,

    /// Switch settings to the Zhipu GLM endpoint (requires GLM_AUTH_TOKEN)
    Glm,

    /// List settings backups, newest first
    List,

    /// Restore a backup over the live settings
    Restore {
        /// 1-based index from `list` output; indices shift as backups
        /// come and go, so list right before restoring. Prompts when omitted.
        index: Option<usize>,
    },

    /// Show live settings and the detected profile (default when no command given)
    Show,

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}
