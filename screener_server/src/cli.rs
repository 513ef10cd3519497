use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "screener", version, about = "Incremental candidate screening pipeline")]
pub struct Cli {
    /// Directory holding `credentials.db` and the cursor file.
    #[arg(long, global = true, env = "SCREENER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the pipeline tick and the token sweep on their schedules (default).
    Run,

    /// Run one pipeline tick now and print its report.
    Tick,

    /// Refresh every stored identity now.
    RefreshTokens,

    /// Manage stored identities.
    Identity {
        #[command(subcommand)]
        command: IdentityCommand,
    },

    /// Inspect or move the source cursor.
    Cursor {
        #[command(subcommand)]
        command: CursorCommand,
    },

    /// Print the effective configuration (redacted secrets).
    Config,
}

#[derive(Debug, Subcommand)]
pub enum IdentityCommand {
    /// Store the token pair produced by the login flow for an account.
    Put {
        #[arg(long)]
        account: String,
        #[arg(long, env = "SCREENER_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "SCREENER_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },

    /// List stored identities with tokens redacted.
    List,
}

#[derive(Debug, Subcommand)]
pub enum CursorCommand {
    Show,

    /// Overwrite the cursor; lower values make rows be screened again.
    Set { value: u64 },
}
