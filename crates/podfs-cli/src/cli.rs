use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "podfs",
    about = "Pod filesystem over a feed-addressed object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the interactive shell (default)
    Shell(ShellArgs),
    /// Print the effective engine configuration
    Config,
}

#[derive(Args, Default)]
pub struct ShellArgs {
    /// Root secret as 64 hex characters; log in with it on start
    #[arg(long)]
    pub secret: Option<String>,
}

/// One line typed into the shell.
#[derive(Parser)]
#[command(no_binary_name = true, name = "shell", disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand)]
pub enum ShellCommand {
    /// Log in with a root secret (random if omitted)
    Login { secret: Option<String> },
    /// End the session
    Logout,
    /// Manage pods
    #[command(subcommand)]
    Pod(PodCommand),
    /// Create a directory and any missing parents
    Mkdir { path: String },
    /// Remove a directory and everything below it
    Rmdir { path: String },
    /// Change directory
    Cd { path: Option<String> },
    /// Print the working directory
    Pwd,
    /// List a directory
    Ls { path: Option<String> },
    /// Show directory or file details
    Stat { path: String },
    /// Upload a local file into a pod directory
    Put {
        local: PathBuf,
        #[arg(default_value = ".")]
        dir: String,
        /// Name in the pod; defaults to the local file name
        #[arg(long)]
        name: Option<String>,
        /// Block size, e.g. 4096, 64k, 1m
        #[arg(long, value_parser = parse_block_size)]
        block_size: Option<u32>,
    },
    /// Download a file; prints to stdout without a local path
    Get { path: String, local: Option<PathBuf> },
    /// Remove a file
    Rm { path: String },
    /// Print every cached path of the current pod
    Tree,
    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

#[derive(Subcommand)]
pub enum PodCommand {
    /// Create a pod and make it current
    New { name: String },
    /// Open a pod and make it current
    Open { name: String },
    /// Close a pod (the current one by default)
    Close { name: Option<String> },
    /// Delete a pod from the account
    Delete { name: String },
    /// Resynchronize the current pod
    Sync,
    /// List the account's pods
    Ls,
    /// Show pod details
    Stat { name: String },
}

/// Parse a block size with an optional `k` or `m` suffix.
pub fn parse_block_size(s: &str) -> Result<u32, String> {
    let lower = s.trim().to_ascii_lowercase();
    let (digits, multiplier) = if let Some(d) = lower.strip_suffix('k') {
        (d, 1024u64)
    } else if let Some(d) = lower.strip_suffix('m') {
        (d, 1024 * 1024)
    } else {
        (lower.as_str(), 1)
    };
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid block size: {s}"))?;
    let size = n
        .checked_mul(multiplier)
        .filter(|&v| v > 0)
        .ok_or_else(|| format!("block size out of range: {s}"))?;
    u32::try_from(size).map_err(|_| format!("block size out of range: {s}"))
}
