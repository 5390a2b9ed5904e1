use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arbor",
    about = "Arbor: versioned hierarchical documents",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the `.arbor` repository
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub repo: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty repository
    Init,
    /// Record a JSON document as a new commit
    Commit(CommitArgs),
    /// Restore the document of a commit
    Checkout(CheckoutArgs),
    /// Show commit history
    Log(LogArgs),
    /// Show repository state and pending conflicts
    Status,
    /// Show a commit and what it changed
    Show(ShowArgs),
    /// Show changes in a document since the head
    Diff(DiffArgs),
    /// Write the objects a peer needs into a bundle file
    Bundle(BundleArgs),
    /// Merge a bundle received from a peer into a document
    Merge(MergeArgs),
}

#[derive(Args)]
pub struct CommitArgs {
    /// Document to commit
    pub document: PathBuf,
    /// Author name (defaults to the configured author)
    #[arg(short, long)]
    pub author: Option<String>,
}

#[derive(Args)]
pub struct CheckoutArgs {
    /// Commit id or unique prefix
    pub commit: String,
    /// Write the document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct LogArgs {
    /// Number of commits (defaults to the configured limit)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Commit id or unique prefix
    pub commit: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub document: PathBuf,
}

#[derive(Args)]
pub struct BundleArgs {
    /// Output file
    pub output: PathBuf,
    /// Commits the receiver already has (full ids)
    #[arg(long = "have")]
    pub haves: Vec<String>,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Bundle file from a peer
    pub bundle: PathBuf,
    /// Working document; rewritten with the merge result
    pub document: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_bundle_haves() {
        let cli = Cli::parse_from(["arbor", "bundle", "out.arbb", "--have", "aa", "--have", "bb"]);
        match cli.command {
            Command::Bundle(args) => assert_eq!(args.haves, vec!["aa", "bb"]),
            _ => panic!("expected bundle"),
        }
    }

    #[test]
    fn global_flags_anywhere() {
        let cli = Cli::parse_from(["arbor", "log", "-n", "5", "-v", "-C", "/tmp/doc"]);
        assert!(cli.verbose);
        assert_eq!(cli.repo, PathBuf::from("/tmp/doc"));
        assert!(matches!(cli.command, Command::Log(LogArgs { limit: Some(5) })));
    }
}
