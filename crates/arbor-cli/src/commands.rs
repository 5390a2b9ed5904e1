use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::debug;

use arbor_diff::{diff_content, diff_trees, TreeChange, TreeDiff};
use arbor_sdk::{Conflict, MergeReport, Repository, RepositoryConfig, Status};
use arbor_store::{FileObjectStore, ObjectStore};
use arbor_tree::{NodeSpec, Tree};
use arbor_types::ObjectId;

use crate::cli::*;

const REPO_DIR: &str = ".arbor";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init => cmd_init(&cli.repo),
        Command::Commit(args) => cmd_commit(&cli.repo, args),
        Command::Checkout(args) => cmd_checkout(&cli.repo, args),
        Command::Log(args) => cmd_log(&cli.repo, args, format),
        Command::Status => cmd_status(&cli.repo, format),
        Command::Show(args) => cmd_show(&cli.repo, args),
        Command::Diff(args) => cmd_diff(&cli.repo, args),
        Command::Bundle(args) => cmd_bundle(&cli.repo, args),
        Command::Merge(args) => cmd_merge(&cli.repo, args),
    }
}

/// Layout of `<repo>/.arbor`.
struct RepoDir {
    root: PathBuf,
}

impl RepoDir {
    fn at(repo: &Path) -> Self {
        Self {
            root: repo.join(REPO_DIR),
        }
    }

    fn find(repo: &Path) -> anyhow::Result<Self> {
        let dir = Self::at(repo);
        if !dir.head_path().exists() {
            bail!("not an arbor repository: {} (run `arbor init`)", repo.display());
        }
        Ok(dir)
    }

    fn objects_path(&self) -> PathBuf {
        self.root.join("objects")
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    fn read_status(&self) -> anyhow::Result<Status> {
        let text = fs::read_to_string(self.head_path())?;
        serde_json::from_str(&text).context("HEAD is corrupt")
    }

    fn write_status(&self, status: &Status) -> anyhow::Result<()> {
        fs::write(self.head_path(), serde_json::to_string_pretty(status)?)?;
        debug!(%status, "saved HEAD");
        Ok(())
    }

    fn open(&self) -> anyhow::Result<Repository<FileObjectStore>> {
        let config = RepositoryConfig::load(self.config_path())?;
        let store = FileObjectStore::open_with_level(self.objects_path(), config.compression_level)?;
        let status = self.read_status()?;
        Ok(Repository::open(store, config, status)?)
    }
}

fn read_document(path: &Path) -> anyhow::Result<Tree> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let spec: NodeSpec =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Tree::from_spec(&spec)?)
}

fn write_document(path: &Path, tree: &Tree) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&tree.to_spec())?;
    fs::write(path, json + "\n").with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Accept a full commit id or a prefix naming exactly one stored commit.
fn resolve_commit(store: &FileObjectStore, text: &str) -> anyhow::Result<ObjectId> {
    if text.len() == ObjectId::HEX_LEN {
        return Ok(ObjectId::from_hex(text)?);
    }
    let matches: Vec<ObjectId> = store
        .all_ids()?
        .into_iter()
        .filter(|id| id.matches_prefix(text))
        .filter(|id| store.load_commit(id).is_ok())
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no commit matches {text}"),
        _ => bail!("{text} is ambiguous ({} commits match)", matches.len()),
    }
}

fn cmd_init(repo: &Path) -> anyhow::Result<()> {
    let dir = RepoDir::at(repo);
    if dir.head_path().exists() {
        bail!("repository already exists in {}", dir.root.display());
    }
    fs::create_dir_all(dir.objects_path())?;
    RepositoryConfig::default().save(dir.config_path())?;
    dir.write_status(&Status::Bare)?;
    println!("{} Initialized empty Arbor repository in {}", "✓".green().bold(), dir.root.display());
    Ok(())
}

fn cmd_commit(repo: &Path, args: CommitArgs) -> anyhow::Result<()> {
    let dir = RepoDir::find(repo)?;
    let mut repository = dir.open()?;
    let tree = read_document(&args.document)?;
    let nodes = tree.len();
    repository.set_working_tree(tree);
    let author = args.author.unwrap_or_else(|| repository.config().author.clone());
    let was_merging = repository.status().is_conflicted();
    let id = repository.commit(&author)?;
    dir.write_status(repository.status())?;

    let kind = if was_merging { "merge commit" } else { "commit" };
    println!("{} Created {} {}", "✓".green().bold(), kind, id.short_hex().yellow());
    println!("  Author: {author}");
    println!("  Nodes: {nodes}");
    Ok(())
}

fn cmd_checkout(repo: &Path, args: CheckoutArgs) -> anyhow::Result<()> {
    let dir = RepoDir::find(repo)?;
    let mut repository = dir.open()?;
    let sha = resolve_commit(repository.store(), &args.commit)?;
    repository.checkout(&sha)?;
    dir.write_status(repository.status())?;

    match &args.output {
        Some(path) => {
            write_document(path, repository.working_tree())?;
            println!("{} Checked out {} to {}", "✓".green().bold(), sha.short_hex().yellow(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&repository.working_tree().to_spec())?),
    }
    Ok(())
}

fn cmd_log(repo: &Path, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let repository = RepoDir::find(repo)?.open()?;
    let limit = args.limit.unwrap_or(repository.config().log_limit);
    let history = repository.log(limit)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("No commits yet.");
    }
    for node in history {
        let when = node
            .timestamp
            .to_datetime()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| node.timestamp.to_string());
        let marker = if node.is_merge() { " (merge)".cyan().to_string() } else { String::new() };
        println!("{}{}", node.id.short_hex().yellow().bold(), marker);
        println!("  Author: {}", node.author);
        println!("  Date:   {when}");
    }
    Ok(())
}

fn cmd_status(repo: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let dir = RepoDir::find(repo)?;
    let status = dir.read_status()?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    match &status {
        Status::Bare => println!("No commits yet."),
        Status::Clean { head } => println!("At {}, {}", head.short_hex().yellow().bold(), "clean".green()),
        Status::MergeConflict { ours, theirs, conflicts } => {
            println!(
                "Merging {} into {}: {} unresolved",
                theirs.short_hex().yellow(),
                ours.short_hex().yellow(),
                format!("{} conflicts", conflicts.len()).red().bold()
            );
            for conflict in conflicts {
                println!("  {} {}", "✗".red(), conflict);
            }
            println!("\nEdit the document and commit it to conclude the merge.");
        }
    }
    Ok(())
}

fn cmd_show(repo: &Path, args: ShowArgs) -> anyhow::Result<()> {
    let repository = RepoDir::find(repo)?.open()?;
    let sha = resolve_commit(repository.store(), &args.commit)?;
    let commit = repository.read_commit(&sha)?;

    println!("{} {}", "commit".yellow(), sha.to_hex().yellow());
    println!("Tree:    {}", commit.tree.short_hex());
    for parent in &commit.parents {
        println!("Parent:  {}", parent.short_hex());
    }
    println!("Author:  {}", commit.author);
    println!("Date:    {}", commit.timestamp);
    println!();

    let diff = match commit.parents.first() {
        Some(parent) => repository.diff_commits(parent, &sha)?,
        None => diff_trees(&Tree::new(), &repository.tree_at(&sha)?),
    };
    print_tree_diff(&diff);
    Ok(())
}

fn cmd_diff(repo: &Path, args: DiffArgs) -> anyhow::Result<()> {
    let mut repository = RepoDir::find(repo)?.open()?;
    repository.set_working_tree(read_document(&args.document)?);
    let diff = repository.diff_working()?;
    print_tree_diff(&diff);
    Ok(())
}

fn cmd_bundle(repo: &Path, args: BundleArgs) -> anyhow::Result<()> {
    let repository = RepoDir::find(repo)?.open()?;
    let haves = args
        .haves
        .iter()
        .map(|h| ObjectId::from_hex(h).with_context(|| format!("bad commit id {h}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let bundle = repository.bundle_for(&haves)?;
    fs::write(&args.output, bundle.encode()?)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "{} Wrote {} objects for {} to {}",
        "✓".green().bold(),
        bundle.len(),
        bundle.head.short_hex().yellow(),
        args.output.display()
    );
    Ok(())
}

fn cmd_merge(repo: &Path, args: MergeArgs) -> anyhow::Result<()> {
    let dir = RepoDir::find(repo)?;
    let mut repository = dir.open()?;
    if args.document.exists() {
        repository.set_working_tree(read_document(&args.document)?);
    }
    let bytes = fs::read(&args.bundle).with_context(|| format!("reading {}", args.bundle.display()))?;
    let report = repository.merge_bundle(&bytes)?;
    dir.write_status(repository.status())?;
    write_document(&args.document, repository.working_tree())?;

    match report {
        MergeReport::UpToDate => println!("Already up to date."),
        MergeReport::FastForward { head } => {
            println!("{} Fast-forwarded to {}", "✓".green().bold(), head.short_hex().yellow())
        }
        MergeReport::Merged { head } => {
            println!("{} Merged cleanly as {}", "✓".green().bold(), head.short_hex().yellow())
        }
        MergeReport::Conflicted { conflicts } => {
            println!(
                "{} Merge stopped with {}",
                "✗".red().bold(),
                format!("{} conflicts", conflicts.len()).red()
            );
            for conflict in &conflicts {
                print_conflict(conflict);
            }
            println!("\nEdit {} and commit it to conclude the merge.", args.document.display());
        }
    }
    Ok(())
}

fn print_conflict(conflict: &Conflict) {
    println!("  {} {}", "✗".red(), conflict);
    if let (Some(ours), Some(theirs)) = (&conflict.ours, &conflict.theirs) {
        for line in diff_content(ours, theirs).to_string().lines() {
            println!("    {}", colorize_line(line));
        }
    }
}

fn print_tree_diff(diff: &TreeDiff) {
    if diff.is_empty() {
        println!("No changes.");
        return;
    }
    for change in &diff.changes {
        let line = change.to_string();
        match change {
            TreeChange::Added { .. } => println!("{}", line.green()),
            TreeChange::Deleted { .. } => println!("{}", line.red()),
            TreeChange::Moved { .. } => println!("{}", line.cyan()),
            TreeChange::ContentChanged { old, new, .. } => {
                println!("{}", line.yellow());
                for hunk_line in diff_content(old, new).to_string().lines() {
                    println!("    {}", colorize_line(hunk_line));
                }
            }
        }
    }
}

fn colorize_line(line: &str) -> String {
    if line.starts_with("@@") {
        line.cyan().to_string()
    } else if line.starts_with('+') {
        line.green().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else {
        line.to_string()
    }
}
