use anyhow::{bail, Context, Result};
use clap::Parser;
use docmig::cli::{Command, MigrateArgs, ReleaseLockArgs, RootArgs, VersionArgs};
use docmig::source::script_sources;
use docmig::store::FileStore;
use docmig::versions::EditMode;
use docmig::{lock, registry, runner, versions};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Migrate(args) => cmd_migrate(args),
        Command::Version(args) => cmd_version(args),
        Command::ReleaseLock(args) => cmd_release_lock(args),
    }
}

fn open_store(root: &Path, database: &str) -> Result<FileStore> {
    let store = FileStore::open(root.join(database))
        .with_context(|| format!("open store for database '{database}'"))?;
    Ok(store)
}

fn cmd_migrate(args: MigrateArgs) -> Result<()> {
    let sources = script_sources(&args.sources);
    let registry = registry::discover(&sources)?;
    let store = open_store(&args.store, &args.database)?;

    let progress = ProgressBar::new(registry.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("[{bar:40}] {pos}/{len} {wide_msg}")
            .context("progress template")?
            .progress_chars("=> "),
    );

    let executed = runner::run(&store, &registry, &args.contexts, |report| {
        progress.set_message(report.migration.name().to_string());
        progress.inc(1);
    })?;
    progress.finish_and_clear();

    println!("✓ Successfully executed {executed} migrations");
    Ok(())
}

fn cmd_version(args: VersionArgs) -> Result<()> {
    // Add is the default behavior; --add --delete together is rejected by
    // the parser. Validate the selection before anything touches the store.
    let mode = if args.delete {
        EditMode::Delete
    } else {
        EditMode::Add
    };
    if !args.all && args.id.is_none() {
        bail!("specify --all or a single migration id");
    }
    let only_id = if args.all { None } else { args.id.as_deref() };

    let sources = script_sources(&args.sources);
    let registry = registry::discover(&sources)?;
    let store = open_store(&args.store, &args.database)?;

    let affected = versions::apply(&store, &registry, mode, only_id)?;
    match mode {
        EditMode::Add => {
            println!("✓ Successfully added {affected} migrations to version ledger");
        }
        EditMode::Delete => {
            println!("✓ Successfully deleted {affected} migrations from version ledger");
        }
    }
    Ok(())
}

fn cmd_release_lock(args: ReleaseLockArgs) -> Result<()> {
    let store = open_store(&args.store, &args.database)?;
    lock::force_release(&store)?;
    println!("✓ Successfully released migration lock");
    Ok(())
}
