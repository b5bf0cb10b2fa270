//! CLI argument parsing for the migration commands.
//!
//! The CLI is intentionally thin: it resolves a store and a set of script
//! directories, then hands everything to the engine.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "docmig",
    version,
    about = "Migration runner and version ledger for schemaless document stores",
    after_help = "Commands:\n  migrate <DB> <DIR>...       Execute all open migrations\n  version <DB> [DIR]...       Manually add/delete ledger entries\n  release-lock <DB>           Clear a stranded migration lock\n\nExamples:\n  docmig migrate --store ./data mydb ./migrations\n  docmig migrate --store ./data -c staging mydb ./migrations\n  docmig version --store ./data --add --all mydb ./migrations\n  docmig version --store ./data --delete --id migration-3 mydb ./migrations\n  docmig release-lock --store ./data mydb",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Migrate(MigrateArgs),
    Version(VersionArgs),
    ReleaseLock(ReleaseLockArgs),
}

/// Execute all open migrations against one database.
#[derive(Parser, Debug)]
#[command(about = "Execute all open migrations")]
pub struct MigrateArgs {
    /// Root directory holding one document store per database
    #[arg(long, short = 's', value_name = "DIR", default_value = "./data")]
    pub store: PathBuf,

    /// Context evaluated against each contextual migration (repeatable)
    #[arg(long = "context", short = 'c', value_name = "NAME")]
    pub contexts: Vec<String>,

    /// The database to operate on
    pub database: String,

    /// Directories containing migration scripts
    #[arg(value_name = "DIR", required = true)]
    pub sources: Vec<PathBuf>,
}

/// Manually add or delete ledger entries without executing migrations.
#[derive(Parser, Debug)]
#[command(about = "Manually add and delete migrations from the version ledger")]
pub struct VersionArgs {
    /// Root directory holding one document store per database
    #[arg(long, short = 's', value_name = "DIR", default_value = "./data")]
    pub store: PathBuf,

    /// The migration id to add or delete
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Add the selected migrations to the version ledger (default)
    #[arg(long, conflicts_with = "delete")]
    pub add: bool,

    /// Delete the selected migrations from the version ledger
    #[arg(long)]
    pub delete: bool,

    /// Apply to every discovered migration
    #[arg(long)]
    pub all: bool,

    /// The database to operate on
    pub database: String,

    /// Directories containing migration scripts
    #[arg(value_name = "DIR", required = true)]
    pub sources: Vec<PathBuf>,
}

/// Clear a stranded migration lock.
#[derive(Parser, Debug)]
#[command(about = "Release the current migration lock")]
pub struct ReleaseLockArgs {
    /// Root directory holding one document store per database
    #[arg(long, short = 's', value_name = "DIR", default_value = "./data")]
    pub store: PathBuf,

    /// The database to operate on
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_parses_contexts_and_sources() {
        let args = RootArgs::parse_from([
            "docmig",
            "migrate",
            "--store",
            "/tmp/data",
            "-c",
            "staging",
            "-c",
            "development",
            "mydb",
            "./migrations",
            "./more-migrations",
        ]);
        let Command::Migrate(args) = args.command else {
            panic!("expected migrate");
        };
        assert_eq!(args.database, "mydb");
        assert_eq!(args.contexts, vec!["staging", "development"]);
        assert_eq!(args.sources.len(), 2);
    }

    #[test]
    fn version_rejects_add_and_delete_together() {
        let result = RootArgs::try_parse_from([
            "docmig",
            "version",
            "--add",
            "--delete",
            "--all",
            "mydb",
            "./migrations",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn release_lock_takes_only_store_and_database() {
        let args = RootArgs::parse_from(["docmig", "release-lock", "--store", "/tmp/data", "mydb"]);
        let Command::ReleaseLock(args) = args.command else {
            panic!("expected release-lock");
        };
        assert_eq!(args.database, "mydb");
    }
}
