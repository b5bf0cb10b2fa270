//! Migration orchestration for schemaless document stores.
//!
//! Migrations are user-authored units with a stable id, a create date, and
//! an execute step. The engine discovers them from sources, orders them by
//! create date, takes a lock document so only one run mutates the store at a
//! time, and records each execution in a version ledger. Always-run units
//! re-execute on every run; contextual units only run when a requested
//! context matches.
//!
//! ```no_run
//! use docmig::source::script_sources;
//! use docmig::store::MemoryStore;
//!
//! # fn main() -> Result<(), docmig::MigrateError> {
//! let sources = script_sources(&["./migrations".into()]);
//! let registry = docmig::registry::discover(&sources)?;
//! let store = MemoryStore::new();
//! let executed = docmig::runner::run(&store, &registry, &[], |_| {})?;
//! println!("executed {executed} migrations");
//! # Ok(())
//! # }
//! ```
pub mod cli;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod migration;
pub mod registry;
pub mod runner;
pub mod script;
pub mod source;
pub mod store;
#[cfg(test)]
mod testutil;
pub mod versions;

pub use error::{MigrateError, StoreError};
pub use migration::{migration_hash, Migration};
pub use registry::Registry;
pub use runner::{UnitReport, UnitStatus};
