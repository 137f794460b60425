// src/lib.rs

//! Bindery Package Manager
//!
//! Package manager that overlays many packages' private file trees onto a
//! single, deduplicated root.
//!
//! # Architecture
//!
//! - Database-first: all state in SQLite, no config files
//! - Ledger: every change to the root is staged before it is committed
//! - Bindings: a path is an exclusive link into one package's storage, or a
//!   real directory shared by several packages
//! - Changesets: each install or removal is recorded and recoverable

pub mod config;
pub mod db;
mod error;
pub mod filesystem;
pub mod ledger;
pub mod linker;
pub mod packages;
pub mod resolver;
pub mod transaction;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use filesystem::{FilesystemApplier, NullApplier, RootfsApplier};
pub use ledger::{CommitSummary, Ledger};
pub use linker::{LinkEngine, UnlinkEngine};
pub use packages::{Package, PackageCache, PackageSource};
pub use resolver::DependencyResolver;
pub use transaction::{
    ConsistencyReport, RecoveryPolicy, TransactionGuard, TransactionManager, TransactionSummary,
};
pub use version::{Version, VersionRange};
