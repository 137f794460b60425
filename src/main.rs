// src/main.rs

use anyhow::Result;
use bindery::config::{Config, DEFAULT_BASE_DIR};
use bindery::transaction::{RecoveryPolicy, TransactionGuard, TransactionManager};
use bindery::{PackageCache, RootfsApplier};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "bindery")]
#[command(author, version, about = "Package manager that overlays package trees onto a shared root", long_about = None)]
struct Cli {
    /// Base directory for the database and package storage
    #[arg(long, env = "BINDERY_BASE_DIR", default_value = DEFAULT_BASE_DIR, global = true)]
    base_dir: PathBuf,

    /// Directory the unified root is built in (default: <base-dir>/root)
    #[arg(long, env = "BINDERY_ROOT", global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn config(&self) -> Config {
        let config = Config::with_base(&self.base_dir);
        match &self.root {
            Some(root) => config.with_root(root),
            None => config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the Bindery database and storage directories
    Init,
    /// Install or upgrade packages from archives (.txz, .tgz, .tar.zst, .tar)
    Install {
        /// Package archives, installed as one transaction
        #[arg(required = true)]
        archives: Vec<PathBuf>,
    },
    /// Remove installed packages
    Remove {
        /// Package names, removed as one transaction
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Query installed packages
    Query {
        /// Package name pattern (optional, shows all if omitted)
        pattern: Option<String>,
    },
    /// Show the bindings that make up the unified root
    Bindings {
        /// Only show bindings owned by this package
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Show changeset history
    History,
    /// Check for an interrupted transaction
    Check,
    /// Finish or discard an interrupted transaction
    Recover {
        /// Restore the state before the interrupted transaction instead of completing it
        #[arg(long)]
        discard: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn open_db(config: &Config) -> Result<rusqlite::Connection> {
    Ok(bindery::db::open(config.db_path_str()?)?)
}

/// Refuse early, before any archive is unpacked
fn ensure_no_pending(conn: &mut rusqlite::Connection) -> Result<()> {
    let report = TransactionManager::new(conn).check_consistency()?;
    if !report.is_clean() {
        return Err(anyhow::anyhow!(
            "An interrupted transaction is pending; run 'bindery check' and 'bindery recover'"
        ));
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Some(Commands::Init) => {
            let db_path = config.db_path_str()?;
            info!("Initializing Bindery database at: {}", db_path);
            bindery::db::init(db_path)?;
            config.ensure_dirs()?;
            println!("Database initialized successfully at: {}", db_path);
            println!("  Package storage: {}", config.install_dir.display());
            println!("  Root: {}", config.root.display());
            Ok(())
        }
        Some(Commands::Install { archives }) => {
            let mut conn = open_db(&config)?;
            ensure_no_pending(&mut conn)?;
            config.ensure_dirs()?;

            let cache = PackageCache::new(&config.cache_dir, &config.install_dir);
            let packages = archives
                .iter()
                .map(|archive| {
                    info!("Importing package archive: {}", archive.display());
                    bindery::packages::import_archive(
                        archive,
                        &config.work_dir,
                        &config.install_dir,
                        &cache,
                    )
                })
                .collect::<bindery::Result<Vec<_>>>()?;

            let applier = RootfsApplier::new(&config.root);
            let summary =
                TransactionGuard::new(&mut conn, &cache, &applier, &config.install_dir)
                    .install(&packages)?;

            for package in &packages {
                println!("Installed package: {} version {}", package.name, package.version);
                println!("  Dependencies: {}", package.depends.len());
            }
            println!(
                "Changeset {}: {} binding(s) created, {} removed",
                summary.changeset_id, summary.created, summary.removed
            );
            Ok(())
        }
        Some(Commands::Remove { names }) => {
            let mut conn = open_db(&config)?;

            let cache = PackageCache::new(&config.cache_dir, &config.install_dir);
            let applier = RootfsApplier::new(&config.root);
            let summary =
                TransactionGuard::new(&mut conn, &cache, &applier, &config.install_dir)
                    .uninstall(&names)?;

            for name in &names {
                println!("Removed package: {}", name);
            }
            println!(
                "Changeset {}: {} binding(s) created, {} removed",
                summary.changeset_id, summary.created, summary.removed
            );
            Ok(())
        }
        Some(Commands::Query { pattern }) => {
            let conn = open_db(&config)?;
            let packages = bindery::db::models::InstalledPackage::list(&conn, pattern.as_deref())?;

            if packages.is_empty() {
                println!("No packages found.");
            } else {
                println!("Installed packages:");
                for package in &packages {
                    let current = package
                        .current_version
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "(not linked)".to_string());
                    let available: Vec<String> =
                        package.available_versions.iter().map(|v| v.to_string()).collect();
                    println!("  {} {} [available: {}]", package.name, current, available.join(", "));
                }
                println!("\nTotal: {} package(s)", packages.len());
            }

            Ok(())
        }
        Some(Commands::Bindings { package }) => {
            let conn = open_db(&config)?;
            let bindings = match &package {
                Some(name) => bindery::db::models::Binding::find_by_owner(&conn, name)?,
                None => bindery::db::models::Binding::list_all(&conn)?,
            };

            if bindings.is_empty() {
                println!("No bindings.");
            } else {
                for binding in &bindings {
                    let owners: Vec<&str> = binding.owners.iter().map(String::as_str).collect();
                    let target = match &binding.physical_path {
                        Some(physical) => format!("-> {}", physical),
                        None => "(shared directory)".to_string(),
                    };
                    println!(
                        "  {:<14} {} {} [{}]",
                        binding.commit_state.as_str(),
                        binding.rootfs_path,
                        target,
                        owners.join(",")
                    );
                }
                println!("\nTotal: {} binding(s)", bindings.len());
            }

            Ok(())
        }
        Some(Commands::History) => {
            let conn = open_db(&config)?;
            let changesets = bindery::db::models::Changeset::list_all(&conn)?;

            if changesets.is_empty() {
                println!("No changeset history.");
            } else {
                println!("Changeset history:");
                for changeset in &changesets {
                    let timestamp = changeset
                        .applied_at
                        .as_ref()
                        .or(changeset.rolled_back_at.as_ref())
                        .or(changeset.created_at.as_ref())
                        .map(|s| s.as_str())
                        .unwrap_or("pending");

                    println!(
                        "  [{}] {} - {} ({})",
                        changeset.id.unwrap_or_default(),
                        timestamp,
                        changeset.description,
                        changeset.status.as_str()
                    );
                }
                println!("\nTotal: {} changeset(s)", changesets.len());
            }

            Ok(())
        }
        Some(Commands::Check) => {
            let mut conn = open_db(&config)?;
            let manager = TransactionManager::new(&mut conn);
            let report = manager.check_consistency()?;

            if report.is_clean() {
                println!("No interrupted transaction.");
            } else {
                println!("Interrupted transaction found:");
                if let Some(changeset) = manager.current_transaction()? {
                    println!("  Changeset: [{}] {}", changeset.id.unwrap_or_default(), changeset.description);
                }
                println!("  Pending creates: {}", report.pending_create);
                println!("  Pending deletes: {}", report.pending_delete);
                println!("  Owner edits: {}", report.pending_owner_edits);
                println!("  Open changesets: {}", report.open_changesets);
                println!("\nRun 'bindery recover' to complete it, or 'bindery recover --discard' to undo it.");
            }

            Ok(())
        }
        Some(Commands::Recover { discard }) => {
            let mut conn = open_db(&config)?;
            let policy = if discard {
                RecoveryPolicy::Discard
            } else {
                RecoveryPolicy::RollForward
            };

            let applier = RootfsApplier::new(&config.root);
            let summary = TransactionManager::new(&mut conn).recover(policy, &applier)?;

            println!(
                "Recovery complete ({:?}): {} removed, {} created",
                policy, summary.removed, summary.created
            );
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "bindery", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Bindery Package Manager v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'bindery --help' for usage information");
            Ok(())
        }
    }
}
