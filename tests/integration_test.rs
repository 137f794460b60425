// tests/integration_test.rs

//! Integration tests for Bindery
//!
//! These tests drive whole transactions against a real database, real
//! archives and a real root directory.

mod common;

use bindery::db::models::{Binding, Changeset, ChangesetStatus, CommitState, InstalledPackage};
use bindery::{
    Error, FilesystemApplier, Package, PackageCache, RecoveryPolicy, RootfsApplier,
    TransactionGuard, TransactionManager, TransactionSummary, db,
};
use common::{ArchiveSpec, Fixture, is_link, is_real_dir, write_archive};
use std::fs;
use tempfile::NamedTempFile;

fn import(fixture: &Fixture, cache: &PackageCache, specs: &[ArchiveSpec]) -> Vec<Package> {
    let archives = fixture.archives();
    specs
        .iter()
        .map(|spec| {
            let archive = write_archive(&archives, spec);
            bindery::packages::import_archive(
                &archive,
                &fixture.config.work_dir,
                &fixture.config.install_dir,
                cache,
            )
            .unwrap()
        })
        .collect()
}

fn install(fixture: &Fixture, cache: &PackageCache, specs: &[ArchiveSpec]) -> TransactionSummary {
    let packages = import(fixture, cache, specs);
    let mut conn = fixture.conn();
    let applier = RootfsApplier::new(&fixture.config.root);
    TransactionGuard::new(&mut conn, cache, &applier, &fixture.config.install_dir)
        .install(&packages)
        .unwrap()
}

fn remove(fixture: &Fixture, cache: &PackageCache, names: &[&str]) -> TransactionSummary {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let mut conn = fixture.conn();
    let applier = RootfsApplier::new(&fixture.config.root);
    TransactionGuard::new(&mut conn, cache, &applier, &fixture.config.install_dir)
        .uninstall(&names)
        .unwrap()
}

fn cache(fixture: &Fixture) -> PackageCache {
    PackageCache::new(&fixture.config.cache_dir, &fixture.config.install_dir)
}

fn owners_of(conn: &rusqlite::Connection, path: &str) -> Vec<String> {
    let active = Binding::find_active_by_path(conn, path).unwrap();
    assert_eq!(active.len(), 1, "expected one active binding for {}", path);
    active[0].owners.iter().cloned().collect()
}

fn read(fixture: &Fixture, path: &str) -> String {
    fs::read_to_string(fixture.rooted(path)).unwrap()
}

#[test]
fn test_database_lifecycle() {
    // Create a temporary database
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap().to_string();

    // Remove the temp file so init can create it
    drop(temp_file);

    let init_result = db::init(&db_path);
    assert!(init_result.is_ok(), "Database initialization should succeed");
    assert!(
        std::path::Path::new(&db_path).exists(),
        "Database file should exist after initialization"
    );

    let conn = db::open(&db_path).unwrap();
    assert!(Binding::list_all(&conn).unwrap().is_empty());
    assert!(Changeset::list_all(&conn).unwrap().is_empty());
}

#[test]
fn test_database_init_creates_parent_directories() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("nested/path/to/bindery.db")
        .to_str()
        .unwrap()
        .to_string();

    let result = db::init(&db_path);
    assert!(result.is_ok(), "Should create parent directories");
    assert!(std::path::Path::new(&db_path).exists());
}

#[test]
fn test_open_missing_database() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("missing.db");
    let result = db::open(db_path.to_str().unwrap());
    assert!(matches!(result, Err(Error::DatabaseNotFound(_))));
}

#[test]
fn test_first_package_owns_the_root() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    let summary = install(&fixture, &cache, &[common::nano()]);
    assert_eq!(summary.created, 1);

    let root = &fixture.config.root;
    assert!(is_link(root));
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
    assert_eq!(read(&fixture, "/usr/local/reources.file"), "usr/local/reources.file");

    // Payload left the work directory for private storage
    assert!(fixture.stored("nano", "1.3", "/bin/nano").is_file());
    assert!(!fixture.config.work_dir.join("nano-1.3").exists());
    assert!(cache.trace_path("nano", &"1.3".parse().unwrap()).is_file());
}

#[test]
fn test_second_package_splits_shared_directories() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    install(&fixture, &cache, &[common::nano()]);
    install(&fixture, &cache, &[common::vim()]);

    let conn = fixture.conn();
    for shared in ["/", "/bin/", "/usr/", "/usr/docs/", "/usr/share/", "/usr/share/lib/"] {
        assert_eq!(owners_of(&conn, shared), vec!["nano", "vim"], "{}", shared);
        assert!(is_real_dir(&fixture.rooted(shared)), "{} should be a directory", shared);
    }
    for (path, owner) in [
        ("/bin/nano", "nano"),
        ("/usr/docs/nano/", "nano"),
        ("/usr/local/", "nano"),
        ("/usr/share/lib/libnano.so", "nano"),
        ("/bin/vim", "vim"),
        ("/lib/", "vim"),
        ("/usr/docs/vim/", "vim"),
        ("/usr/share/lib/libvim.so", "vim"),
    ] {
        assert_eq!(owners_of(&conn, path), vec![owner], "{}", path);
        assert!(is_link(&fixture.rooted(path)), "{} should be a link", path);
    }

    assert_eq!(read(&fixture, "/bin/vim"), "bin/vim");
    assert_eq!(read(&fixture, "/lib/libvim2.so"), "lib/libvim2.so");
    assert_eq!(read(&fixture, "/usr/docs/nano/documentation.txt"), "usr/docs/nano/documentation.txt");
    assert_eq!(Binding::count_by_state(&conn, CommitState::PendingCreate).unwrap(), 0);
    assert_eq!(Binding::count_by_state(&conn, CommitState::PendingDelete).unwrap(), 0);
}

#[test]
fn test_removal_collapses_to_remaining_owner() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    install(&fixture, &cache, &[common::nano()]);
    install(&fixture, &cache, &[common::vim()]);
    remove(&fixture, &cache, &["vim"]);

    let conn = fixture.conn();
    let active: Vec<Binding> = Binding::list_all(&conn).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].rootfs_path, "/");
    assert_eq!(active[0].sole_owner(), Some("nano"));

    assert!(is_link(&fixture.config.root));
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
    assert!(!fixture.rooted("/bin/vim").exists());
    assert!(!fixture.rooted("/lib").exists());

    let vim = InstalledPackage::find_by_name(&conn, "vim").unwrap().unwrap();
    assert_eq!(vim.current_version, None);
    // Private storage stays behind for a later reinstall
    assert!(fixture.stored("vim", "4.5", "/bin/vim").is_file());
}

#[test]
fn test_removal_keeps_directories_shared_by_others() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    install(&fixture, &cache, &[common::nano(), common::vim(), common::emacs()]);

    let conn = fixture.conn();
    assert_eq!(owners_of(&conn, "/bin/"), vec!["emacs", "nano", "vim"]);
    drop(conn);

    remove(&fixture, &cache, &["emacs"]);

    let conn = fixture.conn();
    assert_eq!(owners_of(&conn, "/bin/"), vec!["nano", "vim"]);
    assert_eq!(owners_of(&conn, "/usr/share/lib/"), vec!["nano", "vim"]);
    assert!(Binding::find_active_by_path(&conn, "/bin/emacs").unwrap().is_empty());

    assert!(is_real_dir(&fixture.rooted("/bin")));
    assert!(!fixture.rooted("/bin/emacs").exists());
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
    assert_eq!(read(&fixture, "/bin/vim"), "bin/vim");
}

#[test]
fn test_reinstall_is_idempotent() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    install(&fixture, &cache, &[common::nano(), common::vim()]);
    let conn = fixture.conn();
    let paths = |conn: &rusqlite::Connection| -> Vec<(String, Vec<String>)> {
        Binding::list_all(conn)
            .unwrap()
            .into_iter()
            .map(|b| (b.rootfs_path, b.owners.into_iter().collect()))
            .collect()
    };
    let before = paths(&conn);
    drop(conn);

    install(&fixture, &cache, &[common::vim()]);

    let conn = fixture.conn();
    assert_eq!(paths(&conn), before);
    assert_eq!(read(&fixture, "/bin/vim"), "bin/vim");
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");

    let history = Changeset::list_all(&conn).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|c| c.status == ChangesetStatus::Applied));
}

#[test]
fn test_relink_resolves_from_durable_trace() {
    let fixture = Fixture::new();
    install(&fixture, &cache(&fixture), &[common::nano()]);

    // A later session has an empty in-memory cache and no trace either
    let later = cache(&fixture);
    fs::remove_file(later.trace_path("nano", &"1.3".parse().unwrap())).unwrap();
    install(&fixture, &later, &[common::vim()]);

    let conn = fixture.conn();
    assert_eq!(owners_of(&conn, "/bin/nano"), vec!["nano"]);
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
    assert!(later.trace_path("nano", &"1.3".parse().unwrap()).is_file());
}

#[test]
fn test_unresolvable_dependencies_leave_root_untouched() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    let vim = ArchiveSpec {
        depends: &[("vim-libs", Some("4.7"), None)],
        ..common::vim()
    };
    install(&fixture, &cache, &[vim]);

    let conn = fixture.conn();
    let before = Binding::list_all(&conn).unwrap();
    drop(conn);

    let legacy = ArchiveSpec {
        name: "legacy",
        version: "1.0",
        files: &["bin/legacy"],
        depends: &[("vim-libs", None, Some("4.0"))],
    };
    let packages = import(&fixture, &cache, &[legacy]);

    let mut conn = fixture.conn();
    let applier = RootfsApplier::new(&fixture.config.root);
    let result = TransactionGuard::new(&mut conn, &cache, &applier, &fixture.config.install_dir)
        .install(&packages);
    assert!(matches!(result, Err(Error::UnresolvableDependency { ref name }) if name == "vim-libs"));

    assert_eq!(Binding::list_all(&conn).unwrap(), before);
    assert!(InstalledPackage::find_by_name(&conn, "legacy").unwrap().is_none());
    assert_eq!(Changeset::list_all(&conn).unwrap().len(), 1);
    assert!(!fixture.rooted("/bin/legacy").exists());
}

/// Fails the first time a given path is created
struct FailingApplier {
    inner: RootfsApplier,
    fail_on: &'static str,
}

impl FilesystemApplier for FailingApplier {
    fn remove(&self, binding: &Binding) -> bindery::Result<()> {
        self.inner.remove(binding)
    }

    fn create(&self, binding: &Binding) -> bindery::Result<()> {
        if binding.rootfs_path == self.fail_on {
            return Err(Error::Filesystem(format!("simulated failure at {}", self.fail_on)));
        }
        self.inner.create(binding)
    }
}

/// Stage an install and fail while committing it at `fail_on`
fn interrupted_install(fixture: &Fixture, cache: &PackageCache, spec: ArchiveSpec, fail_on: &'static str) {
    let packages = import(fixture, cache, &[spec]);

    let mut conn = fixture.conn();
    let applier = FailingApplier {
        inner: RootfsApplier::new(&fixture.config.root),
        fail_on,
    };
    let result = TransactionGuard::new(&mut conn, cache, &applier, &fixture.config.install_dir)
        .install(&packages);
    assert!(matches!(result, Err(Error::Filesystem(_))));
}

/// Install nano, then fail halfway through committing vim
fn interrupted_vim_install(fixture: &Fixture, cache: &PackageCache) {
    install(fixture, cache, &[common::nano()]);
    interrupted_install(fixture, cache, common::vim(), "/bin/vim");
}

fn discard(fixture: &Fixture) {
    let mut conn = fixture.conn();
    let applier = RootfsApplier::new(&fixture.config.root);
    let mut manager = TransactionManager::new(&mut conn);
    manager.recover(RecoveryPolicy::Discard, &applier).unwrap();
    assert!(manager.check_consistency().unwrap().is_clean());
}

#[test]
fn test_interrupted_commit_blocks_until_rolled_forward() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);
    interrupted_vim_install(&fixture, &cache);

    let mut conn = fixture.conn();
    {
        let manager = TransactionManager::new(&mut conn);
        let report = manager.check_consistency().unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.open_changesets, 1);
        assert_eq!(
            manager.current_transaction().unwrap().unwrap().description,
            "Install vim-4.5"
        );
    }

    // No new transaction may start on top of the staged one
    let applier = RootfsApplier::new(&fixture.config.root);
    let result = TransactionGuard::new(&mut conn, &cache, &applier, &fixture.config.install_dir)
        .uninstall(&["nano".to_string()]);
    assert!(matches!(result, Err(Error::PendingTransaction(_))));

    let mut manager = TransactionManager::new(&mut conn);
    manager.recover(RecoveryPolicy::RollForward, &applier).unwrap();
    assert!(manager.check_consistency().unwrap().is_clean());
    drop(manager);

    assert!(is_real_dir(&fixture.config.root));
    assert_eq!(read(&fixture, "/bin/vim"), "bin/vim");
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
    assert_eq!(owners_of(&conn, "/bin/"), vec!["nano", "vim"]);
    assert_eq!(
        Changeset::list_all(&conn).unwrap()[0].status,
        ChangesetStatus::Applied
    );
}

#[test]
fn test_interrupted_commit_discarded() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);
    interrupted_vim_install(&fixture, &cache);

    discard(&fixture);

    let conn = fixture.conn();
    let active = Binding::list_all(&conn).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].rootfs_path, "/");
    assert_eq!(active[0].sole_owner(), Some("nano"));

    assert!(is_link(&fixture.config.root));
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
    assert!(!fixture.rooted("/bin/vim").exists());

    let statuses: Vec<ChangesetStatus> =
        Changeset::list_all(&conn).unwrap().into_iter().map(|c| c.status).collect();
    assert!(statuses.contains(&ChangesetStatus::RolledBack));
    assert!(statuses.contains(&ChangesetStatus::Applied));

    // vim was never installed as far as the database is concerned
    assert!(InstalledPackage::find_by_name(&conn, "vim").unwrap().is_none());
}

#[test]
fn test_interrupted_join_discarded() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    install(&fixture, &cache, &[common::nano(), common::vim()]);
    let conn = fixture.conn();
    let before = Binding::list_all(&conn).unwrap();
    drop(conn);

    interrupted_install(&fixture, &cache, common::emacs(), "/bin/emacs");
    discard(&fixture);

    let conn = fixture.conn();
    assert_eq!(Binding::list_all(&conn).unwrap(), before);
    assert_eq!(owners_of(&conn, "/"), vec!["nano", "vim"]);
    assert_eq!(owners_of(&conn, "/bin/"), vec!["nano", "vim"]);
    assert!(Binding::find_by_owner(&conn, "emacs").unwrap().is_empty());
    assert!(InstalledPackage::find_by_name(&conn, "emacs").unwrap().is_none());
    drop(conn);

    assert!(!fixture.rooted("/bin/emacs").exists());
    assert!(!fixture.rooted("/usr/docs/emacs").exists());
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");

    // Removing vim now collapses the root back onto nano
    remove(&fixture, &cache, &["vim"]);
    assert!(is_link(&fixture.config.root));
    assert_eq!(read(&fixture, "/bin/nano"), "bin/nano");
}

#[test]
fn test_interrupted_upgrade_discarded() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    install(&fixture, &cache, &[common::nano(), common::vim()]);
    let vim46 = ArchiveSpec { version: "4.6", ..common::vim() };
    interrupted_install(&fixture, &cache, vim46, "/bin/vim");
    discard(&fixture);

    let conn = fixture.conn();
    let vim = InstalledPackage::find_by_name(&conn, "vim").unwrap().unwrap();
    assert_eq!(vim.current_version, Some("4.5".parse().unwrap()));
    assert_eq!(vim.available_versions.len(), 1);

    let vim_bin = Binding::find_active_by_path(&conn, "/bin/vim").unwrap();
    let expected = fixture.stored("vim", "4.5", "/bin/vim");
    assert_eq!(vim_bin[0].physical_path.as_deref(), expected.to_str());
    assert_eq!(read(&fixture, "/bin/vim"), "bin/vim");
    assert_eq!(owners_of(&conn, "/"), vec!["nano", "vim"]);
}

#[test]
fn test_import_rejects_misnamed_archive() {
    let fixture = Fixture::new();
    let cache = cache(&fixture);

    let archive = write_archive(&fixture.archives(), &common::nano());
    let renamed = archive.with_file_name("nano-9.9.tgz");
    fs::rename(&archive, &renamed).unwrap();

    let result = bindery::packages::import_archive(
        &renamed,
        &fixture.config.work_dir,
        &fixture.config.install_dir,
        &cache,
    );
    assert!(result.is_err());
    assert!(!fixture.config.install_dir.join("nano").exists());
}
