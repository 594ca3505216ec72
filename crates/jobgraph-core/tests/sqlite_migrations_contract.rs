use jobgraph_core::persistence::MigrationStore;
use jobgraph_core::sqlite::{SqliteStore, current_schema_version, migration, migrations};
use tempfile::TempDir;

fn store(dir: &TempDir) -> SqliteStore {
    SqliteStore::new(dir.path().join("state").join("jobgraph.sqlite3"))
}

#[test]
fn migration_versions_are_strictly_increasing() {
    let entries = migrations();
    assert!(!entries.is_empty());

    let mut previous = 0;
    for entry in entries {
        assert!(entry.version > previous);
        previous = entry.version;
    }
}

#[test]
fn migration_lookup_and_schema_version_are_consistent() {
    let latest = current_schema_version();
    let latest_entry = migration(latest).expect("latest migration must exist");
    assert_eq!(latest_entry.version, latest);
}

#[test]
fn migration_sql_is_defined_for_up_and_down_paths() {
    for entry in migrations() {
        assert!(!entry.up_sql.trim().is_empty(), "up sql must not be empty");
        assert!(
            !entry.down_sql.trim().is_empty(),
            "down sql must not be empty"
        );
    }
}

#[test]
fn fresh_database_migrates_to_latest_and_back() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert_eq!(store.current_version().unwrap(), 0);
    assert_eq!(store.planned_migrations(0).len(), migrations().len());

    store.migrate_to_latest().unwrap();
    assert_eq!(store.current_version().unwrap(), current_schema_version());
    assert!(store.planned_migrations(current_schema_version()).is_empty());

    store.apply_migration(1).unwrap();
    assert_eq!(store.current_version().unwrap(), 1);

    store.apply_migration(0).unwrap();
    assert_eq!(store.current_version().unwrap(), 0);
}

#[test]
fn migrating_twice_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    store.migrate_to_latest().unwrap();
    store.migrate_to_latest().unwrap();
    assert_eq!(store.current_version().unwrap(), current_schema_version());
}

#[test]
fn undefined_targets_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert!(store.apply_migration(-1).is_err());
    assert!(store.apply_migration(current_schema_version() + 1).is_err());
}
