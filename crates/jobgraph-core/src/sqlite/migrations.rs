#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "initial_model_tables",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    config_id TEXT,
    owner_id TEXT,
    document TEXT NOT NULL,
    updated_at_unix INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    task_id TEXT,
    status TEXT,
    submit_id TEXT,
    document TEXT NOT NULL,
    updated_at_unix INTEGER NOT NULL
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS jobs;
DROP TABLE IF EXISTS tasks;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "add_filter_indexes",
    up_sql: r#"
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs (status);
CREATE INDEX IF NOT EXISTS idx_jobs_submit_id ON jobs (submit_id);
CREATE INDEX IF NOT EXISTS idx_jobs_task_id ON jobs (task_id);
CREATE INDEX IF NOT EXISTS idx_tasks_owner_id ON tasks (owner_id);
CREATE INDEX IF NOT EXISTS idx_tasks_config_id ON tasks (config_id);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_tasks_config_id;
DROP INDEX IF EXISTS idx_tasks_owner_id;
DROP INDEX IF EXISTS idx_jobs_task_id;
DROP INDEX IF EXISTS idx_jobs_submit_id;
DROP INDEX IF EXISTS idx_jobs_status;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
