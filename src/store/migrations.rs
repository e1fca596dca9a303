//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                platform_comment_id TEXT NOT NULL UNIQUE,
                channel_id TEXT NOT NULL,
                video_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_handle TEXT,
                text TEXT NOT NULL,
                classification TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                priority INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL,
                processed_at TEXT,
                last_batch_processed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_comments_status_priority
                ON comments(status, priority);
            CREATE INDEX IF NOT EXISTS idx_comments_status_created
                ON comments(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_comments_pending
                ON comments(created_at) WHERE status = 'pending';
            CREATE INDEX IF NOT EXISTS idx_comments_channel ON comments(channel_id);

            CREATE TABLE IF NOT EXISTS automation_rules (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                conditions TEXT NOT NULL,
                action TEXT NOT NULL,
                response_limit_per_run INTEGER NOT NULL DEFAULT 50,
                require_approval INTEGER NOT NULL DEFAULT 0,
                variant TEXT,
                intelligence TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rules_channel ON automation_rules(channel_id);
            CREATE INDEX IF NOT EXISTS idx_rules_channel_priority
                ON automation_rules(channel_id, priority);

            CREATE TABLE IF NOT EXISTS rule_executions (
                id TEXT PRIMARY KEY,
                rule_id TEXT REFERENCES automation_rules(id) ON DELETE SET NULL,
                comment_id TEXT NOT NULL,
                video_id TEXT NOT NULL,
                matched_conditions TEXT NOT NULL,
                action TEXT NOT NULL,
                variant TEXT,
                user_context TEXT,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rule_executions_rule ON rule_executions(rule_id);
            CREATE INDEX IF NOT EXISTS idx_rule_executions_comment
                ON rule_executions(comment_id);

            CREATE TABLE IF NOT EXISTS response_cache (
                id TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL UNIQUE,
                response_template TEXT NOT NULL,
                classification TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                last_used_at TEXT NOT NULL,
                expires_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_response_cache_fingerprint
                ON response_cache(fingerprint);
        "#,
    },
    Migration {
        version: 2,
        name: "response_log",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ai_responses (
                id TEXT PRIMARY KEY,
                comment_id TEXT NOT NULL REFERENCES comments(id),
                response_text TEXT NOT NULL,
                passed_safety INTEGER,
                safety_checked_at TEXT,
                safety_notes TEXT,
                approved_at TEXT,
                posted_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ai_responses_comment ON ai_responses(comment_id);

            CREATE TABLE IF NOT EXISTS sent_responses (
                id TEXT PRIMARY KEY,
                comment_id TEXT NOT NULL,
                platform_comment_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                response_text TEXT NOT NULL,
                response_type TEXT NOT NULL,
                sent_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sent_responses_comment
                ON sent_responses(comment_id);
            CREATE INDEX IF NOT EXISTS idx_sent_responses_channel
                ON sent_responses(channel_id);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
