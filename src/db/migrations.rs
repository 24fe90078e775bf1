// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use anyhow::Result;
use rusqlite::Connection;

/// All migrations in order. Each migration is a SQL string.
/// Parent tables are created before children so foreign keys resolve.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Book metadata, independent of any tracking state.
    -- Timestamps are epoch milliseconds throughout.
    CREATE TABLE books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author TEXT,
        year INTEGER CHECK (year IS NULL OR year >= 0),
        description TEXT,
        genres TEXT,
        cover_url TEXT,
        isbn_10 TEXT,
        isbn_13 TEXT,
        external_source TEXT,
        external_id TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    -- At most one book per external catalog record, when both halves are set.
    CREATE UNIQUE INDEX idx_books_external
        ON books(external_source, external_id)
        WHERE external_source IS NOT NULL AND external_source <> ''
          AND external_id IS NOT NULL AND external_id <> '';

    -- One tracking entry per book (the vault).
    CREATE TABLE user_books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id INTEGER NOT NULL UNIQUE REFERENCES books(id) ON DELETE CASCADE,
        status INTEGER NOT NULL DEFAULT 0 CHECK (status IN (0, 1, 2)),
        progress_percent INTEGER NOT NULL DEFAULT 0
            CHECK (progress_percent BETWEEN 0 AND 100),
        notes TEXT,
        added_at INTEGER NOT NULL,
        started_at INTEGER,
        finished_at INTEGER,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX idx_user_books_status ON user_books(status);
    CREATE INDEX idx_user_books_updated ON user_books(updated_at);

    -- Reflection prompts (schema only in this version; no read/write logic yet).
    CREATE TABLE prompts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        category TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE user_book_prompts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_book_id INTEGER NOT NULL REFERENCES user_books(id) ON DELETE CASCADE,
        prompt_id INTEGER NOT NULL REFERENCES prompts(id) ON DELETE CASCADE,
        assigned_at INTEGER NOT NULL,
        UNIQUE (user_book_id, prompt_id)
    );
    CREATE INDEX idx_user_book_prompts_entry ON user_book_prompts(user_book_id);

    CREATE TABLE prompt_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_book_prompt_id INTEGER NOT NULL
            REFERENCES user_book_prompts(id) ON DELETE CASCADE,
        response TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX idx_prompt_responses_assignment
        ON prompt_responses(user_book_prompt_id);
    "#,
];

/// Get current schema version from the database.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Run all pending migrations (crash-safe: each migration batch is applied
/// and stamped before the next one starts).
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = schema_version(conn)?;
    let target_version = MIGRATIONS.len() as u32;

    // Refuse to open a database created by a newer BookVault build
    if current_version > target_version {
        anyhow::bail!(
            "Database schema version {} is newer than this build supports (max {}). Please upgrade BookVault.",
            current_version,
            target_version
        );
    }

    if current_version == target_version {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        conn.execute_batch(migration)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", migration_version))?;

        log::info!("Applied migration {}", migration_version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn(dir: &tempfile::TempDir) -> Connection {
        let conn = Connection::open(dir.path().join("bookvault.db")).unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        conn
    }

    #[test]
    fn test_fresh_init_creates_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_test_conn(&dir);

        run_migrations(&conn).unwrap();

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('books','user_books','prompts','user_book_prompts','prompt_responses')",
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(count, 5, "All 5 tables should exist");

        let version = schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrations_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_test_conn(&dir);

        // Run twice — should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_refuses_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_test_conn(&dir);

        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than this build"));
    }

    #[test]
    fn test_user_books_unique_per_book() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_test_conn(&dir);
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO books (title, created_at, updated_at) VALUES ('Dune', 0, 0)",
            [],
        ).unwrap();
        conn.execute(
            "INSERT INTO user_books (book_id, added_at, updated_at) VALUES (1, 0, 0)",
            [],
        ).unwrap();

        let dup = conn.execute(
            "INSERT INTO user_books (book_id, added_at, updated_at) VALUES (1, 0, 0)",
            [],
        );
        assert!(dup.is_err(), "second entry for the same book must violate UNIQUE");
    }

    #[test]
    fn test_deleting_book_cascades_to_entry() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_test_conn(&dir);
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO books (title, created_at, updated_at) VALUES ('Dune', 0, 0)",
            [],
        ).unwrap();
        conn.execute(
            "INSERT INTO user_books (book_id, added_at, updated_at) VALUES (1, 0, 0)",
            [],
        ).unwrap();

        conn.execute("DELETE FROM books WHERE id = 1", []).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_books", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
