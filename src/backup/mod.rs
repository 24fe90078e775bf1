// Backup/restore engine
// Generic table dump and replay: operates on whatever user tables exist,
// not on vault semantics. Restore is replace-only: every current row is
// deleted before any backup row is inserted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use crate::clock;
use crate::constants::{BACKUP_APP_ID, BACKUP_FORMAT_VERSION};
use crate::db::{migrations, Database};
use crate::error::{Result, VaultError};

/// User tables in creation order (parents before children).
fn list_user_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let rows = stmt.query_map([], |row| row.get(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

fn column_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Normalize a backup value for storage: booleans become 0/1 integers
/// (SQLite has no boolean type), numbers and text pass through, null stays
/// null, anything else is stored as its JSON text.
fn normalize_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Sql::Real(f)
            } else {
                Sql::Text(n.to_string())
            }
        }
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

/// Export the entire store to a JSON document at `dest`.
///
/// Table discovery and all row reads happen inside one transaction, so the
/// snapshot is consistent even if another operation commits concurrently.
pub fn export_backup(db: &Database, dest: &Path) -> Result<PathBuf> {
    let (tables, schema_version, data) = db.with_tx(|tx| {
        let tables = list_user_tables(tx)?;
        let schema_version = migrations::schema_version(tx)?;

        let mut data = serde_json::Map::new();
        for table in &tables {
            let mut stmt = tx.prepare(&format!("SELECT * FROM \"{}\"", table))?;
            let column_names: Vec<String> =
                stmt.column_names().iter().map(|s| s.to_string()).collect();

            let mut rows_json = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut obj = serde_json::Map::new();
                for (i, name) in column_names.iter().enumerate() {
                    obj.insert(name.clone(), column_to_json(row.get_ref(i)?));
                }
                rows_json.push(Value::Object(obj));
            }
            data.insert(table.clone(), Value::Array(rows_json));
        }

        Ok((tables, schema_version, data))
    })?;

    let doc = serde_json::json!({
        "app": BACKUP_APP_ID,
        "backupVersion": BACKUP_FORMAT_VERSION,
        "schemaVersion": schema_version,
        "exportedAt": clock::now_utc_rfc3339(),
        "tables": tables,
        "data": data,
    });

    std::fs::write(dest, serde_json::to_string_pretty(&doc)?)?;
    log::info!("exported backup to {}", dest.display());

    Ok(dest.to_path_buf())
}

/// Validate and replay a backup document into the store, replacing all
/// current data. Any failure rolls back the whole restore.
pub fn restore_backup(db: &Database, source: &Path) -> Result<PathBuf> {
    let text = std::fs::read_to_string(source)?;

    let doc: Value = serde_json::from_str(&text)
        .map_err(|_| VaultError::InvalidFormat("backup file is not valid JSON".to_string()))?;
    let root = doc
        .as_object()
        .ok_or_else(|| VaultError::InvalidFormat("backup root must be an object".to_string()))?;

    let app = root.get("app").and_then(|v| v.as_str()).unwrap_or("");
    if app != BACKUP_APP_ID {
        return Err(VaultError::IncompatibleBackup(format!(
            "unrecognized app identifier '{}'",
            app
        )));
    }

    let version = root.get("backupVersion").and_then(|v| v.as_i64());
    if version != Some(BACKUP_FORMAT_VERSION) {
        return Err(VaultError::IncompatibleBackup(match version {
            Some(v) => format!("unsupported backup version {}", v),
            None => "missing backup version".to_string(),
        }));
    }

    let data = root
        .get("data")
        .and_then(|v| v.as_object())
        .ok_or_else(|| {
            VaultError::InvalidFormat("missing or invalid data section".to_string())
        })?;

    db.with_conn_mut(|conn| {
        // PRAGMA foreign_keys is a no-op inside a transaction, so enforcement
        // is toggled outside it and re-enabled on every exit path.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let result = replay_tables(conn, data);
        let reenable = conn.execute_batch("PRAGMA foreign_keys = ON;");
        result?;
        reenable?;
        Ok(())
    })?;

    log::info!("restored backup from {}", source.display());
    Ok(source.to_path_buf())
}

fn replay_tables(conn: &mut Connection, data: &serde_json::Map<String, Value>) -> Result<()> {
    let tx = conn.transaction()?;

    let tables = list_user_tables(&tx)?;

    // Children before parents; the whole store is emptied, including tables
    // the backup does not mention.
    for table in tables.iter().rev() {
        tx.execute(&format!("DELETE FROM \"{}\"", table), [])?;
    }

    let mut replay_order: Vec<&String> = tables.iter().collect();
    replay_order.sort();

    for table in replay_order {
        // Tables unknown to the current schema are ignored by construction;
        // tables missing from the backup simply stay empty.
        let Some(rows) = data.get(table.as_str()) else {
            continue;
        };
        let Some(rows) = rows.as_array() else {
            continue;
        };

        let columns: HashSet<String> = table_columns(&tx, table)?.into_iter().collect();
        let mut inserted = 0usize;

        for row in rows {
            let Some(obj) = row.as_object() else {
                continue;
            };

            let mut names: Vec<&String> = Vec::new();
            let mut values: Vec<rusqlite::types::Value> = Vec::new();
            for (key, value) in obj {
                if !columns.contains(key) {
                    continue;
                }
                names.push(key);
                values.push(normalize_value(value));
            }
            if names.is_empty() {
                continue;
            }

            let quoted = names
                .iter()
                .map(|n| format!("\"{}\"", n))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=names.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT OR REPLACE INTO \"{}\" ({}) VALUES ({})",
                table, quoted, placeholders
            );

            tx.prepare_cached(&sql)?
                .execute(rusqlite::params_from_iter(values))?;
            inserted += 1;
        }

        log::info!("restore: {} rows into {}", inserted, table);
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{BookDraft, ReadingStatus};
    use crate::vault::{self, VaultEntryPatch};

    fn test_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("bookvault.db"))
    }

    fn seed(db: &Database) {
        let mut hobbit = BookDraft {
            title: "The Hobbit".to_string(),
            author: Some("J.R.R. Tolkien".to_string()),
            genres: vec!["Fantasy".to_string()],
            ..Default::default()
        };
        hobbit.year = Some(1937);
        let added = vault::add_to_vault(db, &hobbit, ReadingStatus::Reading).unwrap();
        vault::update_vault_entry(
            db,
            added.entry.id,
            &VaultEntryPatch {
                progress_percent: Some(40),
                notes: Some("re-reading".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let dune = BookDraft {
            title: "Dune".to_string(),
            author: Some("Frank Herbert".to_string()),
            ..Default::default()
        };
        vault::add_to_vault(db, &dune, ReadingStatus::Want).unwrap();
    }

    fn data_section(path: &Path) -> Value {
        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        doc.get("data").unwrap().clone()
    }

    fn book_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?)
        })
        .unwrap()
    }

    fn foreign_keys_enabled(db: &Database) -> bool {
        db.with_conn(|conn| {
            let on: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
            Ok(on == 1)
        })
        .unwrap()
    }

    #[test]
    fn test_export_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        let path = export_backup(&db, &dir.path().join("backup.json")).unwrap();
        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(doc["app"], "bookvault");
        assert_eq!(doc["backupVersion"], 1);
        assert_eq!(doc["schemaVersion"], 1);
        assert!(doc["exportedAt"].as_str().unwrap().ends_with('Z'));

        let tables: Vec<&str> = doc["tables"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t.as_str().unwrap())
            .collect();
        assert_eq!(
            tables,
            vec!["books", "user_books", "prompts", "user_book_prompts", "prompt_responses"]
        );

        assert_eq!(doc["data"]["books"].as_array().unwrap().len(), 2);
        assert_eq!(doc["data"]["user_books"].as_array().unwrap().len(), 2);
        assert_eq!(doc["data"]["prompts"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_round_trip_restores_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        let backup = export_backup(&db, &dir.path().join("backup.json")).unwrap();
        let before = data_section(&backup);

        // Mutate after the export so the restore has something to undo
        vault::add_to_vault(
            &db,
            &BookDraft {
                title: "Interloper".to_string(),
                ..Default::default()
            },
            ReadingStatus::Want,
        )
        .unwrap();

        restore_backup(&db, &backup).unwrap();

        let after_export = export_backup(&db, &dir.path().join("after.json")).unwrap();
        let after = data_section(&after_export);
        assert_eq!(before, after, "every table's rows must round-trip exactly");
    }

    #[test]
    fn test_restore_rejects_wrong_app_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        let path = dir.path().join("foreign.json");
        std::fs::write(
            &path,
            r#"{"app": "someothertracker", "backupVersion": 1, "data": {}}"#,
        )
        .unwrap();

        let err = restore_backup(&db, &path).unwrap_err();
        match err {
            VaultError::IncompatibleBackup(msg) => assert!(msg.contains("someothertracker")),
            other => panic!("expected IncompatibleBackup, got {:?}", other),
        }
        assert_eq!(book_count(&db), 2, "store must be untouched");
    }

    #[test]
    fn test_restore_rejects_wrong_version_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        let path = dir.path().join("future.json");
        std::fs::write(
            &path,
            r#"{"app": "bookvault", "backupVersion": 2, "data": {}}"#,
        )
        .unwrap();

        let err = restore_backup(&db, &path).unwrap_err();
        match err {
            VaultError::IncompatibleBackup(msg) => assert!(msg.contains('2')),
            other => panic!("expected IncompatibleBackup, got {:?}", other),
        }
        assert_eq!(book_count(&db), 2);
    }

    #[test]
    fn test_restore_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        let path = dir.path().join("garbage.json");
        std::fs::write(&path, "definitely { not json").unwrap();

        let err = restore_backup(&db, &path).unwrap_err();
        match err {
            VaultError::InvalidFormat(msg) => assert!(msg.contains("not valid JSON")),
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_restore_rejects_non_object_root() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        let path = dir.path().join("list.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = restore_backup(&db, &path).unwrap_err();
        match err {
            VaultError::InvalidFormat(msg) => assert!(msg.contains("root must be an object")),
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_restore_rejects_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        let path = dir.path().join("nodata.json");
        std::fs::write(&path, r#"{"app": "bookvault", "backupVersion": 1}"#).unwrap();

        let err = restore_backup(&db, &path).unwrap_err();
        assert!(matches!(err, VaultError::InvalidFormat(_)));
    }

    #[test]
    fn test_restore_is_destructive_and_total() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        // Valid but empty backup: every table ends up empty
        let path = dir.path().join("empty.json");
        std::fs::write(
            &path,
            r#"{"app": "bookvault", "backupVersion": 1, "data": {}}"#,
        )
        .unwrap();

        restore_backup(&db, &path).unwrap();
        assert_eq!(book_count(&db), 0);
        let entries: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM user_books", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(entries, 0);
    }

    #[test]
    fn test_restore_tolerates_unknown_tables_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        let path = dir.path().join("forward.json");
        std::fs::write(
            &path,
            r#"{
                "app": "bookvault",
                "backupVersion": 1,
                "data": {
                    "legacy_notes": [{"id": 1, "body": "old"}],
                    "books": [
                        {"id": 1, "title": "Dune", "mystery_column": "dropped",
                         "created_at": 0, "updated_at": 0},
                        "not a row object",
                        {"mystery_column": "only unknown keys, skipped"}
                    ],
                    "user_books": "not a list"
                }
            }"#,
        )
        .unwrap();

        restore_backup(&db, &path).unwrap();

        let title: String = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT title FROM books WHERE id = 1", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(title, "Dune");
        assert_eq!(book_count(&db), 1, "non-object and unknown-only rows skipped");
    }

    #[test]
    fn test_restore_normalizes_booleans() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);

        let path = dir.path().join("bools.json");
        std::fs::write(
            &path,
            r#"{
                "app": "bookvault",
                "backupVersion": 1,
                "data": {
                    "books": [{"id": 1, "title": "Dune", "year": true,
                               "created_at": 0, "updated_at": 0}]
                }
            }"#,
        )
        .unwrap();

        restore_backup(&db, &path).unwrap();

        let year: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT year FROM books WHERE id = 1", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(year, 1);
    }

    #[test]
    fn test_failed_restore_rolls_back_and_reenables_fk() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        // Passes validation, fails mid-transaction on the NOT NULL title
        let path = dir.path().join("broken.json");
        std::fs::write(
            &path,
            r#"{
                "app": "bookvault",
                "backupVersion": 1,
                "data": {
                    "books": [{"id": 1, "title": null, "created_at": 0, "updated_at": 0}]
                }
            }"#,
        )
        .unwrap();

        let err = restore_backup(&db, &path).unwrap_err();
        assert!(matches!(err, VaultError::StorageConflict(_)));

        assert_eq!(book_count(&db), 2, "failed restore must leave the store as it was");
        assert!(foreign_keys_enabled(&db), "enforcement re-enabled after failure");
    }

    #[test]
    fn test_fk_enforcement_survives_successful_restore() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir);
        seed(&db);

        let backup = export_backup(&db, &dir.path().join("backup.json")).unwrap();
        restore_backup(&db, &backup).unwrap();

        assert!(foreign_keys_enabled(&db));

        // And it actually enforces: an orphan entry is rejected
        let orphan = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_books (book_id, added_at, updated_at) VALUES (999, 0, 0)",
                [],
            )?;
            Ok(())
        });
        assert!(orphan.is_err());
    }
}
