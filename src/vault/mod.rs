// Vault repository
// Domain layer over the books/user_books tables. Every multi-step write runs
// inside one transaction; invariants on status, progress and the set-once
// timestamps live here, not in callers.

use serde::Deserialize;

use crate::clock;
use crate::constants::{PROGRESS_MAX, PROGRESS_MIN};
use crate::db::schema::{self, BookDraft, ReadingStatus, VaultBook};
use crate::db::Database;
use crate::error::{Result, VaultError};

/// Partial update for a vault entry. `None` means "leave unchanged",
/// never a field's zero value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntryPatch {
    #[serde(default)]
    pub status: Option<ReadingStatus>,
    #[serde(default)]
    pub progress_percent: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Normalize a genre list to the stored form: trimmed, empty entries dropped,
/// sorted, de-duplicated case-insensitively, comma-joined.
/// Returns `None` when nothing survives.
pub fn normalize_genres(genres: &[String]) -> Option<String> {
    let mut cleaned: Vec<&str> = genres
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect();
    cleaned.sort_by_key(|g| g.to_lowercase());
    cleaned.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join(", "))
    }
}

/// Add a book to the vault.
///
/// Upserts the book metadata (deduplicated by external pair when present),
/// then creates the tracking entry unless one already exists for that book,
/// in which case the existing entry is returned unchanged and
/// `initial_status` is ignored.
pub fn add_to_vault(
    db: &Database,
    draft: &BookDraft,
    initial_status: ReadingStatus,
) -> Result<VaultBook> {
    if draft.title.trim().is_empty() {
        return Err(VaultError::InvalidInput("title must not be empty".to_string()));
    }

    let genres = normalize_genres(&draft.genres);
    let now = clock::now_ms();

    db.with_tx(|tx| {
        let book_id = match draft.external_pair() {
            Some((source, external_id)) => {
                match schema::find_book_id_by_external(tx, source, external_id)? {
                    Some(existing_id) => {
                        schema::update_book(tx, existing_id, draft, genres.as_deref(), now)?;
                        existing_id
                    }
                    None => schema::insert_book(tx, draft, genres.as_deref(), now)?,
                }
            }
            // Manual entries are never deduplicated: each add is a new row.
            None => schema::insert_book(tx, draft, genres.as_deref(), now)?,
        };

        // Idempotent per book: an existing entry is returned as-is.
        let entry_id = match schema::find_user_book_by_book(tx, book_id)? {
            Some(existing) => existing.id,
            None => schema::insert_user_book(tx, book_id, initial_status, now)?,
        };

        schema::get_vault_book(tx, entry_id)?.ok_or_else(|| {
            VaultError::StorageConflict(format!(
                "vault entry {} missing immediately after write",
                entry_id
            ))
        })
    })
}

/// Filtered, sorted view of the vault. All filters are optional and combine
/// with AND; see `schema::list_vault_books` for the match semantics.
pub fn get_vault_books(
    db: &Database,
    status: Option<ReadingStatus>,
    query: Option<&str>,
    genre_contains: Option<&str>,
) -> Result<Vec<VaultBook>> {
    db.with_conn(|conn| schema::list_vault_books(conn, status, query, genre_contains))
}

pub fn get_vault_book_by_user_book_id(db: &Database, user_book_id: i64) -> Result<Option<VaultBook>> {
    db.with_conn(|conn| schema::get_vault_book(conn, user_book_id))
}

/// Apply a partial update to a vault entry.
///
/// Status transitions stamp `started_at`/`finished_at` on first entry into
/// Reading/Finished and never clear them afterward. Setting Finished without
/// an explicit progress forces progress to 100. Progress is clamped to
/// [0,100] and never changes status in either direction.
pub fn update_vault_entry(
    db: &Database,
    user_book_id: i64,
    patch: &VaultEntryPatch,
) -> Result<VaultBook> {
    let now = clock::now_ms();

    db.with_tx(|tx| {
        let mut entry = schema::get_user_book(tx, user_book_id)?.ok_or_else(|| {
            VaultError::NotFound(format!("vault entry {}", user_book_id))
        })?;

        if let Some(status) = patch.status {
            if status == ReadingStatus::Reading && entry.started_at.is_none() {
                entry.started_at = Some(now);
            }
            if status == ReadingStatus::Finished {
                if entry.finished_at.is_none() {
                    entry.finished_at = Some(now);
                }
                if patch.progress_percent.is_none() {
                    entry.progress_percent = PROGRESS_MAX;
                }
            }
            entry.status = status;
        }

        if let Some(progress) = patch.progress_percent {
            entry.progress_percent = progress.clamp(PROGRESS_MIN, PROGRESS_MAX);
        }

        if let Some(notes) = &patch.notes {
            entry.notes = Some(notes.clone());
        }

        entry.updated_at = now;
        schema::update_user_book(tx, &entry)?;

        schema::get_vault_book(tx, user_book_id)?.ok_or_else(|| {
            VaultError::StorageConflict(format!(
                "vault entry {} missing immediately after write",
                user_book_id
            ))
        })
    })
}

/// Remove an entry from the vault. The book row survives as cached metadata.
/// Removing an id that does not exist is not an error.
pub fn remove_from_vault(db: &Database, user_book_id: i64) -> Result<()> {
    db.with_tx(|tx| {
        let affected = schema::delete_user_book(tx, user_book_id)?;
        if affected == 0 {
            log::debug!("remove_from_vault: entry {} already gone", user_book_id);
        }
        Ok(())
    })
}
