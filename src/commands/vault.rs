// BookVault - Vault Commands

use tauri::State;

use crate::commands::DbState;
use crate::db::schema::{BookDraft, ReadingStatus, VaultBook};
use crate::vault::{self, VaultEntryPatch};

/// Add a book to the vault. Idempotent per book: adding a book that is
/// already tracked returns the existing entry unchanged.
#[tauri::command]
pub fn add_to_vault(
    state: State<DbState>,
    draft: BookDraft,
    initial_status: Option<ReadingStatus>,
) -> Result<VaultBook, String> {
    vault::add_to_vault(
        &state.0,
        &draft,
        initial_status.unwrap_or(ReadingStatus::Want),
    )
    .map_err(|e| e.to_string())
}

/// Filtered vault listing, most recently touched first.
#[tauri::command]
pub fn get_vault_books(
    state: State<DbState>,
    status: Option<ReadingStatus>,
    query: Option<String>,
    genre_contains: Option<String>,
) -> Result<Vec<VaultBook>, String> {
    vault::get_vault_books(
        &state.0,
        status,
        query.as_deref(),
        genre_contains.as_deref(),
    )
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_vault_book(
    state: State<DbState>,
    user_book_id: i64,
) -> Result<Option<VaultBook>, String> {
    vault::get_vault_book_by_user_book_id(&state.0, user_book_id).map_err(|e| e.to_string())
}

/// Partial update; omitted fields are left untouched.
#[tauri::command]
pub fn update_vault_entry(
    state: State<DbState>,
    user_book_id: i64,
    patch: VaultEntryPatch,
) -> Result<VaultBook, String> {
    vault::update_vault_entry(&state.0, user_book_id, &patch).map_err(|e| e.to_string())
}

/// Remove an entry from the vault; the book metadata row is retained.
#[tauri::command]
pub fn remove_from_vault(state: State<DbState>, user_book_id: i64) -> Result<(), String> {
    vault::remove_from_vault(&state.0, user_book_id).map_err(|e| e.to_string())
}

/// Release the cached database connection. The next command reopens lazily.
#[tauri::command]
pub fn close_database(state: State<DbState>) -> Result<(), String> {
    state.0.close().map_err(|e| e.to_string())
}
