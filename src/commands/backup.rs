// BookVault - Backup Commands
// File selection happens here, outside the transactional core; a cancelled
// dialog is a successful `None`, never an error.

use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;

use crate::backup;
use crate::commands::DbState;
use crate::constants::{BACKUP_FILENAME_PREFIX, BACKUP_FILE_EXTENSION};

/// Export the whole library to a JSON backup at a user-chosen destination.
#[tauri::command]
pub fn export_library(app: AppHandle, state: State<DbState>) -> Result<Option<String>, String> {
    let suggested = format!(
        "{}-{}.{}",
        BACKUP_FILENAME_PREFIX,
        chrono::Utc::now().format("%Y-%m-%d"),
        BACKUP_FILE_EXTENSION
    );

    let picked = app
        .dialog()
        .file()
        .add_filter("BookVault backup", &[BACKUP_FILE_EXTENSION])
        .set_file_name(suggested)
        .blocking_save_file();

    let Some(file_path) = picked else {
        return Ok(None);
    };
    let dest = file_path.into_path().map_err(|e| e.to_string())?;

    let written = backup::export_backup(&state.0, &dest).map_err(|e| e.to_string())?;
    Ok(Some(written.to_string_lossy().to_string()))
}

/// Replace the whole library from a user-chosen backup file.
#[tauri::command]
pub fn import_library(app: AppHandle, state: State<DbState>) -> Result<Option<String>, String> {
    let picked = app
        .dialog()
        .file()
        .add_filter("BookVault backup", &[BACKUP_FILE_EXTENSION])
        .blocking_pick_file();

    let Some(file_path) = picked else {
        return Ok(None);
    };
    let source = file_path.into_path().map_err(|e| e.to_string())?;

    let restored = backup::restore_backup(&state.0, &source).map_err(|e| e.to_string())?;
    Ok(Some(restored.to_string_lossy().to_string()))
}

/// Show an exported backup in the system file manager.
#[tauri::command]
pub fn reveal_backup_file(path: String) -> Result<(), String> {
    tauri_plugin_opener::reveal_item_in_dir(&path).map_err(|e| e.to_string())
}
