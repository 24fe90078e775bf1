// BookVault - Tauri Library Entry Point

pub mod constants;
pub mod error;
pub mod clock;
pub mod db;
pub mod vault;
pub mod backup;
pub mod commands;

use db::{default_db_path, Database};

// Re-export DbState from commands module for state management
pub use commands::DbState;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let db_path = default_db_path().expect("could not resolve database location");

    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().build())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .manage(DbState(Database::new(db_path)))
        .invoke_handler(tauri::generate_handler![
            // Vault commands
            commands::add_to_vault,
            commands::get_vault_books,
            commands::get_vault_book,
            commands::update_vault_entry,
            commands::remove_from_vault,
            commands::close_database,
            // Backup commands
            commands::export_library,
            commands::import_library,
            commands::reveal_backup_file,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
