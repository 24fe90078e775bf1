// BookVault - Commands Module
// Tauri commands organized by domain

pub mod backup;
pub mod vault;

// Re-export all commands for easy registration
pub use backup::*;
pub use vault::*;

use crate::db::Database;

/// Database handle managed by Tauri. The connection inside is opened lazily
/// on first use and shared by every command for the process lifetime.
pub struct DbState(pub Database);
