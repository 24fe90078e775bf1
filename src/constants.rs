// BookVault Constants
// The backup constants are part of the on-disk interchange format.
// Do not change without bumping the format version.

// Paths
pub const BOOKVAULT_FOLDER: &str = ".bookvault";
pub const DB_FILENAME: &str = "bookvault.db";

// Backup document identity
pub const BACKUP_APP_ID: &str = "bookvault";
pub const BACKUP_FORMAT_VERSION: i64 = 1;
pub const BACKUP_FILE_EXTENSION: &str = "json";
pub const BACKUP_FILENAME_PREFIX: &str = "bookvault-backup";

// Reading progress bounds
pub const PROGRESS_MIN: i64 = 0;
pub const PROGRESS_MAX: i64 = 100;
