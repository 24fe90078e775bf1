// BookVault CLI binary

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod backup;
mod clock;
mod constants;
mod db;
mod error;
mod vault;

use db::schema::{BookDraft, ReadingStatus, VaultBook};
use db::{default_db_path, Database};
use vault::VaultEntryPatch;

#[derive(Parser)]
#[command(name = "bookvault")]
#[command(about = "BookVault - A personal book-tracking vault", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a book to the vault
    Add {
        /// Book title
        title: String,
        /// Author name
        #[arg(short, long)]
        author: Option<String>,
        /// Publication year
        #[arg(short, long)]
        year: Option<i64>,
        /// Comma-separated genres
        #[arg(short, long)]
        genres: Option<String>,
        /// Initial status: want, reading or finished
        #[arg(short, long, default_value = "want")]
        status: String,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List vault entries
    List {
        /// Filter by status: want, reading or finished
        #[arg(short, long)]
        status: Option<String>,
        /// Substring match against title or author
        #[arg(short, long)]
        query: Option<String>,
        /// Substring match against genres
        #[arg(short, long)]
        genre: Option<String>,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show one vault entry
    Show {
        /// Vault entry ID
        id: i64,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Update a vault entry (omitted fields are left unchanged)
    Update {
        /// Vault entry ID
        id: i64,
        /// New status: want, reading or finished
        #[arg(short, long)]
        status: Option<String>,
        /// Progress percent (clamped to 0-100)
        #[arg(short, long)]
        progress: Option<i64>,
        /// Replace notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Remove an entry from the vault (book metadata is retained)
    Remove {
        /// Vault entry ID
        id: i64,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Export the whole library to a JSON backup
    Export {
        /// Destination file
        output: PathBuf,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Replace the whole library from a JSON backup
    Import {
        /// Backup file to restore
        input: PathBuf,
        /// Database path (defaults to ~/.bookvault/bookvault.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            title,
            author,
            year,
            genres,
            status,
            db,
        } => cmd_add(title, author, year, genres, status, db),
        Commands::List {
            status,
            query,
            genre,
            db,
        } => cmd_list(status, query, genre, db),
        Commands::Show { id, db } => cmd_show(id, db),
        Commands::Update {
            id,
            status,
            progress,
            notes,
            db,
        } => cmd_update(id, status, progress, notes, db),
        Commands::Remove { id, db } => cmd_remove(id, db),
        Commands::Export { output, db } => cmd_export(output, db),
        Commands::Import { input, db } => cmd_import(input, db),
    }
}

fn open_database(db: Option<PathBuf>) -> Result<Database> {
    let path = match db {
        Some(path) => path,
        None => default_db_path()?,
    };
    Ok(Database::new(path))
}

fn cmd_add(
    title: String,
    author: Option<String>,
    year: Option<i64>,
    genres: Option<String>,
    status: String,
    db: Option<PathBuf>,
) -> Result<()> {
    let db = open_database(db)?;
    let status: ReadingStatus = status.parse()?;

    let draft = BookDraft {
        title,
        author,
        year,
        genres: genres
            .map(|g| g.split(',').map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        ..Default::default()
    };

    let added = vault::add_to_vault(&db, &draft, status)?;
    println!(
        "Added '{}' to the vault (entry {}, status {})",
        added.book.title, added.entry.id, added.entry.status
    );
    Ok(())
}

fn cmd_list(
    status: Option<String>,
    query: Option<String>,
    genre: Option<String>,
    db: Option<PathBuf>,
) -> Result<()> {
    let db = open_database(db)?;
    let status = match status {
        Some(s) => Some(s.parse::<ReadingStatus>()?),
        None => None,
    };

    let books = vault::get_vault_books(&db, status, query.as_deref(), genre.as_deref())?;
    if books.is_empty() {
        println!("No vault entries found");
        return Ok(());
    }

    for vb in &books {
        print_vault_book_line(vb);
    }
    println!("{} entries", books.len());
    Ok(())
}

fn cmd_show(id: i64, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;

    let vb = vault::get_vault_book_by_user_book_id(&db, id)?
        .ok_or_else(|| anyhow::anyhow!("No vault entry with id {}", id))?;

    println!("Entry {}", vb.entry.id);
    println!("  Title:    {}", vb.book.title);
    if let Some(author) = &vb.book.author {
        println!("  Author:   {}", author);
    }
    if let Some(year) = vb.book.year {
        println!("  Year:     {}", year);
    }
    if let Some(genres) = &vb.book.genres {
        println!("  Genres:   {}", genres);
    }
    println!("  Status:   {}", vb.entry.status);
    println!("  Progress: {}%", vb.entry.progress_percent);
    if let Some(notes) = &vb.entry.notes {
        println!("  Notes:    {}", notes);
    }
    Ok(())
}

fn cmd_update(
    id: i64,
    status: Option<String>,
    progress: Option<i64>,
    notes: Option<String>,
    db: Option<PathBuf>,
) -> Result<()> {
    let db = open_database(db)?;

    let patch = VaultEntryPatch {
        status: match status {
            Some(s) => Some(s.parse::<ReadingStatus>()?),
            None => None,
        },
        progress_percent: progress,
        notes,
    };

    let updated = vault::update_vault_entry(&db, id, &patch)?;
    println!(
        "Updated entry {} ('{}'): status {}, progress {}%",
        updated.entry.id, updated.book.title, updated.entry.status, updated.entry.progress_percent
    );
    Ok(())
}

fn cmd_remove(id: i64, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    vault::remove_from_vault(&db, id)?;
    println!("Removed entry {} from the vault", id);
    Ok(())
}

fn cmd_export(output: PathBuf, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    let written = backup::export_backup(&db, &output)?;
    println!("Exported library to {}", written.display());
    Ok(())
}

fn cmd_import(input: PathBuf, db: Option<PathBuf>) -> Result<()> {
    let db = open_database(db)?;
    let restored = backup::restore_backup(&db, &input)?;
    println!("Restored library from {}", restored.display());
    Ok(())
}

fn print_vault_book_line(vb: &VaultBook) {
    let author = vb.book.author.as_deref().unwrap_or("unknown author");
    println!(
        "[{}] {} by {} ({}, {}%)",
        vb.entry.id, vb.book.title, author, vb.entry.status, vb.entry.progress_percent
    );
}
