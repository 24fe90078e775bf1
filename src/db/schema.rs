// Database schema types and query helpers
// Rows are mapped to typed records here; nothing above this layer sees a raw row.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

// ----- Reading status -----

/// Tracking state of a vault entry. Stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Want = 0,
    Reading = 1,
    Finished = 2,
}

impl ToSql for ReadingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(*self as i64))
    }
}

impl FromSql for ReadingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(ReadingStatus::Want),
            1 => Ok(ReadingStatus::Reading),
            2 => Ok(ReadingStatus::Finished),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

impl std::fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReadingStatus::Want => "want",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ReadingStatus {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "want" => Ok(ReadingStatus::Want),
            "reading" => Ok(ReadingStatus::Reading),
            "finished" => Ok(ReadingStatus::Finished),
            _ => Err(VaultError::InvalidInput(format!(
                "unknown status '{}' (expected want, reading or finished)",
                s
            ))),
        }
    }
}

// ----- Book -----

/// Book metadata, independent of any tracking state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub genres: Option<String>,
    pub cover_url: Option<String>,
    pub isbn_10: Option<String>,
    pub isbn_13: Option<String>,
    pub external_source: Option<String>,
    pub external_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Caller-supplied book fields for an add. Genres arrive as a list and are
/// normalized to a single stored string at write time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub isbn_10: Option<String>,
    #[serde(default)]
    pub isbn_13: Option<String>,
    #[serde(default)]
    pub external_source: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl BookDraft {
    /// The external (source, id) pair, when both halves are non-empty.
    /// Drafts without one are manual entries and are never deduplicated.
    pub fn external_pair(&self) -> Option<(&str, &str)> {
        match (self.external_source.as_deref(), self.external_id.as_deref()) {
            (Some(source), Some(id)) if !source.trim().is_empty() && !id.trim().is_empty() => {
                Some((source, id))
            }
            _ => None,
        }
    }
}

// ----- Vault entry (user_books) -----

/// One user's tracking state for exactly one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBook {
    pub id: i64,
    pub book_id: i64,
    pub status: ReadingStatus,
    pub progress_percent: i64,
    pub notes: Option<String>,
    pub added_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub updated_at: i64,
}

/// Join projection of a vault entry and its book, used for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBook {
    pub entry: UserBook,
    pub book: Book,
}

// ----- Row mapping -----

fn map_user_book(row: &Row, off: usize) -> rusqlite::Result<UserBook> {
    Ok(UserBook {
        id: row.get(off)?,
        book_id: row.get(off + 1)?,
        status: row.get(off + 2)?,
        progress_percent: row.get(off + 3)?,
        notes: row.get(off + 4)?,
        added_at: row.get(off + 5)?,
        started_at: row.get(off + 6)?,
        finished_at: row.get(off + 7)?,
        updated_at: row.get(off + 8)?,
    })
}

fn map_book(row: &Row, off: usize) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(off)?,
        title: row.get(off + 1)?,
        author: row.get(off + 2)?,
        year: row.get(off + 3)?,
        description: row.get(off + 4)?,
        genres: row.get(off + 5)?,
        cover_url: row.get(off + 6)?,
        isbn_10: row.get(off + 7)?,
        isbn_13: row.get(off + 8)?,
        external_source: row.get(off + 9)?,
        external_id: row.get(off + 10)?,
        created_at: row.get(off + 11)?,
        updated_at: row.get(off + 12)?,
    })
}

const BOOK_COLUMNS: &str =
    "id, title, author, year, description, genres, cover_url, isbn_10, isbn_13,
     external_source, external_id, created_at, updated_at";

const VAULT_BOOK_SELECT: &str =
    "SELECT ub.id, ub.book_id, ub.status, ub.progress_percent, ub.notes,
            ub.added_at, ub.started_at, ub.finished_at, ub.updated_at,
            b.id, b.title, b.author, b.year, b.description, b.genres, b.cover_url,
            b.isbn_10, b.isbn_13, b.external_source, b.external_id,
            b.created_at, b.updated_at
     FROM user_books ub
     JOIN books b ON b.id = ub.book_id";

fn map_vault_book(row: &Row) -> rusqlite::Result<VaultBook> {
    Ok(VaultBook {
        entry: map_user_book(row, 0)?,
        book: map_book(row, 9)?,
    })
}

// ----- Book queries -----

pub fn insert_book(
    conn: &Connection,
    draft: &BookDraft,
    genres: Option<&str>,
    now_ms: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO books (title, author, year, description, genres, cover_url,
                            isbn_10, isbn_13, external_source, external_id,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            draft.title,
            draft.author,
            draft.year,
            draft.description,
            genres,
            draft.cover_url,
            draft.isbn_10,
            draft.isbn_13,
            draft.external_source,
            draft.external_id,
            now_ms,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update a book's metadata in place, keeping its id and created_at.
pub fn update_book(
    conn: &Connection,
    id: i64,
    draft: &BookDraft,
    genres: Option<&str>,
    now_ms: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE books SET title = ?1, author = ?2, year = ?3, description = ?4,
                          genres = ?5, cover_url = ?6, isbn_10 = ?7, isbn_13 = ?8,
                          external_source = ?9, external_id = ?10, updated_at = ?11
         WHERE id = ?12",
        params![
            draft.title,
            draft.author,
            draft.year,
            draft.description,
            genres,
            draft.cover_url,
            draft.isbn_10,
            draft.isbn_13,
            draft.external_source,
            draft.external_id,
            now_ms,
            id,
        ],
    )?;
    Ok(())
}

pub fn get_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    let sql = format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS);
    let result = conn
        .query_row(&sql, params![id], |row| map_book(row, 0))
        .optional()?;
    Ok(result)
}

pub fn find_book_id_by_external(
    conn: &Connection,
    source: &str,
    external_id: &str,
) -> Result<Option<i64>> {
    let result = conn
        .query_row(
            "SELECT id FROM books WHERE external_source = ?1 AND external_id = ?2",
            params![source, external_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(result)
}

// ----- Vault entry queries -----

pub fn insert_user_book(
    conn: &Connection,
    book_id: i64,
    status: ReadingStatus,
    now_ms: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO user_books (book_id, status, progress_percent, added_at, updated_at)
         VALUES (?1, ?2, 0, ?3, ?3)",
        params![book_id, status, now_ms],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user_book(conn: &Connection, id: i64) -> Result<Option<UserBook>> {
    let result = conn
        .query_row(
            "SELECT id, book_id, status, progress_percent, notes,
                    added_at, started_at, finished_at, updated_at
             FROM user_books WHERE id = ?1",
            params![id],
            |row| map_user_book(row, 0),
        )
        .optional()?;
    Ok(result)
}

pub fn find_user_book_by_book(conn: &Connection, book_id: i64) -> Result<Option<UserBook>> {
    let result = conn
        .query_row(
            "SELECT id, book_id, status, progress_percent, notes,
                    added_at, started_at, finished_at, updated_at
             FROM user_books WHERE book_id = ?1",
            params![book_id],
            |row| map_user_book(row, 0),
        )
        .optional()?;
    Ok(result)
}

/// Persist a fully-resolved entry state. The vault layer decides the new
/// field values; this just writes them.
pub fn update_user_book(conn: &Connection, entry: &UserBook) -> Result<()> {
    conn.execute(
        "UPDATE user_books SET status = ?1, progress_percent = ?2, notes = ?3,
                               started_at = ?4, finished_at = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            entry.status,
            entry.progress_percent,
            entry.notes,
            entry.started_at,
            entry.finished_at,
            entry.updated_at,
            entry.id,
        ],
    )?;
    Ok(())
}

/// Delete an entry row. Returns the number of rows removed (0 or 1).
pub fn delete_user_book(conn: &Connection, id: i64) -> Result<usize> {
    let affected = conn.execute("DELETE FROM user_books WHERE id = ?1", params![id])?;
    Ok(affected)
}

// ----- Combined views -----

pub fn get_vault_book(conn: &Connection, user_book_id: i64) -> Result<Option<VaultBook>> {
    let sql = format!("{} WHERE ub.id = ?1", VAULT_BOOK_SELECT);
    let result = conn
        .query_row(&sql, params![user_book_id], map_vault_book)
        .optional()?;
    Ok(result)
}

/// Filtered, sorted vault listing. Filters combine with AND; results are
/// ordered most-recently-touched first.
pub fn list_vault_books(
    conn: &Connection,
    status: Option<ReadingStatus>,
    query: Option<&str>,
    genre_contains: Option<&str>,
) -> Result<Vec<VaultBook>> {
    use rusqlite::types::Value;

    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = status {
        conditions.push(format!("ub.status = ?{}", values.len() + 1));
        values.push(Value::Integer(status as i64));
    }

    // Case-insensitive substring over title OR author
    if let Some(query) = query {
        let needle = query.to_lowercase();
        conditions.push(format!(
            "(instr(lower(b.title), ?{}) > 0 OR instr(lower(coalesce(b.author, '')), ?{}) > 0)",
            values.len() + 1,
            values.len() + 2,
        ));
        values.push(Value::Text(needle.clone()));
        values.push(Value::Text(needle));
    }

    // Substring over the raw stored genres string
    if let Some(genre) = genre_contains {
        conditions.push(format!(
            "instr(coalesce(b.genres, ''), ?{}) > 0",
            values.len() + 1
        ));
        values.push(Value::Text(genre.to_string()));
    }

    let mut sql = String::from(VAULT_BOOK_SELECT);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY ub.updated_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values), map_vault_book)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}
