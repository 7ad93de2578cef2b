use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StorageError;
use crate::models::{Candidate, Picture, Status};

/// Persistence for candidate records, keyed by id.
pub trait CandidateStore {
    /// All stored candidates in insertion order.
    fn load_all(&self) -> Result<Vec<Candidate>, StorageError>;

    /// Insert a candidate that has no id yet; returns it with its new id.
    fn add(&self, candidate: &Candidate) -> Result<Candidate, StorageError>;

    fn add_all(&self, candidates: Vec<Candidate>) -> Result<Vec<Candidate>, StorageError> {
        candidates.iter().map(|c| self.add(c)).collect()
    }

    /// Upsert by id.
    fn put(&self, candidate: &Candidate) -> Result<(), StorageError>;
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "candidates") {
            proj_dirs.data_dir().join("candidates.db")
        } else {
            PathBuf::from("candidates.db")
        }
    }

    pub fn init(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved', 'rejected')),
                note TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL,
                picture_thumbnail TEXT NOT NULL DEFAULT '',
                picture_medium TEXT NOT NULL DEFAULT '',
                picture_large TEXT NOT NULL DEFAULT '',
                application_date TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                gender TEXT NOT NULL DEFAULT '',
                age INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_candidates_status ON candidates(status);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<(), StorageError> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='candidates'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StorageError::NotInitialized);
        }
        Ok(())
    }

    fn insert(conn: &Connection, candidate: &Candidate) -> Result<Candidate, StorageError> {
        conn.execute(
            "INSERT INTO candidates (status, note, name, picture_thumbnail, picture_medium,
                                     picture_large, application_date, location, gender, age)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                candidate.status,
                candidate.note,
                candidate.name,
                candidate.picture.thumbnail,
                candidate.picture.medium,
                candidate.picture.large,
                candidate.application_date,
                candidate.location,
                candidate.gender,
                candidate.age,
            ],
        )?;
        Ok(Candidate {
            id: Some(conn.last_insert_rowid()),
            ..candidate.clone()
        })
    }

    fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<Candidate> {
        Ok(Candidate {
            id: Some(row.get(0)?),
            status: row.get(1)?,
            note: row.get(2)?,
            name: row.get(3)?,
            picture: Picture {
                thumbnail: row.get(4)?,
                medium: row.get(5)?,
                large: row.get(6)?,
            },
            application_date: row.get(7)?,
            location: row.get(8)?,
            gender: row.get(9)?,
            age: row.get(10)?,
        })
    }
}

impl CandidateStore for Database {
    fn load_all(&self) -> Result<Vec<Candidate>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status, note, name, picture_thumbnail, picture_medium, picture_large,
                    application_date, location, gender, age
             FROM candidates ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::row_to_candidate)?;
        let candidates = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(count = candidates.len(), "loaded candidates");
        Ok(candidates)
    }

    fn add(&self, candidate: &Candidate) -> Result<Candidate, StorageError> {
        Self::insert(&self.conn, candidate)
    }

    fn add_all(&self, candidates: Vec<Candidate>) -> Result<Vec<Candidate>, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let saved = candidates
            .iter()
            .map(|c| Self::insert(&tx, c))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;
        debug!(count = saved.len(), "stored new candidates");
        Ok(saved)
    }

    fn put(&self, candidate: &Candidate) -> Result<(), StorageError> {
        let id = candidate.id.ok_or(StorageError::MissingId)?;
        self.conn.execute(
            "INSERT INTO candidates (id, status, note, name, picture_thumbnail, picture_medium,
                                     picture_large, application_date, location, gender, age)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                note = excluded.note,
                name = excluded.name,
                picture_thumbnail = excluded.picture_thumbnail,
                picture_medium = excluded.picture_medium,
                picture_large = excluded.picture_large,
                application_date = excluded.application_date,
                location = excluded.location,
                gender = excluded.gender,
                age = excluded.age,
                updated_at = datetime('now')",
            params![
                id,
                candidate.status,
                candidate.note,
                candidate.name,
                candidate.picture.thumbnail,
                candidate.picture.medium,
                candidate.picture.large,
                candidate.application_date,
                candidate.location,
                candidate.gender,
                candidate.age,
            ],
        )?;
        debug!(id, status = %candidate.status, "stored candidate");
        Ok(())
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candidate;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.ensure_initialized(),
            Err(StorageError::NotInitialized)
        ));
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn test_add_assigns_fresh_ids_in_order() {
        let db = db();
        let saved = db
            .add_all(vec![candidate("Abigail Carter"), candidate("Bárbara Fogaça")])
            .unwrap();
        assert_eq!(saved.len(), 2);
        let (a, b) = (saved[0].id.unwrap(), saved[1].id.unwrap());
        assert_ne!(a, b);

        let loaded = db.load_all().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_put_updates_existing_record() {
        let db = db();
        let mut saved = db.add(&candidate("Abigail Carter")).unwrap();
        saved.note = "strong portfolio".to_string();
        saved.status = Status::Approved;
        db.put(&saved).unwrap();

        let loaded = db.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].note, "strong portfolio");
        assert_eq!(loaded[0].status, Status::Approved);
    }

    #[test]
    fn test_put_without_id_fails() {
        let db = db();
        assert!(matches!(
            db.put(&candidate("Nobody")),
            Err(StorageError::MissingId)
        ));
    }

    #[test]
    fn test_corrupt_status_surfaces_as_error() {
        let db = db();
        db.add(&candidate("Abigail Carter")).unwrap();
        db.conn
            .execute_batch(
                "PRAGMA ignore_check_constraints = ON;
                 UPDATE candidates SET status = 'closed';",
            )
            .unwrap();
        assert!(db.load_all().is_err());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("candidates.db");
        let db = Database::open(&path).unwrap();
        db.init().unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }
}
