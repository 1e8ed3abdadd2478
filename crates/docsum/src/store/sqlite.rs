//! SQLite-backed [`MetadataStore`].
//!
//! Uses a single rusqlite connection behind a `Mutex`. SQLite serializes writes
//! anyway, and holding the lock across the conditional `UPDATE` and the follow-up
//! status read keeps [`MetadataStore::transition`] atomic.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{migrations, DocumentPatch, MetadataStore, StoreError, TransitionResult};
use crate::document::{DocumentId, DocumentRecord};
use crate::extract::ExtractMetadata;
use crate::summary::SummaryStatus;

/// Cloning is cheap and every clone shares the same connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        migrations::run_all(&conn)?;

        log::info!("Metadata store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    // Fixed-width so that text order matches time order.
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_date(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("invalid date '{}': {}", value, e),
        })
}

/// Raw column values, decoded into a record after the row is read.
struct DocumentRow {
    id: String,
    original_name: String,
    stored_path: String,
    size_bytes: i64,
    mime_type: String,
    content: String,
    metadata: String,
    summary: Option<String>,
    summary_status: String,
    summary_date: Option<String>,
    upload_date: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_name: row.get("original_name")?,
            stored_path: row.get("stored_path")?,
            size_bytes: row.get("size_bytes")?,
            mime_type: row.get("mime_type")?,
            content: row.get("content")?,
            metadata: row.get("metadata")?,
            summary: row.get("summary")?,
            summary_status: row.get("summary_status")?,
            summary_date: row.get("summary_date")?,
            upload_date: row.get("upload_date")?,
        })
    }

    fn into_record(self) -> Result<DocumentRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let summary_status: SummaryStatus = self
            .summary_status
            .parse::<SummaryStatus>()
            .map_err(|e| corrupt(format!("{}", e)))?;
        let metadata: ExtractMetadata = serde_json::from_str(&self.metadata)
            .map_err(|e| corrupt(format!("invalid metadata: {}", e)))?;
        let summary_date = self
            .summary_date
            .as_deref()
            .map(|d| parse_date(&self.id, d))
            .transpose()?;
        let upload_date = parse_date(&self.id, &self.upload_date)?;

        Ok(DocumentRecord {
            id: DocumentId::from(self.id),
            original_name: self.original_name,
            stored_path: PathBuf::from(self.stored_path),
            size_bytes: self.size_bytes.max(0) as u64,
            mime_type: self.mime_type,
            content: self.content,
            metadata,
            summary: self.summary,
            summary_status,
            summary_date,
            upload_date,
        })
    }
}

fn metadata_json(metadata: &ExtractMetadata) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}

/// Builds the `SET` clause and parameters for a patch. Parameter numbering
/// starts at `?2`; `?1` is always the document id.
fn patch_assignments(patch: &DocumentPatch) -> (Vec<String>, Vec<Box<dyn ToSql>>) {
    let mut assignments = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    let mut push = |column: &str, value: Box<dyn ToSql>| {
        values.push(value);
        assignments.push(format!("{} = ?{}", column, values.len() + 1));
    };

    if let Some(content) = &patch.content {
        push("content", Box::new(content.clone()));
    }
    if let Some(metadata) = &patch.metadata {
        push("metadata", Box::new(metadata_json(metadata)));
    }
    if let Some(summary) = &patch.summary {
        push("summary", Box::new(summary.clone()));
    }
    if let Some(status) = patch.summary_status {
        push("summary_status", Box::new(status.as_str()));
    }
    if let Some(date) = &patch.summary_date {
        push("summary_date", Box::new(date.as_ref().map(format_date)));
    }

    (assignments, values)
}

fn run_patch(
    conn: &Connection,
    id: &DocumentId,
    patch: &DocumentPatch,
    condition: &str,
    extra: Vec<Box<dyn ToSql>>,
) -> Result<usize, StoreError> {
    let (assignments, mut values) = patch_assignments(patch);
    if assignments.is_empty() {
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1 {})", condition),
            params_from_iter(
                std::iter::once(Box::new(id.as_str().to_string()) as Box<dyn ToSql>)
                    .chain(extra),
            ),
            |r| r.get(0),
        )?;
        return Ok(exists as usize);
    }

    let sql = format!(
        "UPDATE documents SET {} WHERE id = ?1 {}",
        assignments.join(", "),
        condition
    );
    values.extend(extra);

    let mut all: Vec<Box<dyn ToSql>> = Vec::with_capacity(values.len() + 1);
    all.push(Box::new(id.as_str().to_string()));
    all.extend(values);

    Ok(conn.execute(&sql, params_from_iter(all))?)
}

impl MetadataStore for SqliteStore {
    fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, seq, original_name, stored_path, size_bytes, mime_type,
                 content, metadata, summary, summary_status, summary_date, upload_date)
                 VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents), ?2, ?3, ?4, ?5,
                 ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET original_name = excluded.original_name,
                 stored_path = excluded.stored_path, size_bytes = excluded.size_bytes,
                 mime_type = excluded.mime_type, content = excluded.content,
                 metadata = excluded.metadata, summary = excluded.summary,
                 summary_status = excluded.summary_status, summary_date = excluded.summary_date,
                 upload_date = excluded.upload_date",
                params![
                    record.id.as_str(),
                    record.original_name,
                    record.stored_path.to_string_lossy().into_owned(),
                    record.size_bytes as i64,
                    record.mime_type,
                    record.content,
                    metadata_json(&record.metadata),
                    record.summary,
                    record.summary_status.as_str(),
                    record.summary_date.as_ref().map(format_date),
                    format_date(&record.upload_date),
                ],
            )?;
            Ok(())
        })
    }

    fn get(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM documents WHERE id = ?1",
                    params![id.as_str()],
                    DocumentRow::from_row,
                )
                .optional()?)
        })?;

        row.map(DocumentRow::into_record).transpose()
    }

    fn update_fields(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<bool, StoreError> {
        self.with_conn(|conn| Ok(run_patch(conn, id, patch, "", Vec::new())? > 0))
    }

    fn transition(
        &self,
        id: &DocumentId,
        from: &[SummaryStatus],
        patch: &DocumentPatch,
    ) -> Result<TransitionResult, StoreError> {
        self.with_conn(|conn| {
            if !from.is_empty() {
                let (assignments, _) = patch_assignments(patch);
                let first = assignments.len() + 2;
                let placeholders: Vec<String> =
                    (0..from.len()).map(|i| format!("?{}", first + i)).collect();
                let condition = format!("AND summary_status IN ({})", placeholders.join(", "));
                let extra: Vec<Box<dyn ToSql>> = from
                    .iter()
                    .map(|s| Box::new(s.as_str()) as Box<dyn ToSql>)
                    .collect();

                if run_patch(conn, id, patch, &condition, extra)? > 0 {
                    return Ok(TransitionResult::Applied);
                }
            }

            let current: Option<String> = conn
                .query_row(
                    "SELECT summary_status FROM documents WHERE id = ?1",
                    params![id.as_str()],
                    |r| r.get(0),
                )
                .optional()?;

            match current {
                None => Ok(TransitionResult::Missing),
                Some(status) => {
                    let status = status.parse::<SummaryStatus>().map_err(|e| StoreError::Corrupt {
                        id: id.to_string(),
                        reason: format!("{}", e),
                    })?;
                    Ok(TransitionResult::Rejected(status))
                }
            }
        })
    }

    fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.as_str()])?;
            Ok(removed > 0)
        })
    }

    fn list_ids_by_recency(&self) -> Result<Vec<DocumentId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM documents ORDER BY upload_date DESC, seq DESC")?;
            let ids = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .map(|r| r.map(DocumentId::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    fn ids_with_status(&self, status: SummaryStatus) -> Result<Vec<DocumentId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM documents WHERE summary_status = ?1 ORDER BY upload_date, seq",
            )?;
            let ids = stmt
                .query_map(params![status.as_str()], |r| r.get::<_, String>(0))?
                .map(|r| r.map(DocumentId::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}
