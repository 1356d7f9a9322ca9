// Queries for the 'import_batches' table

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::question_import::schemas::ParsedQuestion;
use crate::{BatchStatus, Error, ImportBatch};

const BATCH_COLUMNS: &str = "id, subject_slug, batch_name, status, parsed_questions, metadata, \
                             created_by, created_at, updated_at";

/// Listing row: everything but the question payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub id: String,
    pub subject_slug: String,
    pub batch_name: String,
    pub status: BatchStatus,
    pub questions_count: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("failed to encode {what}: {e}")))
}

fn status_from_sql(index: usize, raw: String) -> rusqlite::Result<BatchStatus> {
    BatchStatus::from_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("unknown batch status '{raw}'").into(),
        )
    })
}

fn json_from_sql<T: serde::de::DeserializeOwned>(index: usize, raw: String) -> rusqlite::Result<T> {
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn batch_from_row(row: &Row<'_>) -> rusqlite::Result<ImportBatch> {
    Ok(ImportBatch {
        id: row.get(0)?,
        subject_slug: row.get(1)?,
        batch_name: row.get(2)?,
        status: status_from_sql(3, row.get(3)?)?,
        parsed_questions: json_from_sql(4, row.get(4)?)?,
        metadata: json_from_sql(5, row.get(5)?)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert(conn: &Connection, batch: &ImportBatch) -> Result<(), Error> {
    conn.execute(
        &format!("INSERT INTO import_batches ({BATCH_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            batch.id,
            batch.subject_slug,
            batch.batch_name,
            batch.status.as_str(),
            to_json(&batch.parsed_questions, "parsed questions")?,
            to_json(&batch.metadata, "batch metadata")?,
            batch.created_by,
            batch.created_at,
            batch.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<ImportBatch>, Error> {
    let batch = conn
        .query_row(
            &format!("SELECT {BATCH_COLUMNS} FROM import_batches WHERE id = ?1"),
            params![id],
            batch_from_row,
        )
        .optional()?;
    Ok(batch)
}

/// Newest first, optionally restricted to one subject.
pub fn list(conn: &Connection, subject_slug: Option<&str>) -> Result<Vec<BatchSummary>, Error> {
    let mut stmt = conn.prepare(concat!(
        "SELECT id, subject_slug, batch_name, status, json_array_length(parsed_questions), ",
        "created_by, created_at, updated_at ",
        "FROM import_batches ",
        "WHERE ?1 IS NULL OR subject_slug = ?1 ",
        "ORDER BY created_at DESC, id"
    ))?;

    let rows = stmt.query_map(params![subject_slug], |row| {
        let count: i64 = row.get(4)?;
        Ok(BatchSummary {
            id: row.get(0)?,
            subject_slug: row.get(1)?,
            batch_name: row.get(2)?,
            status: status_from_sql(3, row.get(3)?)?,
            questions_count: count.max(0) as usize,
            created_by: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    })?;

    let summaries = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(summaries)
}

/// Replaces the question list, name and status of a batch that is not committed.
/// Returns `false` when no editable row matched.
pub fn update_contents(
    conn: &Connection,
    id: &str,
    questions: &[ParsedQuestion],
    batch_name: &str,
    status: BatchStatus,
    updated_at: DateTime<Utc>,
) -> Result<bool, Error> {
    let changed = conn.execute(
        concat!(
            "UPDATE import_batches ",
            "SET parsed_questions = ?2, batch_name = ?3, status = ?4, updated_at = ?5 ",
            "WHERE id = ?1 AND status != 'committed'"
        ),
        params![
            id,
            to_json(&questions, "parsed questions")?,
            batch_name,
            status.as_str(),
            updated_at,
        ],
    )?;
    Ok(changed == 1)
}

/// Moves a reviewed batch to `committed`. Returns `false` when the batch is not reviewed.
pub fn mark_committed(conn: &Connection, id: &str, at: DateTime<Utc>) -> Result<bool, Error> {
    let changed = conn.execute(
        "UPDATE import_batches SET status = 'committed', updated_at = ?2 WHERE id = ?1 AND status = 'reviewed'",
        params![id, at],
    )?;
    Ok(changed == 1)
}
