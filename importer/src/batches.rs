// Draft batch lifecycle: create, fetch, review updates and the commit hook

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::governance::{self, ActorContext};
use crate::question_import::schemas::{ImportMetadata, ParsedQuestion};
use crate::store::import_batches;
use crate::{BatchStatus, DbPool, Error, ImportBatch};

pub use crate::store::import_batches::BatchSummary;

/// Input for [`BatchManager::create_batch`].
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub subject_slug: String,
    pub batch_name: String,
    pub questions: Vec<ParsedQuestion>,
    pub metadata: ImportMetadata,
    pub created_by: String,
}

/// Review submission: the full replacement question list.
#[derive(Debug, Clone)]
pub struct BatchPatch {
    pub questions: Vec<ParsedQuestion>,
    pub batch_name: Option<String>,
    pub status: BatchStatus,
}

#[derive(Clone)]
pub struct BatchManager {
    pool: DbPool,
    subjects: Vec<String>,
}

impl BatchManager {
    pub fn new(pool: DbPool, config: &ImportConfig) -> Self {
        Self {
            pool,
            subjects: config.subjects.clone(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn ensure_subject(&self, slug: &str) -> Result<(), Error> {
        if self.subjects.iter().any(|s| s == slug) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Unsupported subject '{}'. Supported subjects: {}",
                slug,
                self.subjects.join(", ")
            )))
        }
    }

    pub fn create_batch(&self, input: NewBatch) -> Result<ImportBatch, Error> {
        self.ensure_subject(&input.subject_slug)?;
        if input.questions.is_empty() {
            return Err(Error::validation("No valid questions found"));
        }
        let batch_name = input.batch_name.trim();
        if batch_name.is_empty() {
            return Err(Error::validation("Batch name must not be empty"));
        }

        let now = Utc::now();
        let batch = ImportBatch {
            id: Uuid::new_v4().to_string(),
            subject_slug: input.subject_slug,
            batch_name: batch_name.to_string(),
            status: BatchStatus::Draft,
            parsed_questions: input.questions,
            metadata: input.metadata,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };

        let conn = self.pool.get()?;
        import_batches::insert(&conn, &batch)?;
        info!(
            batch_id = %batch.id,
            subject = %batch.subject_slug,
            questions = batch.parsed_questions.len(),
            method = batch.metadata.extraction_method.as_str(),
            "import batch created"
        );
        Ok(batch)
    }

    /// Visibility is decided by the auth layer; the actor is accepted for symmetry
    /// with updates.
    pub fn get_batch_by_id(&self, id: &str, _actor: &ActorContext) -> Result<ImportBatch, Error> {
        let conn = self.pool.get()?;
        import_batches::get(&conn, id)?
            .ok_or_else(|| Error::NotFound(format!("Import batch '{id}' not found")))
    }

    pub fn list_batches(&self, subject_slug: Option<&str>) -> Result<Vec<BatchSummary>, Error> {
        let conn = self.pool.get()?;
        import_batches::list(&conn, subject_slug)
    }

    /// Replaces the batch's questions and status. Concurrent updates are last-write-wins;
    /// a batch committed between the read and the write is left untouched.
    pub fn update_batch(
        &self,
        id: &str,
        patch: BatchPatch,
        actor: &ActorContext,
    ) -> Result<ImportBatch, Error> {
        if patch.status == BatchStatus::Committed {
            return Err(Error::validation(
                "Batches are committed by the commit step, not by review updates",
            ));
        }
        if patch.questions.is_empty() {
            return Err(Error::validation("A review must keep at least one question"));
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut batch = import_batches::get(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("Import batch '{id}' not found")))?;
        governance::enforce_batch_edit(&batch, actor)?;

        let batch_name = patch
            .batch_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| batch.batch_name.clone());
        let now = Utc::now();

        let updated = import_batches::update_contents(
            &tx,
            id,
            &patch.questions,
            &batch_name,
            patch.status,
            now,
        )?;
        if !updated {
            warn!(batch_id = %id, "batch was committed before the review could be saved");
            return Err(Error::conflict(format!(
                "Batch '{}' was committed and can no longer be edited",
                batch.batch_name
            )));
        }
        tx.commit()?;

        batch.parsed_questions = patch.questions;
        batch.batch_name = batch_name;
        batch.status = patch.status;
        batch.updated_at = now;
        info!(
            batch_id = %id,
            status = %batch.status,
            questions = batch.parsed_questions.len(),
            actor = %actor.user_id,
            "import batch updated"
        );
        Ok(batch)
    }

    /// Status hook used by the commit step once rows have been promoted.
    /// Only reviewed batches can be committed.
    pub fn mark_committed(&self, id: &str) -> Result<ImportBatch, Error> {
        let conn = self.pool.get()?;
        let batch = import_batches::get(&conn, id)?
            .ok_or_else(|| Error::NotFound(format!("Import batch '{id}' not found")))?;
        if !import_batches::mark_committed(&conn, id, Utc::now())? {
            return Err(Error::conflict(format!(
                "Batch '{}' is {} and cannot be committed; review it first",
                batch.batch_name, batch.status
            )));
        }
        info!(batch_id = %id, "import batch committed");
        import_batches::get(&conn, id)?
            .ok_or_else(|| Error::NotFound(format!("Import batch '{id}' not found")))
    }
}
