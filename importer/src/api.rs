// Boundary operations: request/response shapes for import and review
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::batches::{BatchPatch, BatchSummary};
use crate::governance::{self, ActorContext};
use crate::orchestrator::{ImportOutcome, ImportPipeline, PdfImportRequest, SpreadsheetImportRequest};
use crate::question_import::extractors::ProgressObserver;
use crate::question_import::processors::normalizer::{
    coerce_answer_list, coerce_answer_value, coerce_count_value,
};
use crate::question_import::schemas::{Difficulty, ImportMetadata, ParsedQuestion, QuestionType};
use crate::question_import::Normalizer;
use crate::{BatchStatus, Error, ImportBatch};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub batch_id: String,
    pub batch_name: String,
    pub questions_count: usize,
    pub questions: Vec<ParsedQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImportMetadata>,
    #[serde(rename = "useAI", default, skip_serializing_if = "Option::is_none")]
    pub use_ai: Option<bool>,
}

impl ImportResponse {
    fn from_batch(batch: ImportBatch, use_ai: Option<bool>) -> Self {
        Self {
            batch_id: batch.id,
            batch_name: batch.batch_name,
            questions_count: batch.parsed_questions.len(),
            questions: batch.parsed_questions,
            metadata: Some(batch.metadata),
            use_ai,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub batch_id: String,
    pub questions: Vec<ParsedQuestion>,
    #[serde(default)]
    pub batch_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody {
    batch_id: String,
    questions: Vec<ReviewQuestion>,
    #[serde(default)]
    batch_name: Option<String>,
}

/// A question as the review form sends it. Enum and numeric fields arrive loosely
/// typed and are coerced the same way extracted questions are.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewQuestion {
    #[serde(default)]
    question_number: Option<Value>,
    #[serde(default)]
    question_text_mr: String,
    #[serde(default)]
    question_text_en: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_answer: Option<Value>,
    #[serde(default)]
    correct_answers: Option<Value>,
    #[serde(default)]
    question_type: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    marks: Option<Value>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    class_level: Option<String>,
    #[serde(default)]
    parsing_errors: Option<Vec<String>>,
}

impl ReviewQuestion {
    /// Unusable values are dropped with a parsing error; the normalizer fills defaults.
    fn into_parsed(self) -> ParsedQuestion {
        let mut question = ParsedQuestion::new(0);
        question.parsing_errors = self.parsing_errors;
        question.question_text_mr = self.question_text_mr;
        question.question_text_en = self.question_text_en;
        question.options = self.options;
        question.section = self.section;
        question.class_level = self.class_level;

        match self.question_number.as_ref().map(coerce_count_value) {
            Some(Ok(Some(number))) => question.question_number = number,
            Some(Err(number)) => question.record_error(format!(
                "Question number {number} is out of range, numbered by position"
            )),
            _ => {}
        }

        if let Some(raw) = self.correct_answer.filter(|v| !v.is_null()) {
            match coerce_answer_value(&raw) {
                Some(index) => question.correct_answer = Some(index),
                None => question.record_error(format!("Could not interpret correct answer {raw}")),
            }
        }
        if let Some(raw) = self.correct_answers.filter(|v| !v.is_null()) {
            match coerce_answer_list(&raw) {
                Some(indices) => question.correct_answers = Some(indices),
                None => question.record_error(format!("Could not interpret correct answers {raw}")),
            }
        }

        if let Some(kind) = self.question_type.filter(|t| !t.trim().is_empty()) {
            match QuestionType::parse(&kind) {
                Some(parsed) => question.question_type = parsed,
                None => question.record_error(format!("Unknown question type '{kind}', using mcq_single")),
            }
        }
        question.difficulty = self
            .difficulty
            .as_deref()
            .map(Difficulty::coerce)
            .unwrap_or_default();

        question.marks = match self.marks.as_ref().map(coerce_count_value) {
            Some(Ok(marks)) => marks.unwrap_or(0),
            Some(Err(marks)) => {
                question.record_error(format!("Marks {marks} is out of range, using the default"));
                0
            }
            None => 0,
        };
        question
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub questions_count: usize,
}

/// Failure as shown to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        let status = match err {
            Error::Validation(_) | Error::Parse(_) => 400,
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::Extraction(e) if e.is_client_error() => 413,
            Error::Extraction(_) => 502,
            Error::Db(_) | Error::Pool(_) | Error::Migration(_) | Error::Internal(_) => 500,
        };
        if !err.is_client_error() {
            warn!(code = err.code(), "import request failed: {err}");
        }
        ErrorResponse {
            error: err.code().to_string(),
            message: err.user_message(),
            status,
        }
    }
}

pub fn import_pdf(
    pipeline: &ImportPipeline,
    request: PdfImportRequest,
    actor: &ActorContext,
    observer: &dyn ProgressObserver,
) -> Result<ImportResponse, Error> {
    let outcome = pipeline.import_pdf(request, actor, observer)?;
    let used_ai = outcome.used_ai();
    Ok(ImportResponse::from_batch(outcome.batch, Some(used_ai)))
}

pub fn import_spreadsheet(
    pipeline: &ImportPipeline,
    request: SpreadsheetImportRequest,
    actor: &ActorContext,
) -> Result<ImportResponse, Error> {
    let ImportOutcome { batch, .. } = pipeline.import_spreadsheet(request, actor)?;
    Ok(ImportResponse::from_batch(batch, None))
}

/// Decodes a review body. Shape problems are the client's and come back as validation
/// errors; loosely typed field values are coerced rather than rejected.
pub fn parse_review_submission(body: &str) -> Result<ReviewSubmission, Error> {
    let body: ReviewBody = serde_json::from_str(body)
        .map_err(|e| Error::validation(format!("Invalid review submission: {e}")))?;
    if body.batch_id.trim().is_empty() {
        return Err(Error::validation("batchId is required"));
    }
    if body.questions.is_empty() {
        return Err(Error::validation("questions must contain at least one question"));
    }
    Ok(ReviewSubmission {
        batch_id: body.batch_id,
        questions: body.questions.into_iter().map(ReviewQuestion::into_parsed).collect(),
        batch_name: body.batch_name,
    })
}

/// Normalizes the reviewer's questions and stores them, marking the batch reviewed.
pub fn save_review(
    pipeline: &ImportPipeline,
    submission: ReviewSubmission,
    actor: &ActorContext,
) -> Result<ReviewResponse, Error> {
    let batches = pipeline.batches();
    let current = batches.get_batch_by_id(&submission.batch_id, actor)?;
    // Lifecycle and ownership come before content checks; update_batch re-checks both.
    governance::enforce_batch_edit(&current, actor)?;
    let default_marks = pipeline
        .config()
        .default_marks(current.metadata.scholarship_mode);
    let questions = Normalizer::new(default_marks).normalize_all(submission.questions);
    if questions.is_empty() {
        return Err(Error::validation("No valid questions found"));
    }

    let updated = batches.update_batch(
        &submission.batch_id,
        BatchPatch {
            questions,
            batch_name: submission.batch_name,
            status: BatchStatus::Reviewed,
        },
        actor,
    )?;

    Ok(ReviewResponse {
        batch_id: updated.id,
        status: updated.status,
        questions_count: updated.parsed_questions.len(),
    })
}

pub fn get_batch(
    pipeline: &ImportPipeline,
    batch_id: &str,
    actor: &ActorContext,
) -> Result<ImportBatch, Error> {
    pipeline.batches().get_batch_by_id(batch_id, actor)
}

pub fn list_batches(
    pipeline: &ImportPipeline,
    subject_slug: Option<&str>,
) -> Result<Vec<BatchSummary>, Error> {
    pipeline.batches().list_batches(subject_slug)
}
