use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use question_import::schemas::{ImportMetadata, ParsedQuestion};

// The shared database pool type
pub type DbPool = Pool<SqliteConnectionManager>;

pub use question_import::extractors::ExtractionError;
pub use question_import::readers::ParseError;

// Crate-wide error type. Each variant maps to one user-facing failure at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Migration(#[from] rusqlite_migration::Error),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict(message.into())
    }

    /// Stable machine-readable code for the failure class.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Parse(_) => "parse_error",
            Error::Extraction(_) => "extraction_error",
            Error::Conflict(_) => "conflict_error",
            Error::NotFound(_) => "not_found",
            Error::Db(_) | Error::Pool(_) | Error::Migration(_) | Error::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// Whether the failure was caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Validation(_) | Error::Parse(_) | Error::Conflict(_) | Error::NotFound(_) => {
                true
            }
            Error::Extraction(err) => err.is_client_error(),
            Error::Db(_) | Error::Pool(_) | Error::Migration(_) | Error::Internal(_) => false,
        }
    }

    /// Message shown to the person who triggered the request, with guidance where we
    /// have any.
    pub fn user_message(&self) -> String {
        match self {
            Error::Parse(err) => format!("{err}. {}", err.guidance()),
            Error::Extraction(err) => format!("{err}. {}", err.guidance()),
            Error::Db(_) | Error::Pool(_) | Error::Migration(_) | Error::Internal(_) => {
                "Something went wrong while saving the import. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

/// Review lifecycle of an import batch. `Committed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Draft,
    Reviewed,
    Committed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "draft",
            BatchStatus::Reviewed => "reviewed",
            BatchStatus::Committed => "committed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(BatchStatus::Draft),
            "reviewed" => Some(BatchStatus::Reviewed),
            "committed" => Some(BatchStatus::Committed),
            _ => None,
        }
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, BatchStatus::Committed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: String,
    pub subject_slug: String,
    pub batch_name: String,
    pub status: BatchStatus,
    pub parsed_questions: Vec<ParsedQuestion>,
    pub metadata: ImportMetadata,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub mod api;
pub mod api_keys;
pub mod batches;
pub mod config;
pub mod governance;
pub mod model_adapters;
pub mod model_catalog;
pub mod orchestrator;
pub mod question_import;
pub mod store;
pub mod tokens;

pub use batches::{BatchManager, BatchPatch, BatchSummary, NewBatch};
pub use config::ImportConfig;
pub use governance::{ActorContext, Role};
pub use model_catalog::ModelCatalog;


#[cfg(test)]
pub(crate) mod test_support;
