// Extraction strategies: AI, legacy rule-based PDF, and spreadsheet column mapping

pub mod ai;
pub mod legacy;
pub mod prompts;
pub mod spreadsheet;

use tracing::info;

use super::schemas::{ExtractionDiagnostics, ExtractionMethod, ParsedQuestion};

pub use ai::AiExtractor;
pub use legacy::LegacyPdfParser;
pub use spreadsheet::SpreadsheetExtractor;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("{provider} API key is not configured for model '{model_id}'")]
    MissingCredential { provider: String, model_id: String },
    #[error("The AI model returned a response that is not valid question JSON: {0}")]
    MalformedResponse(String),
    #[error("The AI model did not respond within {0} seconds")]
    Timeout(u64),
    #[error("The AI provider request failed: {0}")]
    Provider(String),
    #[error("The document is too large for model '{model_id}' ({estimated} tokens, limit {limit})")]
    PromptTooLarge {
        model_id: String,
        estimated: usize,
        limit: usize,
    },
}

impl ExtractionError {
    pub fn guidance(&self) -> &'static str {
        match self {
            ExtractionError::MissingCredential { .. } => {
                "Configure the provider API key or turn off AI extraction to use the rule-based parser"
            }
            ExtractionError::MalformedResponse(_) => {
                "Try again, pick a different model, or turn off AI extraction"
            }
            ExtractionError::Timeout(_) => {
                "Try a smaller file or turn off AI extraction"
            }
            ExtractionError::Provider(_) => {
                "Check the provider status and API key, or turn off AI extraction"
            }
            ExtractionError::PromptTooLarge { .. } => {
                "Split the PDF into smaller parts or pick a model with a larger context window"
            }
        }
    }

    /// Only an oversized document is the uploader's to fix; the rest are upstream or
    /// deployment failures.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ExtractionError::PromptTooLarge { .. })
    }
}

/// Chosen once per request, before any extractor runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    AiExtraction { model_id: String },
    LegacyExtraction,
    SpreadsheetExtraction,
}

impl ExtractionStrategy {
    pub fn method(&self) -> ExtractionMethod {
        match self {
            ExtractionStrategy::AiExtraction { .. } => ExtractionMethod::Ai,
            ExtractionStrategy::LegacyExtraction => ExtractionMethod::Legacy,
            ExtractionStrategy::SpreadsheetExtraction => ExtractionMethod::Csv,
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        match self {
            ExtractionStrategy::AiExtraction { model_id } => Some(model_id),
            _ => None,
        }
    }
}

/// Result of one strategy run, before normalization.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub questions: Vec<ParsedQuestion>,
    pub diagnostics: ExtractionDiagnostics,
    pub ai_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Validating,
    Preprocessing,
    BuildingPrompt,
    AwaitingModel,
    ParsingResponse,
    Completed,
}

impl ExtractionStage {
    pub fn percent(&self) -> u8 {
        match self {
            ExtractionStage::Validating => 5,
            ExtractionStage::Preprocessing => 15,
            ExtractionStage::BuildingPrompt => 30,
            ExtractionStage::AwaitingModel => 40,
            ExtractionStage::ParsingResponse => 85,
            ExtractionStage::Completed => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExtractionStage::Validating => "validating",
            ExtractionStage::Preprocessing => "preprocessing",
            ExtractionStage::BuildingPrompt => "building_prompt",
            ExtractionStage::AwaitingModel => "awaiting_model",
            ExtractionStage::ParsingResponse => "parsing_response",
            ExtractionStage::Completed => "completed",
        }
    }
}

/// Receives extraction progress. Called synchronously on the extraction thread.
pub trait ProgressObserver {
    fn on_progress(&self, stage: ExtractionStage, percent: u8, message: &str);
}

pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _stage: ExtractionStage, _percent: u8, _message: &str) {}
}

/// Forwards progress to the log.
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&self, stage: ExtractionStage, percent: u8, message: &str) {
        info!(stage = stage.label(), percent, "{message}");
    }
}

pub(crate) fn report(observer: &dyn ProgressObserver, stage: ExtractionStage, message: &str) {
    observer.on_progress(stage, stage.percent(), message);
}
