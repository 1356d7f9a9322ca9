// Import pipeline: reader -> strategy -> normalizer -> draft batch

use chrono::Utc;
use tracing::{info, warn};

use crate::api_keys::{CredentialSource, SystemCredentials};
use crate::batches::{BatchManager, NewBatch};
use crate::config::ImportConfig;
use crate::governance::ActorContext;
use crate::model_adapters::{ModelAdapter, ModelDispatcher};
use crate::model_catalog::ModelCatalog;
use crate::question_import::extractors::ai::{self, AiExtractionInput};
use crate::question_import::extractors::{
    AiExtractor, ExtractionOutput, ExtractionStrategy, LegacyPdfParser, ProgressObserver,
    SpreadsheetExtractor,
};
use crate::question_import::readers::{self, PdfText, SourceContent, SourceFormat, UploadedFile};
use crate::question_import::schemas::ImportMetadata;
use crate::question_import::Normalizer;
use crate::{DbPool, Error, ImportBatch};

#[derive(Debug, Clone)]
pub struct PdfImportRequest {
    pub file: UploadedFile,
    pub answer_key: Option<UploadedFile>,
    pub use_ai: bool,
    pub ai_model: Option<String>,
    pub scholarship_mode: bool,
    pub subject_slug: Option<String>,
    pub batch_name: Option<String>,
}

impl PdfImportRequest {
    /// AI extraction and scholarship mode are on unless turned off.
    pub fn new(file: UploadedFile) -> Self {
        Self {
            file,
            answer_key: None,
            use_ai: true,
            ai_model: None,
            scholarship_mode: true,
            subject_slug: None,
            batch_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpreadsheetImportRequest {
    pub file: UploadedFile,
    pub subject_slug: String,
    pub batch_name: Option<String>,
}

/// Strategy picked for a PDF, with the reason when AI was requested but skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySelection {
    pub strategy: ExtractionStrategy,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub batch: ImportBatch,
    pub strategy: ExtractionStrategy,
}

impl ImportOutcome {
    pub fn used_ai(&self) -> bool {
        matches!(self.strategy, ExtractionStrategy::AiExtraction { .. })
    }
}

pub struct ImportPipeline {
    config: ImportConfig,
    catalog: ModelCatalog,
    credentials: Box<dyn CredentialSource>,
    adapter: Box<dyn ModelAdapter>,
    batches: BatchManager,
}

impl ImportPipeline {
    pub fn new(
        config: ImportConfig,
        catalog: ModelCatalog,
        credentials: Box<dyn CredentialSource>,
        adapter: Box<dyn ModelAdapter>,
        batches: BatchManager,
    ) -> Self {
        Self {
            config,
            catalog,
            credentials,
            adapter,
            batches,
        }
    }

    /// Environment/keyring credentials and live provider adapters.
    pub fn with_system_defaults(pool: DbPool, config: ImportConfig, catalog: ModelCatalog) -> Self {
        let adapter = ModelDispatcher::new(&catalog, config.ai.request_timeout_secs);
        let batches = BatchManager::new(pool, &config);
        Self::new(
            config,
            catalog,
            Box::new(SystemCredentials),
            Box::new(adapter),
            batches,
        )
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn credentials(&self) -> &dyn CredentialSource {
        self.credentials.as_ref()
    }

    pub fn batches(&self) -> &BatchManager {
        &self.batches
    }

    /// Picks the PDF strategy before anything is read or sent.
    ///
    /// An explicit model must be listed, enabled and have a credential. Without one
    /// the catalog default is tried, and the rule-based parser is used if it is not
    /// available.
    pub fn select_pdf_strategy(
        &self,
        use_ai: bool,
        ai_model: Option<&str>,
    ) -> Result<StrategySelection, Error> {
        if !use_ai {
            return Ok(StrategySelection {
                strategy: ExtractionStrategy::LegacyExtraction,
                fallback_reason: None,
            });
        }

        if let Some(model_id) = ai_model.map(str::trim).filter(|id| !id.is_empty()) {
            let model = ai::resolve_model(&self.catalog, model_id)?;
            ai::credential_for(model, self.credentials.as_ref())?;
            return Ok(StrategySelection {
                strategy: ExtractionStrategy::AiExtraction {
                    model_id: model.id.clone(),
                },
                fallback_reason: None,
            });
        }

        let default_id = self.catalog.default_model_id();
        let unavailable = match ai::resolve_model(&self.catalog, default_id) {
            Ok(model) => match ai::credential_for(model, self.credentials.as_ref()) {
                Ok(_) => None,
                Err(err) => Some(err.to_string()),
            },
            Err(err) => Some(err.to_string()),
        };

        Ok(match unavailable {
            None => StrategySelection {
                strategy: ExtractionStrategy::AiExtraction {
                    model_id: default_id.to_string(),
                },
                fallback_reason: None,
            },
            Some(reason) => {
                warn!(model = default_id, "default AI model unavailable, using rule-based parser: {reason}");
                StrategySelection {
                    strategy: ExtractionStrategy::LegacyExtraction,
                    fallback_reason: Some(reason),
                }
            }
        })
    }

    pub fn import_pdf(
        &self,
        request: PdfImportRequest,
        actor: &ActorContext,
        observer: &dyn ProgressObserver,
    ) -> Result<ImportOutcome, Error> {
        ensure_format(&request.file, |f| f == SourceFormat::Pdf, "a PDF file")?;
        if let Some(key) = &request.answer_key {
            ensure_format(key, |f| f == SourceFormat::Pdf, "a PDF answer key")?;
        }
        let subject_slug = request
            .subject_slug
            .clone()
            .unwrap_or_else(|| self.config.default_pdf_subject.clone());
        self.ensure_subject(&subject_slug)?;

        let selection = self.select_pdf_strategy(request.use_ai, request.ai_model.as_deref())?;
        info!(
            file = %request.file.file_name,
            strategy = selection.strategy.method().as_str(),
            scholarship = request.scholarship_mode,
            "importing PDF"
        );

        let paper = read_pdf(&request.file)?;
        let answer_key = request.answer_key.as_ref().map(read_pdf).transpose()?;
        let answer_key_text = answer_key.as_ref().map(|key| key.text.as_str());

        let output = match &selection.strategy {
            ExtractionStrategy::AiExtraction { model_id } => {
                let extractor = AiExtractor::new(
                    &self.catalog,
                    self.credentials.as_ref(),
                    self.adapter.as_ref(),
                    self.config.ai.max_output_tokens,
                );
                extractor.extract(
                    AiExtractionInput {
                        model_id,
                        paper_text: &paper.text,
                        answer_key_text,
                        scholarship_mode: request.scholarship_mode,
                    },
                    observer,
                )?
            }
            _ => LegacyPdfParser::parse(&paper.text, answer_key_text),
        };

        let metadata_seed = MetadataSeed {
            file: &request.file,
            answer_key: request.answer_key.as_ref(),
            strategy: &selection.strategy,
            scholarship_mode: request.scholarship_mode,
            fallback_reason: selection.fallback_reason,
        };
        let batch = self.finish(
            output,
            self.config.default_marks(request.scholarship_mode),
            metadata_seed,
            subject_slug,
            request.batch_name,
            actor,
        )?;

        Ok(ImportOutcome {
            batch,
            strategy: selection.strategy,
        })
    }

    pub fn import_spreadsheet(
        &self,
        request: SpreadsheetImportRequest,
        actor: &ActorContext,
    ) -> Result<ImportOutcome, Error> {
        let format = ensure_format(&request.file, |f| f.is_spreadsheet(), "a CSV or Excel file")?;
        self.ensure_subject(&request.subject_slug)?;

        let rows = match readers::read_source(&request.file, format)? {
            SourceContent::Rows(rows) => rows,
            SourceContent::Text(_) => {
                return Err(Error::Internal("spreadsheet reader returned text".to_string()))
            }
        };
        info!(file = %request.file.file_name, rows = rows.len(), "importing spreadsheet");

        let output = SpreadsheetExtractor::new(&self.config.column_aliases).extract(&rows);
        let strategy = ExtractionStrategy::SpreadsheetExtraction;
        let metadata_seed = MetadataSeed {
            file: &request.file,
            answer_key: None,
            strategy: &strategy,
            scholarship_mode: false,
            fallback_reason: None,
        };
        let batch = self.finish(
            output,
            self.config.default_marks(false),
            metadata_seed,
            request.subject_slug,
            request.batch_name,
            actor,
        )?;

        Ok(ImportOutcome { batch, strategy })
    }

    fn ensure_subject(&self, slug: &str) -> Result<(), Error> {
        if self.config.is_supported_subject(slug) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Unsupported subject '{}'. Supported subjects: {}",
                slug,
                self.config.subjects.join(", ")
            )))
        }
    }

    /// Normalizes the extracted questions and stores them as a draft batch.
    fn finish(
        &self,
        output: ExtractionOutput,
        default_marks: u32,
        seed: MetadataSeed<'_>,
        subject_slug: String,
        batch_name: Option<String>,
        actor: &ActorContext,
    ) -> Result<ImportBatch, Error> {
        let ExtractionOutput {
            questions,
            mut diagnostics,
            ai_metadata,
        } = output;

        let questions = Normalizer::new(default_marks).normalize_all(questions);
        if questions.is_empty() {
            return Err(Error::validation("No valid questions found"));
        }
        diagnostics.kept_count = questions.len();
        diagnostics.dropped_count = diagnostics.raw_count.saturating_sub(questions.len());
        diagnostics.rows_with_errors = questions.iter().filter(|q| q.error_count() > 0).count();

        let batch_name = batch_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_batch_name(seed.file));

        let metadata = ImportMetadata {
            file_name: seed.file.file_name.clone(),
            file_size: seed.file.size(),
            file_type: file_type(seed.file),
            source_sha256: seed.file.sha256_hex(),
            answer_key_file_name: seed.answer_key.map(|key| key.file_name.clone()),
            extraction_method: seed.strategy.method(),
            ai_model: seed.strategy.model_id().map(str::to_string),
            catalog_sha256: seed
                .strategy
                .model_id()
                .map(|_| self.catalog.hash().to_string()),
            scholarship_mode: seed.scholarship_mode,
            fallback_reason: seed.fallback_reason,
            diagnostics,
            ai_metadata,
            extracted_at: Utc::now(),
        };

        self.batches.create_batch(NewBatch {
            subject_slug,
            batch_name,
            questions,
            metadata,
            created_by: actor.user_id.clone(),
        })
    }
}

struct MetadataSeed<'r> {
    file: &'r UploadedFile,
    answer_key: Option<&'r UploadedFile>,
    strategy: &'r ExtractionStrategy,
    scholarship_mode: bool,
    fallback_reason: Option<String>,
}

fn ensure_format(
    file: &UploadedFile,
    accepted: impl Fn(SourceFormat) -> bool,
    expected: &str,
) -> Result<SourceFormat, Error> {
    if file.is_empty() {
        return Err(Error::validation(format!("'{}' is empty", file.file_name)));
    }
    match file.format() {
        Some(format) if accepted(format) => Ok(format),
        _ => Err(Error::validation(format!(
            "'{}' is not {} (type '{}')",
            file.file_name, expected, file.mime_type
        ))),
    }
}

fn read_pdf(file: &UploadedFile) -> Result<PdfText, Error> {
    match readers::read_source(file, SourceFormat::Pdf)? {
        SourceContent::Text(text) => Ok(text),
        SourceContent::Rows(_) => Err(Error::Internal("PDF reader returned rows".to_string())),
    }
}

fn file_type(file: &UploadedFile) -> String {
    let mime = file.mime_type.trim();
    if mime.is_empty() || mime == "application/octet-stream" {
        file.format()
            .map(|format| format.as_str().to_string())
            .unwrap_or_else(|| mime.to_string())
    } else {
        mime.to_string()
    }
}

/// `"<file stem> - <YYYY-MM-DD>"`
pub fn default_batch_name(file: &UploadedFile) -> String {
    format!("{} - {}", file.file_stem(), Utc::now().format("%Y-%m-%d"))
}
