use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use stackhub_import::api::{self, ErrorResponse, ReviewSubmission};
use stackhub_import::api_keys::{self, ApiKeyProvider};
use stackhub_import::orchestrator::{ImportPipeline, PdfImportRequest, SpreadsheetImportRequest};
use stackhub_import::question_import::extractors::TracingProgress;
use stackhub_import::question_import::{ParsedQuestion, UploadedFile};
use stackhub_import::{store, ActorContext, ImportConfig, ModelCatalog, Role};

/// Imports question papers and spreadsheets into draft batches for review.
#[derive(Parser, Debug)]
#[command(name = "stackhub-import", author, version, about, long_about = None)]
struct Cli {
    /// SQLite database holding import batches (":memory:" for a throwaway store).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Acting user id recorded as the batch creator.
    #[arg(long, global = true, default_value = "cli")]
    user: String,

    /// Acting role: admin, teacher or school_admin.
    #[arg(long, global = true, default_value = "admin")]
    role: String,

    /// Print raw JSON instead of a summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog models and whether their API keys are configured.
    Models,
    /// Import a PDF question paper.
    ImportPdf {
        file: PathBuf,
        /// Answer key PDF used to backfill correct answers.
        #[arg(long)]
        answer_key: Option<PathBuf>,
        /// Use the rule-based parser instead of an AI model.
        #[arg(long)]
        no_ai: bool,
        /// Catalog model id; the catalog default when omitted.
        #[arg(long)]
        model: Option<String>,
        /// Treat the paper as a generic exam rather than a scholarship paper.
        #[arg(long)]
        generic: bool,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Import a CSV or Excel sheet of questions.
    ImportSheet {
        file: PathBuf,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show one batch as JSON.
    Show { batch_id: String },
    /// List batches, newest first.
    List {
        #[arg(long)]
        subject: Option<String>,
    },
    /// Replace a batch's questions with a reviewed JSON list and mark it reviewed.
    Review {
        batch_id: String,
        /// JSON file with a question array or `{"questions": [...], "batchName": ...}`.
        questions: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Mark a reviewed batch as committed.
    Commit { batch_id: String },
    /// Store a provider API key in the OS keyring.
    SetKey { provider: String, api_key: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<stackhub_import::Error>() {
                Some(import_err) => {
                    let response = ErrorResponse::from(import_err);
                    eprintln!("{} [{}] {}", "✗".red(), response.error, response.message);
                }
                None => eprintln!("{} {:#}", "✗".red(), err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let actor = ActorContext::new(
        cli.user.clone(),
        Role::from_str(&cli.role).ok_or_else(|| anyhow!("unknown role '{}'", cli.role))?,
    );

    match cli.command {
        Command::Models => {
            let catalog = ModelCatalog::load_default_or_fallback();
            print_models(&catalog);
            Ok(())
        }
        Command::SetKey { provider, api_key } => {
            let provider = ApiKeyProvider::from_str(&provider)
                .ok_or_else(|| anyhow!("unknown provider '{provider}'"))?;
            api_keys::store_api_key(provider, &api_key)?;
            println!("{} {} key stored", "✓".green(), provider.display_name());
            Ok(())
        }
        command => {
            let pipeline = open_pipeline(cli.db.as_deref())?;
            run_batch_command(&pipeline, command, &actor, cli.json)
        }
    }
}

fn run_batch_command(
    pipeline: &ImportPipeline,
    command: Command,
    actor: &ActorContext,
    json: bool,
) -> Result<()> {
    match command {
        Command::ImportPdf {
            file,
            answer_key,
            no_ai,
            model,
            generic,
            subject,
            name,
        } => {
            let mut request = PdfImportRequest::new(read_upload(&file)?);
            request.answer_key = answer_key.as_deref().map(read_upload).transpose()?;
            request.use_ai = !no_ai;
            request.ai_model = model;
            request.scholarship_mode = !generic;
            request.subject_slug = subject;
            request.batch_name = name;

            let response = api::import_pdf(pipeline, request, actor, &TracingProgress)?;
            if json {
                print_json(&response)?;
            } else {
                let method = response
                    .metadata
                    .as_ref()
                    .map(|m| m.extraction_method.as_str())
                    .unwrap_or("unknown");
                println!(
                    "{} {} ({} questions, {})",
                    "✓".green(),
                    response.batch_name.bold(),
                    response.questions_count,
                    method
                );
                if let Some(reason) = response.metadata.as_ref().and_then(|m| m.fallback_reason.as_deref()) {
                    println!("  {} AI skipped: {}", "!".yellow(), reason);
                }
                print_questions(&response.questions);
                println!("  batch id: {}", response.batch_id);
            }
        }
        Command::ImportSheet { file, subject, name } => {
            let request = SpreadsheetImportRequest {
                file: read_upload(&file)?,
                subject_slug: subject,
                batch_name: name,
            };
            let response = api::import_spreadsheet(pipeline, request, actor)?;
            if json {
                print_json(&response)?;
            } else {
                println!(
                    "{} {} ({} questions)",
                    "✓".green(),
                    response.batch_name.bold(),
                    response.questions_count
                );
                print_questions(&response.questions);
                println!("  batch id: {}", response.batch_id);
            }
        }
        Command::Show { batch_id } => {
            let batch = api::get_batch(pipeline, &batch_id, actor)?;
            print_json(&batch)?;
        }
        Command::List { subject } => {
            let summaries = api::list_batches(pipeline, subject.as_deref())?;
            if json {
                print_json(&summaries)?;
            } else if summaries.is_empty() {
                println!("No import batches");
            } else {
                for summary in summaries {
                    println!(
                        "{}  {:<9}  {:>4}  {}  {}",
                        summary.id.dimmed(),
                        summary.status.to_string(),
                        summary.questions_count,
                        summary.subject_slug.cyan(),
                        summary.batch_name
                    );
                }
            }
        }
        Command::Review {
            batch_id,
            questions,
            name,
        } => {
            let submission = read_review(&batch_id, &questions, name)?;
            let response = api::save_review(pipeline, submission, actor)?;
            if json {
                print_json(&response)?;
            } else {
                println!(
                    "{} batch {} is {} ({} questions)",
                    "✓".green(),
                    response.batch_id,
                    response.status.to_string().bold(),
                    response.questions_count
                );
            }
        }
        Command::Commit { batch_id } => {
            let batch = pipeline.batches().mark_committed(&batch_id)?;
            println!("{} {} committed", "✓".green(), batch.batch_name.bold());
        }
        Command::Models | Command::SetKey { .. } => bail!("command does not use the import store"),
    }
    Ok(())
}

fn open_pipeline(db: Option<&Path>) -> Result<ImportPipeline> {
    tracing::debug!(db = ?db, "opening import store");
    let config = ImportConfig::load_default()?;
    let catalog = ModelCatalog::load_default_or_fallback();

    let pool = match db {
        Some(path) if path.as_os_str() == ":memory:" => store::open_in_memory()?,
        Some(path) => store::open_pool(path)?,
        None => {
            let path = default_db_path()?;
            store::open_pool(&path)?
        }
    };
    Ok(ImportPipeline::with_system_defaults(pool, config, catalog))
}

fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("could not determine the user data directory; pass --db")?
        .join("stackhub-import");
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
    Ok(dir.join("imports.sqlite"))
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = fs::read(path).with_context(|| format!("failed to read file: {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(UploadedFile::new(file_name, mime_for(path), bytes))
}

fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

fn read_review(batch_id: &str, path: &Path, name: Option<String>) -> Result<ReviewSubmission> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON from: {}", path.display()))?;

    let (questions, file_name) = match value {
        serde_json::Value::Array(items) => (serde_json::Value::Array(items), None),
        serde_json::Value::Object(mut object) => {
            let questions = object
                .remove("questions")
                .ok_or_else(|| anyhow!("{} has no \"questions\" field", path.display()))?;
            let batch_name = object
                .remove("batchName")
                .and_then(|v| v.as_str().map(str::to_string));
            (questions, batch_name)
        }
        _ => bail!("{} must hold a question array or object", path.display()),
    };

    let body = serde_json::json!({
        "batchId": batch_id,
        "questions": questions,
        "batchName": name.or(file_name),
    });
    Ok(api::parse_review_submission(&body.to_string())?)
}

fn print_models(catalog: &ModelCatalog) {
    let credentials = stackhub_import::api_keys::SystemCredentials;
    println!("Model catalog {} ({})", catalog.version().bold(), &catalog.hash()[..catalog.hash().len().min(12)]);
    for model in &catalog.raw.models {
        let default_marker = if model.id == catalog.default_model_id() { "*" } else { " " };
        let key_ready = ApiKeyProvider::from_str(&model.provider)
            .map(|provider| api_keys::CredentialSource::has_api_key(&credentials, provider))
            .unwrap_or(!model.requires_api_key);
        let status = match (model.enabled, key_ready) {
            (false, _) => "disabled".dimmed(),
            (true, true) => "ready".green(),
            (true, false) => "no key".yellow(),
        };
        println!(
            "{} {:<22} {:<10} {:<8} {}",
            default_marker, model.id, model.provider, status, model.display_name
        );
    }
}

fn print_questions(questions: &[ParsedQuestion]) {
    for question in questions {
        let answer = question
            .correct_answer
            .map(|index| ((b'A' + index as u8) as char).to_string())
            .unwrap_or_else(|| "?".to_string());
        let text: String = question.question_text_mr.chars().take(60).collect();
        println!("  {:>3}. [{}] {}", question.question_number, answer, text);
        for error in question.parsing_errors.iter().flatten() {
            println!("       {} {}", "!".yellow(), error);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
