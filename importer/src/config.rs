// importer/src/config.rs
//!
//! Import configuration: subject allow-list, marks defaults, AI call settings and the
//! spreadsheet column alias table. Loaded from `config/import.toml`; every section
//! falls back to the built-in defaults when omitted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const IMPORT_CONFIG_FILE_NAME: &str = "import.toml";

/// Looks for `config/<file_name>` next to the working directory, its parent, and the
/// executable.
pub fn find_config_file(file_name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(dir) = std::env::var("STACKHUB_CONFIG_DIR") {
        candidates.push(PathBuf::from(dir).join(file_name));
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("config").join(file_name));
        candidates.push(cwd.join("..").join("config").join(file_name));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            candidates.push(exe_dir.join("config").join(file_name));
            if let Some(parent_dir) = exe_dir.parent() {
                candidates.push(parent_dir.join("config").join(file_name));
            }
        }
    }

    for path in &candidates {
        debug!(path = %path.display(), "looking for config file");
        if path.exists() {
            return Some(path.clone());
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Subject slugs a batch may be filed under
    pub subjects: Vec<String>,
    /// Subject used for PDF imports that do not name one
    pub default_pdf_subject: String,
    pub marks: MarksPolicy,
    pub ai: AiSettings,
    pub column_aliases: ColumnAliases,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarksPolicy {
    pub scholarship: u32,
    pub generic: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub request_timeout_secs: u64,
    pub max_output_tokens: u32,
}

/// Accepted header spellings per question field, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub question_number: Vec<String>,
    pub question_text_mr: Vec<String>,
    pub question_text_en: Vec<String>,
    pub option_a: Vec<String>,
    pub option_b: Vec<String>,
    pub option_c: Vec<String>,
    pub option_d: Vec<String>,
    /// A single cell holding every option, separated by `|` or newlines
    pub options: Vec<String>,
    pub correct_answer: Vec<String>,
    pub correct_answers: Vec<String>,
    pub question_type: Vec<String>,
    pub difficulty: Vec<String>,
    pub marks: Vec<String>,
    pub section: Vec<String>,
    pub class_level: Vec<String>,
}

impl ColumnAliases {
    pub fn option_columns(&self) -> [&[String]; 4] {
        [&self.option_a, &self.option_b, &self.option_c, &self.option_d]
    }
}

impl ImportConfig {
    /// Load `config/import.toml`, or the built-in defaults when there is none
    pub fn load_default() -> Result<Self> {
        match find_config_file(IMPORT_CONFIG_FILE_NAME) {
            Some(path) => Self::load_from_path(&path),
            None => {
                warn!("no {IMPORT_CONFIG_FILE_NAME} found; using built-in import settings");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import config from {:?}", path))?;
        let config = Self::load_from_str(&toml_str)?;
        info!(path = %path.display(), subjects = config.subjects.len(), "import config loaded");
        Ok(config)
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config: ImportConfig =
            toml::from_str(toml_str).context("Failed to parse import config TOML")?;
        anyhow::ensure!(
            config.is_supported_subject(&config.default_pdf_subject),
            "default_pdf_subject '{}' is not in the subject list",
            config.default_pdf_subject
        );
        Ok(config)
    }

    pub fn is_supported_subject(&self, slug: &str) -> bool {
        self.subjects.iter().any(|s| s == slug)
    }

    /// Marks given to a question whose marks are missing or unusable
    pub fn default_marks(&self, scholarship_mode: bool) -> u32 {
        if scholarship_mode {
            self.marks.scholarship
        } else {
            self.marks.generic
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            subjects: [
                "scholarship",
                "marathi",
                "english",
                "mathematics",
                "intelligence-test",
                "general-knowledge",
                "science",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_pdf_subject: "scholarship".to_string(),
            marks: MarksPolicy::default(),
            ai: AiSettings::default(),
            column_aliases: ColumnAliases::default(),
        }
    }
}

impl Default for MarksPolicy {
    fn default() -> Self {
        Self {
            scholarship: 2,
            generic: 1,
        }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            max_output_tokens: 8192,
        }
    }
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            question_number: aliases(&["Question Number", "question_number", "questionNumber", "Q.No", "No"]),
            question_text_mr: aliases(&[
                "Question (Marathi)",
                "question_mr",
                "questionTextMr",
                "question_text_mr",
                "Question Marathi",
                "प्रश्न",
                "Question",
                "Question Text",
                "questionText",
            ]),
            question_text_en: aliases(&[
                "Question (English)",
                "question_en",
                "questionTextEn",
                "question_text_en",
                "Question English",
            ]),
            option_a: aliases(&["Option A", "option_a", "optionA", "Option 1", "A", "पर्याय 1"]),
            option_b: aliases(&["Option B", "option_b", "optionB", "Option 2", "B", "पर्याय 2"]),
            option_c: aliases(&["Option C", "option_c", "optionC", "Option 3", "C", "पर्याय 3"]),
            option_d: aliases(&["Option D", "option_d", "optionD", "Option 4", "D", "पर्याय 4"]),
            options: aliases(&["Options", "options", "पर्याय"]),
            correct_answer: aliases(&["Correct Answer", "correct_answer", "correctAnswer", "Answer", "उत्तर"]),
            correct_answers: aliases(&["Correct Answers", "correct_answers", "correctAnswers", "Answers"]),
            question_type: aliases(&["Question Type", "question_type", "questionType", "Type"]),
            difficulty: aliases(&["Difficulty", "difficulty_level", "Level"]),
            marks: aliases(&["Marks", "Mark", "Points", "गुण"]),
            section: aliases(&["Section", "विभाग"]),
            class_level: aliases(&["Class Level", "class_level", "classLevel", "Class", "इयत्ता"]),
        }
    }
}
