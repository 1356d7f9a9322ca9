// Spreadsheet extraction: header aliases map row cells onto question fields

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::ai::strip_option_label;
use super::ExtractionOutput;
use crate::config::ColumnAliases;
use crate::question_import::processors::normalizer::{
    coerce_answer, coerce_answer_text_list, coerce_marks,
};
use crate::question_import::readers::RowMap;
use crate::question_import::schemas::{Difficulty, ExtractionDiagnostics, ParsedQuestion, QuestionType};

static OPTION_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\||\n|;)\s*").expect("option separator regex"));

/// Marks given when a row's marks cell is present but unusable.
pub const FALLBACK_MARKS: u32 = 1;

pub struct SpreadsheetExtractor<'a> {
    aliases: &'a ColumnAliases,
}

impl<'a> SpreadsheetExtractor<'a> {
    pub fn new(aliases: &'a ColumnAliases) -> Self {
        Self { aliases }
    }

    pub fn extract(&self, rows: &[RowMap]) -> ExtractionOutput {
        let questions: Vec<ParsedQuestion> = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| self.map_row(row, index))
            .collect();

        let raw_count = rows.len();
        debug!(rows = raw_count, kept = questions.len(), "spreadsheet rows mapped");

        ExtractionOutput {
            diagnostics: ExtractionDiagnostics {
                raw_count,
                kept_count: questions.len(),
                dropped_count: raw_count - questions.len(),
                ..Default::default()
            },
            questions,
            ai_metadata: None,
        }
    }

    /// `None` when the row has no primary question text.
    fn map_row(&self, row: &RowMap, index: usize) -> Option<ParsedQuestion> {
        let aliases = self.aliases;
        let text = row.get(&aliases.question_text_mr)?;

        let number = row
            .get(&aliases.question_number)
            .and_then(coerce_marks)
            .unwrap_or(index as u32 + 1);
        let mut question = ParsedQuestion::new(number);
        question.question_text_mr = text.to_string();
        question.question_text_en = row.get(&aliases.question_text_en).map(str::to_string);

        question.options = aliases
            .option_columns()
            .into_iter()
            .map(|columns| row.get(columns).unwrap_or_default().to_string())
            .collect();
        if question.options.iter().all(String::is_empty) {
            if let Some(combined) = row.get(&aliases.options) {
                question.options = OPTION_SEPARATOR
                    .split(combined)
                    .map(strip_option_label)
                    .filter(|o| !o.is_empty())
                    .collect();
            }
        }
        while question.options.last().is_some_and(String::is_empty) {
            question.options.pop();
        }

        if let Some(kind) = row.get(&aliases.question_type) {
            match QuestionType::parse(kind) {
                Some(parsed) => question.question_type = parsed,
                None => question.record_error(format!("Unknown question type '{kind}', using mcq_single")),
            }
        }

        if let Some(raw) = row.get(&aliases.correct_answer) {
            match coerce_answer(raw) {
                Some(index) => question.correct_answer = Some(index),
                None => question.record_error(format!("Could not interpret correct answer '{raw}'")),
            }
        }
        if let Some(raw) = row.get(&aliases.correct_answers) {
            match coerce_answer_text_list(raw) {
                Some(indices) => question.correct_answers = Some(indices),
                None => question.record_error(format!("Could not interpret correct answers '{raw}'")),
            }
        }

        question.difficulty = row
            .get(&aliases.difficulty)
            .map(Difficulty::coerce)
            .unwrap_or_default();

        if let Some(raw) = row.get(&aliases.marks) {
            match coerce_marks(raw) {
                Some(marks) => question.marks = marks,
                None => {
                    question.record_error(format!("Invalid marks '{raw}', using {FALLBACK_MARKS}"));
                    question.marks = FALLBACK_MARKS;
                }
            }
        }

        question.section = row.get(&aliases.section).map(str::to_string);
        question.class_level = row.get(&aliases.class_level).map(str::to_string);
        Some(question)
    }
}
