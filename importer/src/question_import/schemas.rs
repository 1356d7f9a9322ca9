// Canonical question schema shared by every extraction strategy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of question kinds the back-office can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    McqSingle,
    McqTwo,
    McqThree,
    McqMultiple,
    TrueFalse,
    FillBlank,
    Match,
    ShortAnswer,
    LongAnswer,
    Programming,
}

impl QuestionType {
    pub const ALL: [QuestionType; 10] = [
        QuestionType::McqSingle,
        QuestionType::McqTwo,
        QuestionType::McqThree,
        QuestionType::McqMultiple,
        QuestionType::TrueFalse,
        QuestionType::FillBlank,
        QuestionType::Match,
        QuestionType::ShortAnswer,
        QuestionType::LongAnswer,
        QuestionType::Programming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::McqSingle => "mcq_single",
            QuestionType::McqTwo => "mcq_two",
            QuestionType::McqThree => "mcq_three",
            QuestionType::McqMultiple => "mcq_multiple",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Match => "match",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::LongAnswer => "long_answer",
            QuestionType::Programming => "programming",
        }
    }

    /// Lenient parse of the spellings found in spreadsheets and model output.
    pub fn parse(s: &str) -> Option<Self> {
        let key = s
            .trim()
            .to_lowercase()
            .replace(['-', ' ', '/'], "_");
        let parsed = match key.as_str() {
            "mcq_single" | "mcq" | "single" | "single_choice" | "mcq_1" => QuestionType::McqSingle,
            "mcq_two" | "mcq_2" | "two_correct" => QuestionType::McqTwo,
            "mcq_three" | "mcq_3" | "three_correct" => QuestionType::McqThree,
            "mcq_multiple" | "multiple" | "multiple_choice" | "multi" => QuestionType::McqMultiple,
            "true_false" | "truefalse" | "tf" | "boolean" => QuestionType::TrueFalse,
            "fill_blank" | "fill_in_the_blank" | "fill_blanks" | "blank" => QuestionType::FillBlank,
            "match" | "matching" | "match_the_following" => QuestionType::Match,
            "short_answer" | "short" => QuestionType::ShortAnswer,
            "long_answer" | "long" | "essay" => QuestionType::LongAnswer,
            "programming" | "code" | "coding" => QuestionType::Programming,
            _ => return None,
        };
        Some(parsed)
    }

    /// Types answered by picking among the four options.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::McqSingle
                | QuestionType::McqTwo
                | QuestionType::McqThree
                | QuestionType::McqMultiple
        )
    }

    pub fn is_multi_answer(&self) -> bool {
        matches!(
            self,
            QuestionType::McqTwo | QuestionType::McqThree | QuestionType::McqMultiple
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "सोपे" | "सोपा" => Some(Difficulty::Easy),
            "medium" | "moderate" | "मध्यम" => Some(Difficulty::Medium),
            "hard" | "difficult" | "कठीण" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Anything outside the enum collapses to `Medium`.
    pub fn coerce(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// One question as produced by a strategy and consumed by review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuestion {
    #[serde(default)]
    pub question_number: u32,
    #[serde(default)]
    pub question_text_mr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text_en: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<Vec<usize>>,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub marks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_errors: Option<Vec<String>>,
}

impl ParsedQuestion {
    pub fn new(question_number: u32) -> Self {
        Self {
            question_number,
            question_text_mr: String::new(),
            question_text_en: None,
            options: Vec::new(),
            correct_answer: None,
            correct_answers: None,
            question_type: QuestionType::default(),
            difficulty: Difficulty::default(),
            marks: 0,
            section: None,
            class_level: None,
            parsing_errors: None,
        }
    }

    /// Primary (Marathi slot) text is what decides whether a row survives.
    pub fn has_primary_text(&self) -> bool {
        !self.question_text_mr.trim().is_empty()
    }

    /// Records an anomaly once; repeated messages are ignored.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        let errors = self.parsing_errors.get_or_insert_with(Vec::new);
        if !errors.contains(&message) {
            errors.push(message);
        }
    }

    pub fn error_count(&self) -> usize {
        self.parsing_errors.as_ref().map(Vec::len).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Ai,
    Legacy,
    Csv,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Ai => "ai",
            ExtractionMethod::Legacy => "legacy",
            ExtractionMethod::Csv => "csv",
        }
    }
}

/// Per-extraction counters kept with the batch for later diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionDiagnostics {
    pub raw_count: usize,
    pub kept_count: usize,
    pub dropped_count: usize,
    pub rows_with_errors: usize,
    #[serde(default)]
    pub answers_from_key: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_estimate: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
}

/// Provenance stored alongside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub source_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key_file_name: Option<String>,
    pub extraction_method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_sha256: Option<String>,
    #[serde(default)]
    pub scholarship_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(default)]
    pub diagnostics: ExtractionDiagnostics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_metadata: Option<serde_json::Value>,
    pub extracted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_parses_common_spellings() {
        assert_eq!(QuestionType::parse("MCQ"), Some(QuestionType::McqSingle));
        assert_eq!(
            QuestionType::parse("multiple choice"),
            Some(QuestionType::McqMultiple)
        );
        assert_eq!(QuestionType::parse("true/false"), Some(QuestionType::TrueFalse));
        assert_eq!(QuestionType::parse("fill-blank"), Some(QuestionType::FillBlank));
        assert_eq!(QuestionType::parse("riddle"), None);

        for kind in QuestionType::ALL {
            assert_eq!(QuestionType::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_difficulty_collapses_to_medium() {
        assert_eq!(Difficulty::coerce("HARD"), Difficulty::Hard);
        assert_eq!(Difficulty::coerce("extreme"), Difficulty::Medium);
        assert_eq!(Difficulty::coerce(""), Difficulty::Medium);
    }

    #[test]
    fn parsed_question_serializes_compactly() {
        let mut question = ParsedQuestion::new(3);
        question.question_text_mr = "प्रश्न".to_string();
        question.options = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        question.marks = 2;

        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["questionNumber"], 3);
        assert_eq!(json["questionType"], "mcq_single");
        assert_eq!(json["difficulty"], "medium");
        assert!(json.get("parsingErrors").is_none());
        assert!(json.get("correctAnswer").is_none());
    }

    #[test]
    fn record_error_ignores_duplicates() {
        let mut question = ParsedQuestion::new(1);
        question.record_error("Expected 4 options, found 2");
        question.record_error("Expected 4 options, found 2");
        assert_eq!(question.error_count(), 1);
    }
}
