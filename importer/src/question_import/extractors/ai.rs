// AI extraction: prompt a catalog model and decode its JSON into questions

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{prompts, report, ExtractionError, ExtractionOutput, ExtractionStage, ProgressObserver};
use crate::api_keys::{ApiKeyProvider, CredentialSource};
use crate::model_adapters::ModelAdapter;
use crate::model_catalog::{ModelCatalog, ModelDef};
use crate::question_import::processors::normalizer::{
    coerce_answer_list, coerce_answer_value, coerce_count_value,
};
use crate::question_import::schemas::{Difficulty, ExtractionDiagnostics, ParsedQuestion, QuestionType};
use crate::{tokens, Error};

static FIRST_QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[1१]\.(?:[^0-9०-९]|$)").expect("first question regex"));

static OPTION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:\(\s*(?:[1-4१-४]|[A-Da-d]|[कखगघ])\s*\)|(?:[1-4१-४]|[A-Da-d]|[कखगघ])[.)](?:\s+|$))\s*",
    )
    .expect("option label regex")
});

const RESPONSE_PREVIEW_CHARS: usize = 200;

/// Model must be listed and enabled; otherwise the error names the valid choices.
pub fn resolve_model<'c>(catalog: &'c ModelCatalog, model_id: &str) -> Result<&'c ModelDef, Error> {
    catalog.get_enabled_model(model_id).ok_or_else(|| {
        Error::validation(format!(
            "Unsupported AI model '{}'. Valid models: {}",
            model_id,
            catalog.enabled_model_ids()
        ))
    })
}

/// API key for the model's provider, or `None` for models that need none.
pub fn credential_for(
    model: &ModelDef,
    credentials: &dyn CredentialSource,
) -> Result<Option<String>, ExtractionError> {
    if !model.requires_api_key {
        return Ok(None);
    }
    let missing = || ExtractionError::MissingCredential {
        provider: model.provider.clone(),
        model_id: model.id.clone(),
    };
    let provider = ApiKeyProvider::from_str(&model.provider).ok_or_else(missing)?;
    credentials.api_key(provider).map(Some).ok_or_else(missing)
}

/// Drops the instructions preamble that precedes question 1 on scholarship papers.
/// Text without a `1.` / `१.` line marker is returned unchanged.
pub fn strip_instructions_preamble(text: &str) -> &str {
    match FIRST_QUESTION.find(text) {
        Some(found) => &text[found.start()..],
        None => text,
    }
}

/// Removes a leading `(1)`, `A)`, `b.` or `क)` style label from option text.
pub fn strip_option_label(option: &str) -> String {
    OPTION_LABEL.replace(option, "").trim().to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiQuestion {
    #[serde(default)]
    question_number: Option<Value>,
    #[serde(default, alias = "question_text_mr", alias = "questionText", alias = "question")]
    question_text_mr: Option<String>,
    #[serde(default, alias = "question_text_en")]
    question_text_en: Option<String>,
    #[serde(default)]
    options: Vec<Value>,
    #[serde(default, alias = "correct_answer", alias = "answer")]
    correct_answer: Option<Value>,
    #[serde(default, alias = "correct_answers")]
    correct_answers: Option<Value>,
    #[serde(default, alias = "question_type", alias = "type")]
    question_type: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    marks: Option<Value>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default, alias = "class_level")]
    class_level: Option<String>,
}

/// Decoded model reply: raw question entries plus the model's metadata object.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub questions: Vec<Value>,
    pub metadata: Option<Value>,
}

/// Parses the model's reply. Markdown fences and prose around the JSON object are
/// tolerated; anything without a `questions` array is malformed.
pub fn parse_model_response(raw: &str) -> Result<ModelResponse, ExtractionError> {
    let trimmed = raw.trim();
    let parsed: Value = serde_json::from_str(trimmed).or_else(|first_err| {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if end > start => serde_json::from_str(&trimmed[start..=end])
                .map_err(|err| malformed(err, trimmed)),
            _ => Err(malformed(first_err, trimmed)),
        }
    })?;

    match parsed {
        Value::Object(mut object) => match object.remove("questions") {
            Some(Value::Array(questions)) => Ok(ModelResponse {
                questions,
                metadata: object.remove("metadata").filter(|m| !m.is_null()),
            }),
            _ => Err(ExtractionError::MalformedResponse(
                "response has no \"questions\" array".to_string(),
            )),
        },
        Value::Array(questions) => Ok(ModelResponse {
            questions,
            metadata: None,
        }),
        _ => Err(ExtractionError::MalformedResponse(
            "response is not a JSON object".to_string(),
        )),
    }
}

fn malformed(err: serde_json::Error, raw: &str) -> ExtractionError {
    let preview: String = raw.chars().take(RESPONSE_PREVIEW_CHARS).collect();
    ExtractionError::MalformedResponse(format!("{err} (response starts with: {preview:?})"))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["text", "textMr", "value", "option"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn into_parsed_question(entry: AiQuestion, position: usize) -> ParsedQuestion {
    let mut question = ParsedQuestion::new(position as u32 + 1);
    match entry.question_number.as_ref().map(coerce_count_value) {
        Some(Ok(Some(number))) => question.question_number = number,
        Some(Err(number)) => question.record_error(format!(
            "Question number {number} is out of range, numbered by position"
        )),
        _ => {}
    }

    let text_mr = entry.question_text_mr.unwrap_or_default();
    let text_en = entry.question_text_en.filter(|t| !t.trim().is_empty());
    // English-only papers come back in the English slot; the primary slot holds the paper text.
    if text_mr.trim().is_empty() {
        question.question_text_mr = text_en.unwrap_or_default();
    } else {
        question.question_text_mr = text_mr;
        question.question_text_en = text_en;
    }

    question.options = entry
        .options
        .iter()
        .map(|option| strip_option_label(&value_text(option)))
        .collect();

    if let Some(raw) = entry.correct_answer.filter(|v| !v.is_null()) {
        match coerce_answer_value(&raw) {
            Some(index) => question.correct_answer = Some(index),
            None => question.record_error(format!("Could not interpret correct answer {raw}")),
        }
    }
    if let Some(raw) = entry.correct_answers.filter(|v| !v.is_null()) {
        match coerce_answer_list(&raw) {
            Some(indices) => question.correct_answers = Some(indices),
            None => question.record_error(format!("Could not interpret correct answers {raw}")),
        }
    }

    if let Some(kind) = entry.question_type.filter(|t| !t.trim().is_empty()) {
        match QuestionType::parse(&kind) {
            Some(parsed) => question.question_type = parsed,
            None => question.record_error(format!("Unknown question type '{kind}', using mcq_single")),
        }
    }
    question.difficulty = entry
        .difficulty
        .as_deref()
        .map(Difficulty::coerce)
        .unwrap_or_default();
    // Zero is filled with the default marks by the normalizer.
    question.marks = match entry.marks.as_ref().map(coerce_count_value) {
        Some(Ok(marks)) => marks.unwrap_or(0),
        Some(Err(marks)) => {
            question.record_error(format!("Marks {marks} is out of range, using the default"));
            0
        }
        None => 0,
    };
    question.section = entry.section;
    question.class_level = entry.class_level;
    question
}

/// What to extract and how.
#[derive(Debug, Clone, Copy)]
pub struct AiExtractionInput<'t> {
    pub model_id: &'t str,
    pub paper_text: &'t str,
    pub answer_key_text: Option<&'t str>,
    pub scholarship_mode: bool,
}

pub struct AiExtractor<'a> {
    catalog: &'a ModelCatalog,
    credentials: &'a dyn CredentialSource,
    adapter: &'a dyn ModelAdapter,
    max_output_tokens: u32,
}

impl<'a> AiExtractor<'a> {
    pub fn new(
        catalog: &'a ModelCatalog,
        credentials: &'a dyn CredentialSource,
        adapter: &'a dyn ModelAdapter,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            catalog,
            credentials,
            adapter,
            max_output_tokens,
        }
    }

    pub fn extract(
        &self,
        input: AiExtractionInput<'_>,
        observer: &dyn ProgressObserver,
    ) -> Result<ExtractionOutput, Error> {
        report(observer, ExtractionStage::Validating, "Checking AI model");
        let model = resolve_model(self.catalog, input.model_id)?;
        let api_key = credential_for(model, self.credentials)?;

        report(observer, ExtractionStage::Preprocessing, "Preparing paper text");
        let paper_text = if input.scholarship_mode {
            strip_instructions_preamble(input.paper_text)
        } else {
            input.paper_text
        };

        report(observer, ExtractionStage::BuildingPrompt, "Building prompt");
        let prompt = prompts::build_prompt(
            paper_text,
            input.answer_key_text,
            input.scholarship_mode,
            self.max_output_tokens,
        );
        let prompt_tokens_estimate = tokens::check_prompt_budget(model, &prompt)?;

        report(
            observer,
            ExtractionStage::AwaitingModel,
            &format!("Waiting for {}", model.display_name),
        );
        info!(model = %model.id, prompt_tokens_estimate, "requesting AI extraction");
        let generation = self.adapter.generate(model, api_key.as_deref(), &prompt)?;

        report(observer, ExtractionStage::ParsingResponse, "Reading model response");
        let response = parse_model_response(&generation.response)?;
        let raw_count = response.questions.len();

        let mut questions = Vec::with_capacity(raw_count);
        for (position, entry) in response.questions.into_iter().enumerate() {
            match serde_json::from_value::<AiQuestion>(entry) {
                Ok(entry) => {
                    let question = into_parsed_question(entry, position);
                    if question.has_primary_text() {
                        questions.push(question);
                    }
                }
                Err(err) => warn!(position, "skipping undecodable question entry: {err}"),
            }
        }

        let kept_count = questions.len();
        report(
            observer,
            ExtractionStage::Completed,
            &format!("Extracted {kept_count} questions"),
        );

        Ok(ExtractionOutput {
            questions,
            diagnostics: ExtractionDiagnostics {
                raw_count,
                kept_count,
                dropped_count: raw_count - kept_count,
                prompt_tokens_estimate: Some(prompt_tokens_estimate),
                prompt_tokens: Some(generation.usage.prompt_tokens),
                completion_tokens: Some(generation.usage.completion_tokens),
                ..Default::default()
            },
            ai_metadata: response.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_keys::StaticCredentials;
    use crate::model_adapters::{LlmGeneration, PromptRequest, TokenUsage};
    use std::sync::Mutex;

    struct CannedAdapter {
        reply: String,
        prompts: Mutex<Vec<PromptRequest>>,
    }

    impl CannedAdapter {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl ModelAdapter for CannedAdapter {
        fn generate(
            &self,
            _model: &ModelDef,
            _api_key: Option<&str>,
            prompt: &PromptRequest,
        ) -> Result<LlmGeneration, ExtractionError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            Ok(LlmGeneration {
                response: self.reply.clone(),
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 40,
                },
            })
        }

        fn can_handle(&self, _model: &ModelDef) -> bool {
            true
        }

        fn provider_name(&self) -> &'static str {
            "canned"
        }
    }

    struct RecordingObserver(Mutex<Vec<(ExtractionStage, u8)>>);

    impl ProgressObserver for RecordingObserver {
        fn on_progress(&self, stage: ExtractionStage, percent: u8, _message: &str) {
            self.0.lock().unwrap().push((stage, percent));
        }
    }

    #[test]
    fn preamble_is_stripped_up_to_first_question() {
        let text = "सूचना: सर्व प्रश्न सोडवा.\nवेळ 1.5 तास\n1. पहिला प्रश्न\n2. दुसरा";
        assert_eq!(strip_instructions_preamble(text), "1. पहिला प्रश्न\n2. दुसरा");

        let devanagari = "सूचना\n१. पहिला प्रश्न";
        assert_eq!(strip_instructions_preamble(devanagari), "१. पहिला प्रश्न");

        assert_eq!(strip_instructions_preamble("no numbering"), "no numbering");
    }

    #[test]
    fn option_labels_are_stripped() {
        assert_eq!(strip_option_label("(1) मुंबई"), "मुंबई");
        assert_eq!(strip_option_label("B) Delhi"), "Delhi");
        assert_eq!(strip_option_label("क) पुणे"), "पुणे");
        assert_eq!(strip_option_label("(४) नाशिक"), "नाशिक");
        assert_eq!(strip_option_label("1.5 cm"), "1.5 cm");
        assert_eq!(strip_option_label("Apple"), "Apple");
    }

    #[test]
    fn response_with_fences_and_prose_is_accepted() {
        let raw = "Here you go:\n```json\n{\"questions\":[{\"questionTextMr\":\"प्रश्न\"}],\"metadata\":{\"language\":\"mr\"}}\n```";
        let response = parse_model_response(raw).unwrap();
        assert_eq!(response.questions.len(), 1);
        assert_eq!(response.metadata.unwrap()["language"], "mr");
    }

    #[test]
    fn non_json_response_is_malformed() {
        assert!(matches!(
            parse_model_response("Sorry, I cannot help with that."),
            Err(ExtractionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_model_response("{\"items\": []}"),
            Err(ExtractionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn entries_are_coerced_into_questions() {
        let entry: AiQuestion = serde_json::from_value(serde_json::json!({
            "questionNumber": "4",
            "questionTextMr": "भारताची राजधानी कोणती?",
            "options": ["(1) मुंबई", "(2) दिल्ली", {"text": "(3) पुणे"}, "(4) नागपूर"],
            "correctAnswer": "(2)",
            "questionType": "mcq_single",
            "difficulty": "EASY",
            "marks": "2"
        }))
        .unwrap();
        let question = into_parsed_question(entry, 0);

        assert_eq!(question.question_number, 4);
        assert_eq!(question.options, vec!["मुंबई", "दिल्ली", "पुणे", "नागपूर"]);
        assert_eq!(question.correct_answer, Some(1));
        assert_eq!(question.difficulty, Difficulty::Easy);
        assert_eq!(question.marks, 2);
        assert_eq!(question.parsing_errors, None);
    }

    #[test]
    fn uninterpretable_answer_is_recorded_not_fatal() {
        let entry: AiQuestion = serde_json::from_value(serde_json::json!({
            "questionTextEn": "Which is prime?",
            "options": ["4", "6", "7", "9"],
            "correctAnswer": "seven",
            "questionType": "riddle"
        }))
        .unwrap();
        let question = into_parsed_question(entry, 2);

        assert_eq!(question.question_number, 3);
        assert_eq!(question.question_text_mr, "Which is prime?");
        assert_eq!(question.correct_answer, None);
        assert_eq!(question.question_type, QuestionType::McqSingle);
        assert_eq!(question.error_count(), 2);
    }

    #[test]
    fn oversized_numbers_are_recorded_not_wrapped() {
        let entry: AiQuestion = serde_json::from_value(serde_json::json!({
            "questionNumber": 4_294_967_297u64,
            "questionTextMr": "प्रश्न",
            "options": ["a", "b", "c", "d"],
            "marks": 4_294_967_298u64
        }))
        .unwrap();
        let question = into_parsed_question(entry, 1);

        assert_eq!(question.question_number, 2);
        assert_eq!(question.marks, 0);
        assert_eq!(
            question.parsing_errors,
            Some(vec![
                "Question number 4294967297 is out of range, numbered by position".to_string(),
                "Marks 4294967298 is out of range, using the default".to_string(),
            ])
        );
    }

    #[test]
    fn unknown_model_fails_before_calling_the_adapter() {
        let catalog = ModelCatalog::fallback_catalog();
        let adapter = CannedAdapter::new("{}");
        let credentials = StaticCredentials::new();
        let extractor = AiExtractor::new(&catalog, &credentials, &adapter, 1_024);

        let err = extractor
            .extract(
                AiExtractionInput {
                    model_id: "gpt-99",
                    paper_text: "1. प्रश्न",
                    answer_key_text: None,
                    scholarship_mode: true,
                },
                &super::super::NoopProgress,
            )
            .unwrap_err();

        match err {
            Error::Validation(msg) => {
                assert!(msg.contains("gpt-99"));
                assert!(msg.contains("gemini-2.0-flash"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(adapter.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_credential_is_an_extraction_error() {
        let catalog = ModelCatalog::fallback_catalog();
        let adapter = CannedAdapter::new("{}");
        let credentials = StaticCredentials::new();
        let extractor = AiExtractor::new(&catalog, &credentials, &adapter, 1_024);

        let err = extractor
            .extract(
                AiExtractionInput {
                    model_id: "gpt-4o-mini",
                    paper_text: "1. प्रश्न",
                    answer_key_text: None,
                    scholarship_mode: false,
                },
                &super::super::NoopProgress,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Extraction(ExtractionError::MissingCredential { .. })
        ));
    }

    #[test]
    fn extraction_reports_progress_and_diagnostics() {
        let catalog = ModelCatalog::fallback_catalog();
        let adapter = CannedAdapter::new(
            r#"{"questions":[
                {"questionNumber":1,"questionTextMr":"पहिला","options":["अ","ब","क","ड"],"correctAnswer":0},
                {"questionNumber":2,"questionTextMr":"  ","options":[]}
            ],"metadata":{"totalQuestions":2}}"#,
        );
        let credentials = StaticCredentials::new().with_key(ApiKeyProvider::Google, "AIza-test");
        let extractor = AiExtractor::new(&catalog, &credentials, &adapter, 1_024);
        let observer = RecordingObserver(Mutex::new(Vec::new()));

        let output = extractor
            .extract(
                AiExtractionInput {
                    model_id: "gemini-2.0-flash",
                    paper_text: "शिष्यवृत्ती परीक्षा सूचना\n1. पहिला\n(1) अ (2) ब (3) क (4) ड",
                    answer_key_text: None,
                    scholarship_mode: true,
                },
                &observer,
            )
            .unwrap();

        assert_eq!(output.questions.len(), 1);
        assert_eq!(output.diagnostics.raw_count, 2);
        assert_eq!(output.diagnostics.dropped_count, 1);
        assert_eq!(output.diagnostics.prompt_tokens, Some(100));
        assert_eq!(output.ai_metadata.unwrap()["totalQuestions"], 2);

        let stages = observer.0.lock().unwrap();
        assert_eq!(stages.first(), Some(&(ExtractionStage::Validating, 5)));
        assert_eq!(stages.last(), Some(&(ExtractionStage::Completed, 100)));

        let prompts = adapter.prompts.lock().unwrap();
        assert!(!prompts[0].user.contains("परीक्षा सूचना"));
        assert!(prompts[0].user.contains("1. पहिला"));
    }
}
