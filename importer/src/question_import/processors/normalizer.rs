// Normalizer: every strategy's output converges on one canonical question shape

use serde_json::Value;

use crate::question_import::schemas::ParsedQuestion;

pub const OPTION_COUNT: usize = 4;

const MARATHI_OPTION_LETTERS: [char; OPTION_COUNT] = ['क', 'ख', 'ग', 'घ'];

/// Applies option padding, answer range checks, marks defaulting and error cleanup.
/// Running it twice gives the same result as running it once.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    default_marks: u32,
}

impl Normalizer {
    pub fn new(default_marks: u32) -> Self {
        Self {
            default_marks: default_marks.max(1),
        }
    }

    pub fn default_marks(&self) -> u32 {
        self.default_marks
    }

    /// Normalizes every question, dropping those without primary text and numbering
    /// unnumbered ones by position.
    pub fn normalize_all(&self, questions: Vec<ParsedQuestion>) -> Vec<ParsedQuestion> {
        questions
            .into_iter()
            .enumerate()
            .filter(|(_, question)| question.has_primary_text())
            .map(|(index, mut question)| {
                if question.question_number == 0 {
                    question.question_number = index as u32 + 1;
                }
                self.normalize(question)
            })
            .collect()
    }

    pub fn normalize(&self, mut question: ParsedQuestion) -> ParsedQuestion {
        question.question_text_mr = question.question_text_mr.trim().to_string();
        question.question_text_en = non_empty(question.question_text_en.take());
        question.section = non_empty(question.section.take());
        question.class_level = non_empty(question.class_level.take());

        self.normalize_options(&mut question);
        self.normalize_answers(&mut question);

        if question.marks == 0 {
            question.marks = self.default_marks;
        }

        if question
            .parsing_errors
            .as_ref()
            .is_some_and(|errors| errors.is_empty())
        {
            question.parsing_errors = None;
        }
        question
    }

    fn normalize_options(&self, question: &mut ParsedQuestion) {
        for option in question.options.iter_mut() {
            *option = option.trim().to_string();
        }

        let extracted = question.options.len();
        if extracted > OPTION_COUNT {
            let overflow_has_text = question.options[OPTION_COUNT..]
                .iter()
                .any(|o| !o.is_empty());
            question.options.truncate(OPTION_COUNT);
            if overflow_has_text {
                question.record_error(format!(
                    "Expected {OPTION_COUNT} options, found {extracted}; extra options dropped"
                ));
            }
        }

        let kept = question.options.iter().filter(|o| !o.is_empty()).count();
        if question.question_type.is_choice() && kept < OPTION_COUNT {
            question.record_error(format!("Expected {OPTION_COUNT} options, found {kept}"));
        }
        question.options.resize(OPTION_COUNT, String::new());
    }

    fn normalize_answers(&self, question: &mut ParsedQuestion) {
        if let Some(index) = question.correct_answer {
            if index >= OPTION_COUNT {
                question.correct_answer = None;
                question.record_error(format!("Correct answer index {index} is out of range"));
            }
        }

        if let Some(indices) = question.correct_answers.take() {
            let (mut valid, invalid): (Vec<usize>, Vec<usize>) =
                indices.into_iter().partition(|i| *i < OPTION_COUNT);
            for index in invalid {
                question.record_error(format!("Correct answer index {index} is out of range"));
            }
            valid.sort_unstable();
            valid.dedup();
            question.correct_answers = (!valid.is_empty()).then_some(valid);
        }

        if question.question_type.is_multi_answer() {
            if question.correct_answers.is_none() {
                question.correct_answers = question.correct_answer.map(|index| vec![index]);
            }
        } else if question.correct_answer.is_none() {
            question.correct_answer = question
                .correct_answers
                .as_ref()
                .and_then(|indices| indices.first().copied());
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Converts Devanagari digits to ASCII.
pub fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '०'..='९' => char::from(b'0' + (c as u32 - '०' as u32) as u8),
            other => other,
        })
        .collect()
}

/// Maps one answer token to a zero-based option index.
///
/// Bare digits `0`-`3` are zero-based and `4` is one-based; parenthesised `(1)`-`(4)`
/// are one-based; letters `A`-`D` in any case and Marathi `क`/`ख`/`ग`/`घ` map in order.
pub fn coerce_answer(raw: &str) -> Option<usize> {
    let token = normalize_digits(raw.trim());
    let token = strip_option_word(&token);
    let parenthesised = token.starts_with('(') && token.ends_with(')');
    let inner = token
        .trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '.' | ':'))
        .trim();

    let mut chars = inner.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    if let Some(digit) = first.to_digit(10) {
        let digit = digit as usize;
        return match (parenthesised, digit) {
            (true, 1..=4) => Some(digit - 1),
            (false, 0..=3) => Some(digit),
            (false, 4) => Some(3),
            _ => None,
        };
    }
    if let Some(index) = MARATHI_OPTION_LETTERS.iter().position(|c| *c == first) {
        return Some(index);
    }
    match first.to_ascii_uppercase() {
        letter @ 'A'..='D' => Some(letter as usize - 'A' as usize),
        _ => None,
    }
}

fn strip_option_word(token: &str) -> &str {
    let lower = token.to_lowercase();
    for prefix in ["option", "पर्याय"] {
        if lower.starts_with(prefix) {
            if let Some(rest) = token.get(prefix.len()..) {
                return rest.trim();
            }
        }
    }
    token
}

/// Like [`coerce_answer`] but for JSON values; numbers follow the same digit rule.
pub fn coerce_answer_value(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => match n.as_u64()? {
            n @ 0..=3 => Some(n as usize),
            4 => Some(3),
            _ => None,
        },
        Value::String(s) => coerce_answer(s),
        _ => None,
    }
}

/// Coerces a multi-answer value: an array of tokens, or a string such as `"A,C"`,
/// `"1 3"` or `"AC"`. Any unparseable token rejects the whole value.
pub fn coerce_answer_list(value: &Value) -> Option<Vec<usize>> {
    let indices = match value {
        Value::Array(items) => items
            .iter()
            .map(coerce_answer_value)
            .collect::<Option<Vec<_>>>()?,
        Value::String(s) => coerce_answer_text_list(s)?,
        Value::Number(_) => vec![coerce_answer_value(value)?],
        _ => return None,
    };
    (!indices.is_empty()).then_some(indices)
}

pub fn coerce_answer_text_list(raw: &str) -> Option<Vec<usize>> {
    let tokens: Vec<&str> = raw
        .split(|c: char| matches!(c, ',' | ';' | '|' | '&' | '/') || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("and"))
        .collect();

    if tokens.len() == 1 && coerce_answer(tokens[0]).is_none() {
        // Run-together letters such as "AC".
        return tokens[0]
            .chars()
            .map(|c| coerce_answer(&c.to_string()))
            .collect();
    }
    tokens.into_iter().map(coerce_answer).collect()
}

/// Leading-integer parse in the style of `parseInt`: `"3"`, `"3 marks"`, `"३"` all give 3.
/// Zero and non-numeric input give `None`.
pub fn coerce_marks(raw: &str) -> Option<u32> {
    let digits: String = normalize_digits(raw.trim())
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().ok().filter(|marks| *marks > 0)
}

/// Positive count from a JSON number or numeric string, such as marks or a question
/// number. Zero, negatives and non-numeric values give `Ok(None)`; `Err` carries a
/// number too large for `u32`.
pub fn coerce_count_value(value: &Value) -> Result<Option<u32>, u64> {
    match value {
        Value::Number(n) => match n.as_u64() {
            None | Some(0) => Ok(None),
            Some(n) => u32::try_from(n).map(Some).map_err(|_| n),
        },
        Value::String(s) => Ok(coerce_marks(s)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question_import::schemas::{Difficulty, QuestionType};
    use serde_json::json;

    fn question(text: &str, options: &[&str]) -> ParsedQuestion {
        let mut q = ParsedQuestion::new(1);
        q.question_text_mr = text.to_string();
        q.options = options.iter().map(|o| o.to_string()).collect();
        q
    }

    #[test]
    fn answer_tokens_coerce_to_zero_based_indices() {
        assert_eq!(coerce_answer("0"), Some(0));
        assert_eq!(coerce_answer("3"), Some(3));
        assert_eq!(coerce_answer("4"), Some(3));
        assert_eq!(coerce_answer("(1)"), Some(0));
        assert_eq!(coerce_answer("(4)"), Some(3));
        assert_eq!(coerce_answer("b"), Some(1));
        assert_eq!(coerce_answer(" D "), Some(3));
        assert_eq!(coerce_answer("C)"), Some(2));
        assert_eq!(coerce_answer("ग"), Some(2));
        assert_eq!(coerce_answer("(३)"), Some(2));
        assert_eq!(coerce_answer("Option B"), Some(1));

        assert_eq!(coerce_answer("E"), None);
        assert_eq!(coerce_answer("5"), None);
        assert_eq!(coerce_answer("(0)"), None);
        assert_eq!(coerce_answer("maybe"), None);
        assert_eq!(coerce_answer(""), None);
    }

    #[test]
    fn json_answers_coerce() {
        assert_eq!(coerce_answer_value(&json!(2)), Some(2));
        assert_eq!(coerce_answer_value(&json!(7)), None);
        assert_eq!(coerce_answer_value(&json!("A")), Some(0));
        assert_eq!(coerce_answer_value(&json!(null)), None);

        assert_eq!(coerce_answer_list(&json!(["A", "c"])), Some(vec![0, 2]));
        assert_eq!(coerce_answer_list(&json!("A, C")), Some(vec![0, 2]));
        assert_eq!(coerce_answer_list(&json!("BD")), Some(vec![1, 3]));
        assert_eq!(coerce_answer_list(&json!("(1) and (3)")), Some(vec![0, 2]));
        assert_eq!(coerce_answer_list(&json!(["A", "Z"])), None);
        assert_eq!(coerce_answer_list(&json!([])), None);
    }

    #[test]
    fn marks_parse_leading_integer() {
        assert_eq!(coerce_marks("3"), Some(3));
        assert_eq!(coerce_marks(" 2 marks"), Some(2));
        assert_eq!(coerce_marks("२"), Some(2));
        assert_eq!(coerce_marks("0"), None);
        assert_eq!(coerce_marks("two"), None);
        assert_eq!(coerce_marks("-1"), None);
    }

    #[test]
    fn counts_from_json_reject_overflow() {
        assert_eq!(coerce_count_value(&json!(3)), Ok(Some(3)));
        assert_eq!(coerce_count_value(&json!("4 marks")), Ok(Some(4)));
        assert_eq!(coerce_count_value(&json!(0)), Ok(None));
        assert_eq!(coerce_count_value(&json!(-2)), Ok(None));
        assert_eq!(coerce_count_value(&json!(1.5)), Ok(None));
        assert_eq!(coerce_count_value(&json!(null)), Ok(None));
        assert_eq!(
            coerce_count_value(&json!(5_000_000_000u64)),
            Err(5_000_000_000)
        );
    }

    #[test]
    fn options_are_padded_and_short_choice_questions_flagged() {
        let normalizer = Normalizer::new(1);
        let q = normalizer.normalize(question("प्रश्न", &["x", "y"]));

        assert_eq!(q.options, vec!["x", "y", "", ""]);
        assert_eq!(
            q.parsing_errors,
            Some(vec!["Expected 4 options, found 2".to_string()])
        );
        assert_eq!(q.marks, 1);
        assert_eq!(q.difficulty, Difficulty::Medium);
    }

    #[test]
    fn non_choice_questions_are_padded_without_errors() {
        let normalizer = Normalizer::new(2);
        let mut q = question("रिकाम्या जागा भरा", &[]);
        q.question_type = QuestionType::FillBlank;
        let q = normalizer.normalize(q);

        assert_eq!(q.options.len(), OPTION_COUNT);
        assert_eq!(q.parsing_errors, None);
        assert_eq!(q.marks, 2);
    }

    #[test]
    fn extra_options_are_truncated_with_an_error() {
        let normalizer = Normalizer::new(1);
        let q = normalizer.normalize(question("Q", &["a", "b", "c", "d", "e"]));

        assert_eq!(q.options, vec!["a", "b", "c", "d"]);
        assert_eq!(
            q.parsing_errors,
            Some(vec![
                "Expected 4 options, found 5; extra options dropped".to_string()
            ])
        );
    }

    #[test]
    fn truncation_reports_every_extracted_option() {
        let normalizer = Normalizer::new(1);
        let q = normalizer.normalize(question("Q", &["a", "b", "c", "d", "", "f"]));

        assert_eq!(q.options, vec!["a", "b", "c", "d"]);
        assert_eq!(
            q.parsing_errors,
            Some(vec![
                "Expected 4 options, found 6; extra options dropped".to_string()
            ])
        );
    }

    #[test]
    fn trailing_empty_options_are_trimmed_silently() {
        let normalizer = Normalizer::new(1);
        let q = normalizer.normalize(question("Q", &["a", "b", "c", "d", " ", ""]));
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.parsing_errors, None);
    }

    #[test]
    fn out_of_range_answers_are_cleared() {
        let normalizer = Normalizer::new(1);
        let mut q = question("Q", &["a", "b", "c", "d"]);
        q.correct_answer = Some(6);
        let q = normalizer.normalize(q);

        assert_eq!(q.correct_answer, None);
        assert_eq!(
            q.parsing_errors,
            Some(vec!["Correct answer index 6 is out of range".to_string()])
        );
    }

    #[test]
    fn multi_answer_types_carry_an_answer_list() {
        let normalizer = Normalizer::new(1);
        let mut q = question("Q", &["a", "b", "c", "d"]);
        q.question_type = QuestionType::McqTwo;
        q.correct_answers = Some(vec![2, 0, 2]);
        let q = normalizer.normalize(q);
        assert_eq!(q.correct_answers, Some(vec![0, 2]));

        let mut single = question("Q", &["a", "b", "c", "d"]);
        single.question_type = QuestionType::McqMultiple;
        single.correct_answer = Some(1);
        let single = normalizer.normalize(single);
        assert_eq!(single.correct_answers, Some(vec![1]));
    }

    #[test]
    fn normalization_is_idempotent() {
        let normalizer = Normalizer::new(2);
        let mut q = question("  प्रश्न  ", &["x", "y", "z", "w", "v"]);
        q.question_text_en = Some("  ".into());
        q.correct_answers = Some(vec![3, 9]);
        q.section = Some(" भाग 1 ".into());

        let once = normalizer.normalize(q);
        let twice = normalizer.normalize(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.section.as_deref(), Some("भाग 1"));
        assert_eq!(once.question_text_en, None);
        assert_eq!(once.correct_answer, Some(3));
    }

    #[test]
    fn empty_error_list_becomes_absent() {
        let normalizer = Normalizer::new(1);
        let mut q = question("Q", &["a", "b", "c", "d"]);
        q.parsing_errors = Some(Vec::new());
        assert_eq!(normalizer.normalize(q).parsing_errors, None);
    }

    #[test]
    fn normalize_all_drops_rows_without_primary_text_and_numbers_by_position() {
        let normalizer = Normalizer::new(1);
        let mut english_only = ParsedQuestion::new(0);
        english_only.question_text_en = Some("Only English".into());
        let mut second = ParsedQuestion::new(0);
        second.question_text_mr = "दुसरा".into();

        let kept = normalizer.normalize_all(vec![english_only, second]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].question_number, 2);
    }
}
