// Legacy rule-based PDF segmentation. Deterministic and never fails on partial matches;
// fragments it cannot place are left out.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::ExtractionOutput;
use crate::question_import::processors::normalizer::{coerce_answer, normalize_digits};
use crate::question_import::schemas::{ExtractionDiagnostics, ParsedQuestion, QuestionType};

static NUMBERED_QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9०-९]{1,3})\s*[.)](\s*)(.*)$").expect("numbered question regex"));

static PREFIXED_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:प्र(?:श्न)?\s*\.?|Q\s*\.?|Question)\s*([0-9०-९]{1,3})\s*[.):\-]?\s*(.*)$")
        .expect("prefixed question regex")
});

static PAREN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*(?:[1-4१-४]|[A-Da-d]|[कखगघ])\s*\)").expect("parenthesised label regex")
});

static BARE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Da-dकखगघ])\s*[.)]|([1-4१-४])\s*\))\s*(.*)$").expect("bare label regex")
});

static ANSWER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:correct answer|answer|ans|योग्य उत्तर|उत्तर)\s*[:：.\-–]\s*(.+)$")
        .expect("answer line regex")
});

static SECTION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:section|part|विभाग|भाग)(?:\s*[:\-–]\s*|\s+)(\S.*)$").expect("section regex")
});

static ANSWER_KEY_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([0-9०-९]{1,3})\s*[.):\-–]\s*(\(\s*[1-4१-४]\s*\)|(?:[A-Da-d]|[कखगघ]|[1-4१-४])\b)",
    )
    .expect("answer key regex")
});

const MAX_HEADING_CHARS: usize = 60;

/// Answer written the way the paper labels options: bare digits count from 1.
fn paper_answer(raw: &str) -> Option<usize> {
    let token = raw.split_whitespace().next()?;
    let digits = normalize_digits(token);
    match digits.trim_end_matches(['.', ')']).parse::<usize>() {
        Ok(n @ 1..=4) => Some(n - 1),
        Ok(_) => None,
        Err(_) => coerce_answer(token),
    }
}

fn parse_number(raw: &str) -> Option<u32> {
    normalize_digits(raw).parse().ok()
}

/// Maps question numbers to zero-based answers from answer-key text such as
/// `1. B  2 - (3)  3) ग`.
pub fn parse_answer_key(text: &str) -> HashMap<u32, usize> {
    let mut answers = HashMap::new();
    for caps in ANSWER_KEY_ENTRY.captures_iter(text) {
        if let (Some(number), Some(answer)) = (parse_number(&caps[1]), paper_answer(&caps[2])) {
            answers.entry(number).or_insert(answer);
        }
    }
    answers
}

fn question_start(line: &str) -> Option<(u32, &str)> {
    if let Some(caps) = NUMBERED_QUESTION.captures(line) {
        let spaced = !caps[2].is_empty();
        let rest = caps.get(3).map_or("", |m| m.as_str());
        // "1.5 तास" is a decimal, not question 1.
        if spaced || !rest.starts_with(|c: char| c.is_ascii_digit() || ('०'..='९').contains(&c)) {
            return Some((parse_number(&caps[1])?, rest));
        }
    }
    PREFIXED_QUESTION.captures(line).and_then(|caps| {
        let rest = caps.get(2).map_or("", |m| m.as_str());
        Some((parse_number(&caps[1])?, rest))
    })
}

fn append_text(target: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

fn append_continuation(question: &mut ParsedQuestion, text: &str) {
    match question.options.last_mut() {
        Some(option) => append_text(option, text),
        None => append_text(&mut question.question_text_mr, text),
    }
}

/// Consumes option labels on the line, inline `(1) a (2) b` or one bare `A) a` per line.
fn append_options(question: &mut ParsedQuestion, line: &str) -> bool {
    let markers: Vec<_> = PAREN_LABEL.find_iter(line).collect();
    if let Some(first) = markers.first() {
        append_continuation(question, &line[..first.start()]);
        for (i, marker) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map_or(line.len(), |next| next.start());
            question.options.push(line[marker.end()..end].trim().to_string());
        }
        return true;
    }

    if let Some(caps) = BARE_LABEL.captures(line) {
        let index = caps
            .get(1)
            .and_then(|letter| coerce_answer(letter.as_str()))
            .or_else(|| caps.get(2).and_then(|digit| paper_answer(digit.as_str())));
        if index == Some(question.options.len()) {
            question.options.push(caps[3].trim().to_string());
            return true;
        }
    }
    false
}

fn section_heading(line: &str, current: Option<&ParsedQuestion>) -> Option<String> {
    if line.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    if current.is_some_and(|q| q.options.is_empty()) {
        return None;
    }
    SECTION_HEADING
        .captures(line)
        .map(|caps| caps[0].trim().to_string())
}

pub struct LegacyPdfParser;

impl LegacyPdfParser {
    pub fn parse(text: &str, answer_key: Option<&str>) -> ExtractionOutput {
        let mut segments: Vec<ParsedQuestion> = Vec::new();
        let mut current: Option<ParsedQuestion> = None;
        let mut section: Option<String> = None;
        let mut last_number = 0u32;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(question) = current.as_mut() {
                if let Some(caps) = ANSWER_LINE.captures(line) {
                    let raw = caps[1].trim();
                    match paper_answer(raw) {
                        Some(index) => question.correct_answer = Some(index),
                        None => question.record_error(format!("Could not interpret answer '{raw}'")),
                    }
                    continue;
                }
            }

            if let Some(heading) = section_heading(line, current.as_ref()) {
                segments.extend(current.take());
                section = Some(heading);
                continue;
            }

            if let Some(question) = current.as_mut() {
                if append_options(question, line) {
                    continue;
                }
            }

            if let Some((number, rest)) = question_start(line) {
                if number > last_number {
                    segments.extend(current.take());
                    last_number = number;
                    let mut question = ParsedQuestion::new(number);
                    question.section = section.clone();
                    if !append_options(&mut question, rest) {
                        append_continuation(&mut question, rest);
                    }
                    current = Some(question);
                    continue;
                }
            }

            if let Some(question) = current.as_mut() {
                append_continuation(question, line);
            }
        }
        segments.extend(current.take());

        let key = answer_key.map(parse_answer_key).unwrap_or_default();
        let mut answers_from_key = 0;
        let raw_count = segments.len();
        let questions: Vec<ParsedQuestion> = segments
            .into_iter()
            .filter(ParsedQuestion::has_primary_text)
            .map(|mut question| {
                if question.correct_answer.is_none() {
                    if let Some(&index) = key.get(&question.question_number) {
                        question.correct_answer = Some(index);
                        answers_from_key += 1;
                    }
                }
                if question.options.is_empty() {
                    question.question_type = QuestionType::ShortAnswer;
                }
                question
            })
            .collect();

        debug!(
            segments = raw_count,
            kept = questions.len(),
            answers_from_key,
            "legacy segmentation finished"
        );

        ExtractionOutput {
            diagnostics: ExtractionDiagnostics {
                raw_count,
                kept_count: questions.len(),
                dropped_count: raw_count - questions.len(),
                answers_from_key,
                ..Default::default()
            },
            questions,
            ai_metadata: None,
        }
    }
}
