// Prompt templates for AI extraction

use crate::model_adapters::PromptRequest;

pub const SYSTEM_INSTRUCTION: &str = r#"You extract exam questions from text copied out of a PDF question paper.

Return ONLY a JSON object of this shape, with no prose and no markdown fences:
{
  "questions": [
    {
      "questionNumber": 1,
      "questionTextMr": "question text in Marathi (or the paper's language)",
      "questionTextEn": "English text if the paper also has it, else omit",
      "options": ["first option", "second option", "third option", "fourth option"],
      "correctAnswer": 0,
      "correctAnswers": [0, 2],
      "questionType": "mcq_single",
      "difficulty": "medium",
      "marks": 2,
      "section": "section heading if any",
      "classLevel": "class level if stated"
    }
  ],
  "metadata": {
    "examTitle": "title if present",
    "totalQuestions": 0,
    "language": "mr"
  }
}

Rules:
- Keep question and option text exactly as written, including Devanagari characters and mathematical symbols.
- Remove option labels such as (1) (2) (3) (4), A) B) C) D) or क) ख) ग) घ) from option text.
- Always give exactly four options for multiple-choice questions, in paper order.
- correctAnswer is a zero-based index into options. Omit it when the answer is not known.
- Use correctAnswers only for questions with more than one correct option.
- questionType is one of: mcq_single, mcq_two, mcq_three, mcq_multiple, true_false, fill_blank, match, short_answer, long_answer, programming.
- difficulty is one of: easy, medium, hard.
- Skip instructions, headers, footers and page numbers. Do not invent questions."#;

pub const SCHOLARSHIP_GUIDANCE: &str = r#"This is a Maharashtra scholarship examination paper (इयत्ता ५ वी / ८ वी शिष्यवृत्ती परीक्षा).
Questions are numbered 1., 2., ... or १., २., ... and options are labelled (1) to (4).
Every question is mcq_single worth 2 marks unless the paper says otherwise.
Some questions ask which statement or option is NOT correct; keep that wording.

Example input:
1. खालीलपैकी कोणती संख्या सम आहे?
(1) 15 (2) 27 (3) 42 (4) 33
2. 'सूर्य' या शब्दाचा समानार्थी शब्द कोणता?
(1) चंद्र
(2) रवी
(3) तारा
(4) आकाश

Example output:
{"questions":[{"questionNumber":1,"questionTextMr":"खालीलपैकी कोणती संख्या सम आहे?","options":["15","27","42","33"],"correctAnswer":2,"questionType":"mcq_single","difficulty":"easy","marks":2},{"questionNumber":2,"questionTextMr":"'सूर्य' या शब्दाचा समानार्थी शब्द कोणता?","options":["चंद्र","रवी","तारा","आकाश"],"correctAnswer":1,"questionType":"mcq_single","difficulty":"easy","marks":2}],"metadata":{"totalQuestions":2,"language":"mr"}}"#;

pub fn build_prompt(
    paper_text: &str,
    answer_key_text: Option<&str>,
    scholarship_mode: bool,
    max_output_tokens: u32,
) -> PromptRequest {
    let mut user = String::new();

    if scholarship_mode {
        user.push_str(SCHOLARSHIP_GUIDANCE);
        user.push_str("\n\n");
    }

    user.push_str("QUESTION PAPER TEXT:\n<<<\n");
    user.push_str(paper_text.trim());
    user.push_str("\n>>>\n");

    if let Some(key) = answer_key_text.map(str::trim).filter(|k| !k.is_empty()) {
        user.push_str(
            "\nANSWER KEY TEXT (use it to fill correctAnswer for every question it covers):\n<<<\n",
        );
        user.push_str(key);
        user.push_str("\n>>>\n");
    }

    PromptRequest {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
        max_output_tokens,
    }
}
