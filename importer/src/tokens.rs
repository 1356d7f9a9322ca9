use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

use crate::model_adapters::PromptRequest;
use crate::model_catalog::ModelDef;
use crate::question_import::extractors::ExtractionError;

static BPE: Lazy<Option<CoreBPE>> = Lazy::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(err) => {
        warn!("tokenizer unavailable, falling back to character estimate: {err}");
        None
    }
});

/// cl100k token count. Providers tokenize differently, so this is an estimate.
pub fn estimate_tokens(text: &str) -> usize {
    match BPE.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.chars().count() / 2 + 1,
    }
}

/// Estimates the prompt size and rejects it when prompt plus requested output would
/// not fit the model's context window. Models without a window are not checked.
pub fn check_prompt_budget(
    model: &ModelDef,
    prompt: &PromptRequest,
) -> Result<usize, ExtractionError> {
    let estimated = estimate_tokens(&prompt.full_text());
    if let Some(window) = model.context_window {
        let reserved = model
            .max_output_tokens
            .unwrap_or(prompt.max_output_tokens)
            .min(prompt.max_output_tokens) as usize;
        let limit = (window as usize).saturating_sub(reserved);
        if estimated > limit {
            return Err(ExtractionError::PromptTooLarge {
                model_id: model.id.clone(),
                estimated,
                limit,
            });
        }
    }
    Ok(estimated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(context_window: Option<u32>) -> ModelDef {
        ModelDef {
            id: "small".to_string(),
            provider: "openai".to_string(),
            display_name: "Small".to_string(),
            api_name: None,
            description: String::new(),
            enabled: true,
            context_window,
            max_output_tokens: Some(100),
            requires_api_key: true,
        }
    }

    fn prompt(user: String) -> PromptRequest {
        PromptRequest {
            system: "Extract questions.".to_string(),
            user,
            max_output_tokens: 1_000,
        }
    }

    #[test]
    fn estimates_grow_with_text() {
        let short = estimate_tokens("1. What is 2+2?");
        let long = estimate_tokens(&"1. What is 2+2? ".repeat(50));
        assert!(short > 0);
        assert!(long > short * 10);
    }

    #[test]
    fn prompt_within_window_passes() {
        let estimated = check_prompt_budget(&model(Some(4_096)), &prompt("प्रश्न".into())).unwrap();
        assert!(estimated > 0);
    }

    #[test]
    fn oversized_prompt_is_rejected() {
        let err = check_prompt_budget(&model(Some(200)), &prompt("word ".repeat(500))).unwrap_err();
        match err {
            ExtractionError::PromptTooLarge { limit, estimated, .. } => {
                assert_eq!(limit, 100);
                assert!(estimated > limit);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn models_without_window_are_unchecked() {
        assert!(check_prompt_budget(&model(None), &prompt("word ".repeat(5_000))).is_ok());
    }
}
