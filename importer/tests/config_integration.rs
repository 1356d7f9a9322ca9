// Integration tests for the shipped config/ files
use stackhub_import::config::ImportConfig;
use stackhub_import::model_catalog::ModelCatalog;
use std::path::PathBuf;

fn config_path(file_name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("..");
    path.push("config");
    path.push(file_name);
    path
}

#[test]
fn test_load_catalog_from_config() {
    let catalog = ModelCatalog::load_from_path(&config_path("model_catalog.toml"))
        .expect("Should load catalog from config/model_catalog.toml");

    assert_eq!(catalog.version(), "1.0.0");
    assert_eq!(catalog.default_model_id(), "gemini-2.0-flash");
    assert_eq!(catalog.hash().len(), 64);

    let sonnet = catalog
        .get_enabled_model("claude-3-5-sonnet")
        .expect("Sonnet should be enabled");
    assert_eq!(sonnet.provider, "anthropic");
    assert_eq!(sonnet.api_name(), "claude-3-5-sonnet-20241022");

    assert!(catalog.get_model("gpt-3.5-turbo").is_some());
    assert!(catalog.get_enabled_model("gpt-3.5-turbo").is_none());
    assert!(!catalog.enabled_model_ids().contains("gpt-3.5-turbo"));
    assert_eq!(
        catalog.api_base_url("openai"),
        Some("https://api.openai.com/v1")
    );
}

#[test]
fn test_catalog_with_unknown_model() {
    let catalog = ModelCatalog::load_from_path(&config_path("model_catalog.toml"))
        .expect("Should load catalog");

    assert!(catalog.get_model("nonexistent-model").is_none());
    assert!(catalog.get_enabled_model("nonexistent-model").is_none());
}

#[test]
fn test_load_import_config() {
    let config = ImportConfig::load_from_path(&config_path("import.toml"))
        .expect("Should load config/import.toml");

    assert_eq!(config.default_pdf_subject, "scholarship");
    assert!(config.is_supported_subject("intelligence-test"));
    assert_eq!(config.default_marks(true), 2);
    assert_eq!(config.default_marks(false), 1);
    assert!(config
        .column_aliases
        .question_text_mr
        .iter()
        .any(|alias| alias == "Question (Marathi)"));
    assert!(config.column_aliases.marks.iter().any(|alias| alias == "गुण"));
}
