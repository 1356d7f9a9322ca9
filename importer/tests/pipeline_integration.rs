// End-to-end spreadsheet import against an on-disk store
use stackhub_import::api::{self, ReviewSubmission};
use stackhub_import::api_keys::StaticCredentials;
use stackhub_import::model_adapters::ModelDispatcher;
use stackhub_import::orchestrator::{ImportPipeline, SpreadsheetImportRequest};
use stackhub_import::question_import::UploadedFile;
use stackhub_import::{store, ActorContext, BatchManager, BatchStatus, ImportConfig, ModelCatalog, Role};

const SHEET: &str = "\
Question Number,Question (Marathi),Question (English),Options,Correct Answer,Marks,Difficulty,Type
1,भारताची राजधानी कोणती?,What is the capital of India?,A) मुंबई | B) दिल्ली | C) पुणे | D) नागपूर,B,2,easy,mcq_single
2,,,,,,,
3,सम संख्या निवडा,Pick the even numbers,(1) 2 | (2) 3 | (3) 4 | (4) 5,,1,hard,mcq_two
";

fn pipeline(db_path: &std::path::Path) -> ImportPipeline {
    let pool = store::open_pool(db_path).expect("store opens");
    let config = ImportConfig::default();
    let catalog = ModelCatalog::fallback_catalog();
    let adapter = ModelDispatcher::new(&catalog, config.ai.request_timeout_secs);
    let batches = BatchManager::new(pool, &config);
    ImportPipeline::new(
        config,
        catalog,
        Box::new(StaticCredentials::new()),
        Box::new(adapter),
        batches,
    )
}

#[test]
fn spreadsheet_import_survives_reopening_the_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("imports.sqlite");
    let actor = ActorContext::new("teacher-7", Role::Teacher);

    let batch_id = {
        let pipeline = pipeline(&db_path);
        let response = api::import_spreadsheet(
            &pipeline,
            SpreadsheetImportRequest {
                file: UploadedFile::new("gk.csv", "text/csv", SHEET.as_bytes().to_vec()),
                subject_slug: "general-knowledge".to_string(),
                batch_name: Some("GK week 3".to_string()),
            },
            &actor,
        )
        .expect("import succeeds");

        assert_eq!(response.batch_name, "GK week 3");
        assert_eq!(response.questions_count, 2);
        let capital = &response.questions[0];
        assert_eq!(capital.options, vec!["मुंबई", "दिल्ली", "पुणे", "नागपूर"]);
        assert_eq!(capital.correct_answer, Some(1));
        assert_eq!(capital.question_text_en.as_deref(), Some("What is the capital of India?"));

        let evens = &response.questions[1];
        assert_eq!(evens.question_number, 3);
        assert_eq!(evens.options, vec!["2", "3", "4", "5"]);
        assert_eq!(evens.correct_answers, None);

        let metadata = response.metadata.expect("metadata");
        assert_eq!(metadata.diagnostics.raw_count, 3);
        assert_eq!(metadata.diagnostics.dropped_count, 1);
        response.batch_id
    };

    let pipeline = pipeline(&db_path);
    let stored = api::get_batch(&pipeline, &batch_id, &actor).expect("batch persisted");
    assert_eq!(stored.status, BatchStatus::Draft);

    let mut questions = stored.parsed_questions.clone();
    questions[1].correct_answers = Some(vec![0, 2]);
    let review = api::save_review(
        &pipeline,
        ReviewSubmission {
            batch_id: batch_id.clone(),
            questions,
            batch_name: None,
        },
        &actor,
    )
    .expect("review saved");
    assert_eq!(review.status, BatchStatus::Reviewed);

    let summaries = api::list_batches(&pipeline, Some("general-knowledge")).expect("list");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].questions_count, 2);
    assert_eq!(summaries[0].batch_name, "GK week 3");
}
