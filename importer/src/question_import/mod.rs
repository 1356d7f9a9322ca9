// Question import: source readers, extraction strategies and the normalizer

pub mod extractors;
pub mod processors;
pub mod readers;
pub mod schemas;

pub use extractors::{ExtractionOutput, ExtractionStrategy};
pub use processors::normalizer::Normalizer;
pub use readers::{SourceContent, SourceFormat, UploadedFile};
pub use schemas::{
    Difficulty, ExtractionDiagnostics, ExtractionMethod, ImportMetadata, ParsedQuestion,
    QuestionType,
};
