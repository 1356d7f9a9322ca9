// Edit rules for import batches: lifecycle state plus ownership
use serde::{Deserialize, Serialize};

use crate::{Error, ImportBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    SchoolAdmin,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "school_admin" => Some(Role::SchoolAdmin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::SchoolAdmin => "school_admin",
        }
    }

    /// Elevated roles may edit batches they did not create.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated caller, as handed over by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ActorContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn may_edit(&self, batch: &ImportBatch) -> bool {
        self.role.is_elevated() || batch.created_by == self.user_id
    }
}

/// A batch may be edited while it is not committed, by its creator or an elevated role.
pub fn enforce_batch_edit(batch: &ImportBatch, actor: &ActorContext) -> Result<(), Error> {
    if !batch.status.is_editable() {
        return Err(Error::conflict(format!(
            "Batch '{}' is {} and can no longer be edited",
            batch.batch_name, batch.status
        )));
    }
    if !actor.may_edit(batch) {
        return Err(Error::conflict(format!(
            "Batch '{}' belongs to another user; only its creator or an admin can edit it",
            batch.batch_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question_import::schemas::{ExtractionMethod, ImportMetadata};
    use crate::BatchStatus;
    use chrono::Utc;

    fn batch(status: BatchStatus) -> ImportBatch {
        let now = Utc::now();
        ImportBatch {
            id: "b1".into(),
            subject_slug: "scholarship".into(),
            batch_name: "Paper".into(),
            status,
            parsed_questions: Vec::new(),
            metadata: ImportMetadata {
                file_name: "paper.csv".into(),
                file_size: 1,
                file_type: "text/csv".into(),
                source_sha256: String::new(),
                answer_key_file_name: None,
                extraction_method: ExtractionMethod::Csv,
                ai_model: None,
                catalog_sha256: None,
                scholarship_mode: false,
                fallback_reason: None,
                diagnostics: Default::default(),
                ai_metadata: None,
                extracted_at: now,
            },
            created_by: "owner".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn roles_parse_with_either_separator() {
        assert_eq!(Role::from_str("school-admin"), Some(Role::SchoolAdmin));
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("student"), None);
    }

    #[test]
    fn creator_and_admin_may_edit() {
        let draft = batch(BatchStatus::Draft);
        assert!(enforce_batch_edit(&draft, &ActorContext::new("owner", Role::Teacher)).is_ok());
        assert!(enforce_batch_edit(&draft, &ActorContext::new("root", Role::Admin)).is_ok());
    }

    #[test]
    fn strangers_and_committed_batches_conflict() {
        let reviewed = batch(BatchStatus::Reviewed);
        let err = enforce_batch_edit(&reviewed, &ActorContext::new("other", Role::SchoolAdmin)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let committed = batch(BatchStatus::Committed);
        let err = enforce_batch_edit(&committed, &ActorContext::new("root", Role::Admin)).unwrap_err();
        assert!(err.to_string().contains("committed"));
    }
}
