use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::submission::{ReviewState, Submission, SubmissionKind};

/// Assignment letter (Surat Tugas) request.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct AssignmentLetter {
    pub id: i32,
    pub user_id: Option<i32>,
    /// Person in charge of the assignment
    pub pic_id: Option<i32>,
    pub activity: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing)]
    pub attachment_path: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ReviewState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission for AssignmentLetter {
    const KIND: SubmissionKind = SubmissionKind::AssignmentLetter;

    fn id(&self) -> i32 {
        self.id
    }

    fn owner_id(&self) -> Option<i32> {
        self.user_id
    }

    fn review(&self) -> &ReviewState {
        &self.review
    }

    fn attachment_path(&self) -> Option<&str> {
        self.attachment_path.as_deref()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignmentLetterForm {
    pub pic_id: i32,
    pub activity: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}
