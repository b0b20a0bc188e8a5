use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::submission::{ReviewState, Submission, SubmissionKind};
use crate::utils::letter_number::format_letter_number;

/// Request for an official letter number (Nomor Surat).
///
/// The number itself is never stored; it is derived from `id`,
/// `submitted_on` and `purpose` each time the record is read.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct LetterNumber {
    pub id: i32,
    pub user_id: Option<i32>,
    pub purpose: String,
    pub recipient: String,
    pub submitted_on: NaiveDate,
    pub description: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ReviewState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission for LetterNumber {
    const KIND: SubmissionKind = SubmissionKind::LetterNumber;

    fn id(&self) -> i32 {
        self.id
    }

    fn owner_id(&self) -> Option<i32> {
        self.user_id
    }

    fn review(&self) -> &ReviewState {
        &self.review
    }

    fn display_number(&self) -> Option<String> {
        Some(format_letter_number(self.id, self.submitted_on, &self.purpose))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LetterNumberForm {
    pub purpose: String,
    pub recipient: String,
    pub submitted_on: NaiveDate,
    pub description: Option<String>,
}
