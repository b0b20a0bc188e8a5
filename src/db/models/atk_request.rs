use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::submission::{ReviewState, Submission, SubmissionKind};

/// Stationery (ATK) purchase request.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct AtkRequest {
    pub id: i32,
    pub user_id: Option<i32>,
    pub item_name: String,
    pub quantity: i32,
    pub unit: String,
    pub reason: Option<String>,
    pub needed_on: Option<NaiveDate>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ReviewState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission for AtkRequest {
    const KIND: SubmissionKind = SubmissionKind::AtkRequest;

    fn id(&self) -> i32 {
        self.id
    }

    fn owner_id(&self) -> Option<i32> {
        self.user_id
    }

    fn review(&self) -> &ReviewState {
        &self.review
    }
}

/// Create and resubmit payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AtkRequestForm {
    pub item_name: String,
    pub quantity: i32,
    pub unit: String,
    pub reason: Option<String>,
    pub needed_on: Option<NaiveDate>,
}
