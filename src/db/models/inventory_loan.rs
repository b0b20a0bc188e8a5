use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::submission::{ReviewState, Submission, SubmissionKind};

/// One borrowed item; stored inside the `items` JSONB column.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct LoanItem {
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct InventoryLoan {
    pub id: i32,
    pub user_id: Option<i32>,
    #[schema(value_type = Vec<LoanItem>)]
    pub items: Json<Vec<LoanItem>>,
    pub purpose: String,
    pub loan_date: NaiveDate,
    pub return_date: NaiveDate,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ReviewState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission for InventoryLoan {
    const KIND: SubmissionKind = SubmissionKind::InventoryLoan;

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

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryLoanForm {
    pub items: Vec<LoanItem>,
    pub purpose: String,
    pub loan_date: NaiveDate,
    pub return_date: NaiveDate,
}
