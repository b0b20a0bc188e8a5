use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::submission::{ReviewState, Submission, SubmissionKind};

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct Invoice {
    pub id: i32,
    pub user_id: Option<i32>,
    pub vendor: String,
    pub invoice_date: NaiveDate,
    #[schema(value_type = String, example = "1250000.00")]
    pub amount: BigDecimal,
    pub description: Option<String>,
    /// Letter-number request this invoice is filed under
    pub letter_number_id: Option<i32>,
    #[serde(skip_serializing)]
    pub attachment_path: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ReviewState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission for Invoice {
    const KIND: SubmissionKind = SubmissionKind::Invoice;

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

    fn referenced_letter(&self) -> Option<i32> {
        self.letter_number_id
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvoiceForm {
    pub vendor: String,
    pub invoice_date: NaiveDate,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub letter_number_id: Option<i32>,
}
