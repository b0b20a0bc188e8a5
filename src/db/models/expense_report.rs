use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::submission::{ReviewState, Submission, SubmissionKind};

/// Activity expense report (SPJ).
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct ExpenseReport {
    pub id: i32,
    pub user_id: Option<i32>,
    pub pic_id: Option<i32>,
    pub activity: String,
    #[schema(value_type = String, example = "350000.00")]
    pub amount: BigDecimal,
    pub report_date: NaiveDate,
    #[serde(skip_serializing)]
    pub attachment_path: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ReviewState,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Submission for ExpenseReport {
    const KIND: SubmissionKind = SubmissionKind::ExpenseReport;

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
pub struct ExpenseReportForm {
    pub pic_id: i32,
    pub activity: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub report_date: NaiveDate,
}
