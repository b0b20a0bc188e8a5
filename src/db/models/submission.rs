use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow};
use utoipa::ToSchema;

use crate::workflow::visibility::ActionFlags;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, ToSchema)]
#[sqlx(type_name = "submission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Completed => "completed",
        }
    }
}

/// The six request types employees can submit.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    AtkRequest,
    InventoryLoan,
    Invoice,
    LetterNumber,
    AssignmentLetter,
    ExpenseReport,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 6] = [
        SubmissionKind::AtkRequest,
        SubmissionKind::InventoryLoan,
        SubmissionKind::Invoice,
        SubmissionKind::LetterNumber,
        SubmissionKind::AssignmentLetter,
        SubmissionKind::ExpenseReport,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            SubmissionKind::AtkRequest => "atk_requests",
            SubmissionKind::InventoryLoan => "inventory_loans",
            SubmissionKind::Invoice => "invoices",
            SubmissionKind::LetterNumber => "letter_numbers",
            SubmissionKind::AssignmentLetter => "assignment_letters",
            SubmissionKind::ExpenseReport => "expense_reports",
        }
    }

    /// Route prefix, e.g. `/atk-requests`.
    pub fn resource(&self) -> &'static str {
        match self {
            SubmissionKind::AtkRequest => "/atk-requests",
            SubmissionKind::InventoryLoan => "/inventory-loans",
            SubmissionKind::Invoice => "/invoices",
            SubmissionKind::LetterNumber => "/letter-numbers",
            SubmissionKind::AssignmentLetter => "/assignment-letters",
            SubmissionKind::ExpenseReport => "/expense-reports",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionKind::AtkRequest => "ATK request",
            SubmissionKind::InventoryLoan => "Inventory loan",
            SubmissionKind::Invoice => "Invoice",
            SubmissionKind::LetterNumber => "Letter number request",
            SubmissionKind::AssignmentLetter => "Assignment letter",
            SubmissionKind::ExpenseReport => "Expense report",
        }
    }

    /// Only stationery requests and loans can be marked done.
    pub fn supports_completion(&self) -> bool {
        matches!(self, SubmissionKind::AtkRequest | SubmissionKind::InventoryLoan)
    }

    pub fn supports_attachment(&self) -> bool {
        matches!(
            self,
            SubmissionKind::Invoice | SubmissionKind::AssignmentLetter | SubmissionKind::ExpenseReport
        )
    }
}

/// Review columns shared by every submission table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, FromRow, ToSchema)]
pub struct ReviewState {
    pub status: SubmissionStatus,
    /// Manager note, set on rejection
    pub note: Option<String>,
    pub processed_by: Option<i32>,
    pub processed_at: Option<NaiveDateTime>,
    /// Only stored for kinds that can be completed
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

impl ReviewState {
    pub fn pending() -> Self {
        ReviewState {
            status: SubmissionStatus::Pending,
            note: None,
            processed_by: None,
            processed_at: None,
            completed_at: None,
        }
    }
}

/// A persisted record that goes through the review lifecycle.
pub trait Submission:
    for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + 'static
{
    const KIND: SubmissionKind;

    fn id(&self) -> i32;
    fn owner_id(&self) -> Option<i32>;
    fn review(&self) -> &ReviewState;

    fn attachment_path(&self) -> Option<&str> {
        None
    }

    /// Letter-number request this record refers to, if any.
    fn referenced_letter(&self) -> Option<i32> {
        None
    }

    /// Derived display number, for kinds that have one.
    fn display_number(&self) -> Option<String> {
        None
    }
}

/// Record as handed to clients: the row plus names and per-actor action flags.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionView<T> {
    #[serde(flatten)]
    pub record: T,
    pub owner_name: Option<String>,
    pub processor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<bool>,
    pub flags: ActionFlags,
}

/// Body of `POST /{resource}/{id}/reject`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectPayload {
    pub note: String,
}

/// Fields needed to render a referenced letter number.
#[derive(Debug, Clone, FromRow)]
pub struct LetterNumberRef {
    pub id: i32,
    pub purpose: String,
    pub submitted_on: NaiveDate,
}
