pub mod assignment_letter;
pub mod atk_request;
pub mod expense_report;
pub mod inventory_loan;
pub mod invoice;
pub mod letter_number;
pub mod submission;
pub mod user;
