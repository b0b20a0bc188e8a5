pub mod assignment_letter;
pub mod atk_request;
pub mod auth;
pub mod dashboard;
pub mod expense_report;
pub mod health;
pub mod inventory_loan;
pub mod invoice;
pub mod letter_number;
pub mod user;
