pub mod api_response;
pub mod letter_number;
pub mod pagination;
pub mod storage;
pub mod validation;
