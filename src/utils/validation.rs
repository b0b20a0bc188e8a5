use std::collections::BTreeMap;

use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::json;

use crate::utils::api_response::ApiResponse;

/// Amounts are stored as `NUMERIC(15, 2)`: 13 integer digits, 2 decimals.
const MAX_AMOUNT_EXCLUSIVE: i64 = 10_000_000_000_000;
const AMOUNT_DECIMALS: i64 = 2;

/// Field-level validation messages, keyed by form field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Records `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    /// Required free-text field: non-blank and at most `max` characters.
    pub fn require_text(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.add(field, format!("The {} field is required.", field));
        } else if value.chars().count() > max {
            self.add(field, format!("The {} field must not exceed {} characters.", field, max));
        }
    }

    pub fn optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.add(field, format!("The {} field must not exceed {} characters.", field, max));
            }
        }
    }

    /// Positive money amount that fits the amount columns without rounding.
    pub fn amount(&mut self, field: &str, value: &BigDecimal) {
        if *value <= BigDecimal::from(0) {
            self.add(field, format!("The {} must be greater than 0.", field));
        } else if *value >= BigDecimal::from(MAX_AMOUNT_EXCLUSIVE) {
            self.add(field, format!("The {} must be less than 10,000,000,000,000.", field));
        } else if value.normalized().as_bigint_and_exponent().1 > AMOUNT_DECIMALS {
            self.add(field, format!("The {} must have at most 2 decimal places.", field));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise the 422 response.
    pub fn into_result(self) -> Result<(), ApiResponse<()>> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl From<FieldErrors> for ApiResponse<()> {
    fn from(errors: FieldErrors) -> Self {
        ApiResponse::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "The given data was invalid",
            Some(json!(errors)),
        )
    }
}

/// Trims optional text, mapping blank input to `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_required_field_is_reported() {
        let mut errors = FieldErrors::new();
        errors.require_text("purpose", "   ", 255);
        assert_eq!(errors.get("purpose"), Some("The purpose field is required."));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("quantity", "first");
        errors.add("quantity", "second");
        assert_eq!(errors.get("quantity"), Some("first"));
    }

    #[test]
    fn length_limit_counts_characters() {
        let mut errors = FieldErrors::new();
        errors.require_text("note", &"é".repeat(10), 10);
        assert!(errors.is_empty());
        errors.require_text("note", &"é".repeat(11), 10);
        assert!(!errors.is_empty());
    }

    #[test]
    fn invalid_payload_maps_to_422() {
        let mut errors = FieldErrors::new();
        errors.add("vendor", "The vendor field is required.");
        let response: ApiResponse<()> = errors.into();
        assert_eq!(response.status_code, 422);
        assert_eq!(
            response.errors,
            Some(json!({ "vendor": "The vendor field is required." }))
        );
    }

    fn amount_errors(value: &str) -> Option<String> {
        use std::str::FromStr;
        let mut errors = FieldErrors::new();
        errors.amount("amount", &BigDecimal::from_str(value).unwrap());
        errors.get("amount").map(str::to_string)
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(amount_errors("0").is_some());
        assert!(amount_errors("-1").is_some());
        assert_eq!(amount_errors("0.01"), None);
    }

    #[test]
    fn amount_must_fit_thirteen_integer_digits() {
        assert_eq!(amount_errors("9999999999999.99"), None);
        assert!(amount_errors("10000000000000").unwrap().contains("less than"));
        assert!(amount_errors("1e20").is_some());
    }

    #[test]
    fn amount_allows_two_decimal_places() {
        assert_eq!(amount_errors("12.50"), None);
        assert_eq!(amount_errors("12.5000"), None);
        assert!(amount_errors("12.505").unwrap().contains("decimal places"));
    }

    #[test]
    fn clean_optional_drops_blank_strings() {
        assert_eq!(clean_optional(Some("  ".into())), None);
        assert_eq!(clean_optional(Some(" memo ".into())), Some("memo".into()));
        assert_eq!(clean_optional(None), None);
    }
}
