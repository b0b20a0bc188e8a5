use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::submission::SubmissionStatus;

pub const PER_PAGE: i64 = 10;

/// 1-based page from an optional query value; missing or non-positive is page 1.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Row offset of `page`. Saturates for absurd pages, which then read past
/// the end and come back empty.
pub fn page_offset(page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(PER_PAGE)
}

/// Query string accepted by every list endpoint.
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// 1-based page number
    pub page: Option<i64>,
    /// Only return records in this status
    pub status: Option<SubmissionStatus>,
}

impl ListParams {
    pub fn page(&self) -> i64 {
        clamp_page(self.page)
    }

    pub fn offset(&self) -> i64 {
        page_offset(self.page())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, total: i64) -> Self {
        Page {
            items,
            page,
            per_page: PER_PAGE,
            total,
            total_pages: (total + PER_PAGE - 1) / PER_PAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_to_first_and_clamps_below_one() {
        assert_eq!(ListParams::default().page(), 1);
        let params = ListParams { page: Some(-3), status: None };
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn offset_steps_by_ten() {
        let params = ListParams { page: Some(3), status: None };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let params = ListParams { page: Some(i64::MAX), status: None };
        assert_eq!(params.page(), i64::MAX);
        assert_eq!(params.offset(), i64::MAX);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Page::new(Vec::<i32>::new(), 1, 0).total_pages, 0);
        assert_eq!(Page::new(vec![1], 1, 10).total_pages, 1);
        assert_eq!(Page::new(vec![1], 1, 11).total_pages, 2);
    }
}
