//! Page-window arithmetic and result envelope primitives.
//!
//! This crate is deliberately free of any storage dependency: it turns loose
//! caller input (page number, page size) into a concrete read window and
//! wraps the rows a store returns in a [`Page`] envelope with totals.
//!
//! Input handling is forgiving by contract: page and limit arrive as
//! arbitrary JSON values (numbers, numeric strings, or garbage) and anything
//! that does not parse silently becomes the default. Malformed pagination
//! input is never an error.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use pagination::{Page, PageParams, DEFAULT_MAX_LIMIT};
//!
//! let params = PageParams::resolve(
//!     Some(&json!(1000)),
//!     Some(&json!(10)),
//!     DEFAULT_MAX_LIMIT,
//! );
//! // 25 matching records: the overshooting page clamps to the last one.
//! let window = params.window(25);
//! assert_eq!(window.total_pages, 3);
//! assert_eq!(window.page, 3);
//! assert_eq!(window.skip, 20);
//!
//! let page = Page::from_window(vec!["row"; 5], &window);
//! assert_eq!(page.total_items, 25);
//! assert_eq!(page.page, 3);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page requested when the caller supplies none.
pub const DEFAULT_PAGE: u64 = 1;
/// Rows per page when the caller supplies no limit.
pub const DEFAULT_LIMIT: u64 = 10;
/// Upper bound applied to caller-supplied limits unless overridden.
pub const DEFAULT_MAX_LIMIT: u64 = 100;

/// Resolved pagination parameters: a page number (>= 1) and a row limit
/// already clamped to the caller's maximum.
///
/// A limit of zero is legal and means "metadata only": the window selects no
/// rows but totals are still computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    page: u64,
    limit: u64,
}

impl PageParams {
    /// Resolve parameters from loose JSON input.
    ///
    /// Numbers and numeric strings are accepted; fractional values truncate
    /// toward zero and negative values coerce to zero (after which the page
    /// is floored at 1). Anything else falls back to [`DEFAULT_PAGE`] /
    /// [`DEFAULT_LIMIT`]. The limit is then capped at `max_limit`.
    #[must_use]
    pub fn resolve(page: Option<&Value>, limit: Option<&Value>, max_limit: u64) -> Self {
        let page = coerce(page, DEFAULT_PAGE).max(1);
        let limit = coerce(limit, DEFAULT_LIMIT).min(max_limit);
        Self { page, limit }
    }

    /// Build parameters from already-validated numbers.
    ///
    /// The page is floored at 1; the limit is taken as-is.
    #[must_use]
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit,
        }
    }

    /// Requested page number, always >= 1.
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Row limit after clamping.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Rows to skip before the requested page, ignoring totals.
    #[must_use]
    pub const fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Fix the read window against the total number of matching rows.
    ///
    /// A page beyond the last one clamps down to it, and the skip is
    /// recomputed from the clamped page, so the window always addresses real
    /// rows (the last page) rather than an empty overshoot.
    #[must_use]
    pub fn window(&self, total_items: u64) -> PageWindow {
        let total_pages = total_pages(total_items, self.limit);
        let page = self.page.min(total_pages);
        PageWindow {
            page,
            skip: (page - 1).saturating_mul(self.limit),
            limit: self.limit,
            total_pages,
            total_items,
        }
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// A concrete read window: which rows to fetch and the totals already known
/// at the time the window was fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Effective page number after clamping to `total_pages`.
    pub page: u64,
    /// Rows to skip before reading.
    pub skip: u64,
    /// Maximum rows to read; zero reads nothing.
    pub limit: u64,
    /// Total pages, never below 1 (an empty match set is one empty page).
    pub total_pages: u64,
    /// Total matching rows irrespective of the window.
    pub total_items: u64,
}

/// One page of results plus the metadata callers need to render pagers.
///
/// `count` duplicates `total_items`; both names are part of the historical
/// envelope contract and always carry the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows of the requested window, at most `limit` of them.
    pub rows: Vec<T>,
    /// Total matching rows (legacy alias of `total_items`).
    pub count: u64,
    /// Total matching rows irrespective of the window.
    pub total_items: u64,
    /// Total pages, never below 1.
    pub total_pages: u64,
    /// Limit the window was read with.
    pub limit: u64,
    /// Page the rows belong to, after clamping.
    pub page: u64,
}

impl<T> Page<T> {
    /// Assemble the envelope from fetched rows and the window they came from.
    #[must_use]
    pub fn from_window(rows: Vec<T>, window: &PageWindow) -> Self {
        Self {
            rows,
            count: window.total_items,
            total_items: window.total_items,
            total_pages: window.total_pages,
            limit: window.limit,
            page: window.page,
        }
    }
}

/// Total pages for a match count and limit: `ceil(total/limit)` floored at 1.
/// A zero limit yields a single metadata-only page.
const fn total_pages(total_items: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 1;
    }
    let pages = total_items.div_ceil(limit);
    if pages == 0 { 1 } else { pages }
}

fn coerce(value: Option<&Value>, default: u64) -> u64 {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| {
                // Negative integers coerce to zero, matching the floor the
                // resolved parameters apply anyway.
                number.as_i64().map(|_| 0)
            })
            .or_else(|| number.as_f64().and_then(coerce_float))
            .unwrap_or(default),
        Some(Value::String(raw)) => coerce_str(raw, default),
        Some(_) => default,
    }
}

fn coerce_str(raw: &str, default: u64) -> u64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return value;
    }
    if trimmed.parse::<i64>().is_ok() {
        return 0;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(coerce_float)
        .unwrap_or(default)
}

fn coerce_float(value: f64) -> Option<u64> {
    if !value.is_finite() {
        return None;
    }
    if value <= 0.0 {
        return Some(0);
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "non-finite and negative values are handled above; truncation toward zero is the documented coercion"
    )]
    Some(value.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::missing(None, 10, 10)]
    #[case::null(Some(json!(null)), 10, 10)]
    #[case::integer(Some(json!(25)), 10, 25)]
    #[case::zero(Some(json!(0)), 10, 0)]
    #[case::negative(Some(json!(-3)), 10, 0)]
    #[case::fractional(Some(json!(3.9)), 10, 3)]
    #[case::numeric_string(Some(json!("42")), 10, 42)]
    #[case::padded_string(Some(json!(" 7 ")), 10, 7)]
    #[case::negative_string(Some(json!("-5")), 10, 0)]
    #[case::garbage_string(Some(json!("abc")), 10, 10)]
    #[case::partial_string(Some(json!("12px")), 10, 10)]
    #[case::boolean(Some(json!(true)), 10, 10)]
    #[case::object(Some(json!({"page": 2})), 10, 10)]
    fn coerce_handles_loose_input(
        #[case] value: Option<Value>,
        #[case] default: u64,
        #[case] expected: u64,
    ) {
        assert_eq!(coerce(value.as_ref(), default), expected);
    }

    #[rstest]
    fn resolve_applies_defaults_when_absent() {
        let params = PageParams::resolve(None, None, DEFAULT_MAX_LIMIT);
        assert_eq!(params.page(), DEFAULT_PAGE);
        assert_eq!(params.limit(), DEFAULT_LIMIT);
    }

    #[rstest]
    fn resolve_treats_garbage_page_as_first_page() {
        let loose = PageParams::resolve(Some(&json!("abc")), Some(&json!(10)), DEFAULT_MAX_LIMIT);
        let explicit = PageParams::resolve(Some(&json!(1)), Some(&json!(10)), DEFAULT_MAX_LIMIT);
        assert_eq!(loose, explicit);
    }

    #[rstest]
    fn resolve_floors_page_at_one() {
        let params = PageParams::resolve(Some(&json!(0)), None, DEFAULT_MAX_LIMIT);
        assert_eq!(params.page(), 1);
    }

    #[rstest]
    #[case::within_bounds(50, 50)]
    #[case::at_bound(100, 100)]
    #[case::over_bound(1000, 100)]
    fn resolve_clamps_limit_to_maximum(#[case] requested: u64, #[case] expected: u64) {
        let params = PageParams::resolve(None, Some(&json!(requested)), DEFAULT_MAX_LIMIT);
        assert_eq!(params.limit(), expected);
    }

    #[rstest]
    fn resolve_honours_caller_maximum() {
        let params = PageParams::resolve(None, Some(&json!(30)), 20);
        assert_eq!(params.limit(), 20);
    }

    #[rstest]
    fn skip_addresses_the_requested_page() {
        let params = PageParams::new(3, 10);
        assert_eq!(params.skip(), 20);
    }

    #[rstest]
    #[case::empty_set(0, 10, 1)]
    #[case::exact_fit(30, 10, 3)]
    #[case::partial_last_page(25, 10, 3)]
    #[case::single_row(1, 10, 1)]
    #[case::zero_limit(25, 0, 1)]
    fn window_computes_total_pages(
        #[case] total_items: u64,
        #[case] limit: u64,
        #[case] expected_pages: u64,
    ) {
        let window = PageParams::new(1, limit).window(total_items);
        assert_eq!(window.total_pages, expected_pages);
    }

    #[rstest]
    fn window_clamps_overshooting_page_and_recomputes_skip() {
        let window = PageParams::new(1000, 10).window(25);
        assert_eq!(window.page, 3);
        assert_eq!(window.skip, 20);
        assert_eq!(window.limit, 10);
        assert_eq!(window.total_items, 25);
    }

    #[rstest]
    fn window_with_zero_limit_reads_nothing() {
        let window = PageParams::new(1, 0).window(25);
        assert_eq!(window.page, 1);
        assert_eq!(window.skip, 0);
        assert_eq!(window.limit, 0);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.total_items, 25);
    }

    #[rstest]
    fn envelope_mirrors_window_totals() {
        let window = PageParams::new(2, 10).window(25);
        let page = Page::from_window(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &window);
        assert_eq!(page.count, 25);
        assert_eq!(page.total_items, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.limit, 10);
        assert_eq!(page.page, 2);
    }

    #[rstest]
    fn envelope_serialises_camel_case() {
        let window = PageParams::new(1, 10).window(2);
        let page = Page::from_window(vec!["a", "b"], &window);
        let value = serde_json::to_value(&page).expect("envelope serialises");
        assert_eq!(
            value,
            json!({
                "rows": ["a", "b"],
                "count": 2,
                "totalItems": 2,
                "totalPages": 1,
                "limit": 10,
                "page": 1,
            })
        );
    }
}
