//! Pagination extension over document collections.
//!
//! [`Paginate`] is a blanket extension of every [`DocumentCollection`]: it
//! counts the matching documents, fixes the page window against that total
//! (clamping an overshooting page down to the last real one before the
//! read), issues the windowed read, and wraps the rows in the
//! [`Page`] envelope. Failures from the underlying count or read propagate
//! unchanged; malformed page input never fails, it becomes the default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use pagination::{DEFAULT_MAX_LIMIT, Page, PageParams};

use crate::domain::ports::{
    Document, DocumentCollection, Filter, FindOptions, PopulateSpec, SortKey, StorageError,
};

/// Pagination defaults a collection schema can carry, applied when the
/// caller's options leave the corresponding value unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginateDefaults {
    /// Default rows per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Default upper bound on caller-supplied limits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_limit: Option<u64>,
}

impl PaginateDefaults {
    /// No defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default rows per page.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Default upper bound on caller-supplied limits.
    #[must_use]
    pub const fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = Some(max_limit);
        self
    }
}

/// Options for a paginated read.
///
/// `page` and `limit` are loose JSON values on purpose: they typically
/// arrive verbatim from a request payload, and anything non-numeric
/// silently falls back to the defaults (page 1, limit 10).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginateOptions {
    /// Dotted field paths to project; empty selects everything.
    pub select: Vec<String>,
    /// Sort keys applied in order before windowing.
    pub sort: Vec<SortKey>,
    /// Reference fields to resolve, singly or as an ordered sequence.
    pub populate: Option<PopulateSpec>,
    /// Return plain documents without adapter-specific hydration.
    pub lean: bool,
    /// With `lean`, mirror the document identifier into an `id` field.
    /// Defaults to true.
    pub lean_with_id: Option<bool>,
    /// Requested page number as loose input.
    pub page: Option<Value>,
    /// Requested rows per page as loose input.
    pub limit: Option<Value>,
    /// Upper bound applied to the limit; defaults to 100.
    pub max_limit: Option<u64>,
}

impl PaginateOptions {
    /// Options with every value left to its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested page number; any JSON value is accepted.
    #[must_use]
    pub fn page(mut self, page: impl Into<Value>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Requested rows per page; any JSON value is accepted.
    #[must_use]
    pub fn limit(mut self, limit: impl Into<Value>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Override the upper bound on the limit.
    #[must_use]
    pub const fn max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    /// Project the given dotted field paths.
    #[must_use]
    pub fn select(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sort by the given keys, in order.
    #[must_use]
    pub fn sort(mut self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.sort = keys.into_iter().collect();
        self
    }

    /// Resolve the given reference field(s).
    #[must_use]
    pub fn populate(mut self, spec: impl Into<PopulateSpec>) -> Self {
        self.populate = Some(spec.into());
        self
    }

    /// Request plain documents.
    #[must_use]
    pub const fn lean(mut self, lean: bool) -> Self {
        self.lean = lean;
        self
    }

    /// Control the `id` mirror field added under `lean`.
    #[must_use]
    pub const fn lean_with_id(mut self, lean_with_id: bool) -> Self {
        self.lean_with_id = Some(lean_with_id);
        self
    }

    /// Fill unset values from a schema's pagination defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &PaginateDefaults) -> Self {
        if self.limit.is_none() {
            self.limit = defaults.limit.map(Value::from);
        }
        if self.max_limit.is_none() {
            self.max_limit = defaults.max_limit;
        }
        self
    }

    fn find_options(&self, skip: u64, limit: u64) -> FindOptions {
        FindOptions {
            select: self.select.clone(),
            sort: self.sort.clone(),
            skip,
            limit: Some(limit),
            lean: self.lean,
            lean_with_id: self.lean_with_id.unwrap_or(true),
            populate: self
                .populate
                .iter()
                .flat_map(PopulateSpec::fields)
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Page-windowed retrieval over any [`DocumentCollection`].
#[async_trait]
pub trait Paginate: DocumentCollection {
    /// Read one page of documents matching `filter`.
    ///
    /// The count runs first so the window can be fixed against the real
    /// total: an overshooting page clamps down to the last page and the
    /// skip is recomputed before the read. A limit of zero returns the
    /// metadata with no rows. Calling this twice with identical arguments
    /// against an unmodified collection yields identical envelopes.
    ///
    /// # Errors
    ///
    /// Any [`StorageError`] from the underlying count or read, unchanged.
    async fn paginate(
        &self,
        filter: &Filter,
        options: &PaginateOptions,
    ) -> Result<Page<Document>, StorageError> {
        let params = PageParams::resolve(
            options.page.as_ref(),
            options.limit.as_ref(),
            options.max_limit.unwrap_or(DEFAULT_MAX_LIMIT),
        );

        let total_items = self.count(filter).await?;
        let window = params.window(total_items);
        debug!(
            page = window.page,
            limit = window.limit,
            skip = window.skip,
            total_items,
            "resolved page window"
        );

        let rows = self
            .find(filter, &options.find_options(window.skip, window.limit))
            .await?;
        Ok(Page::from_window(rows, &window))
    }
}

#[async_trait]
impl<C: DocumentCollection + ?Sized> Paginate for C {}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn defaults_fill_only_unset_values() {
        let defaults = PaginateDefaults::new().with_limit(20).with_max_limit(50);

        let untouched = PaginateOptions::new().limit(5).max_limit(200);
        let merged = untouched.with_defaults(&defaults);
        assert_eq!(merged.limit, Some(json!(5)));
        assert_eq!(merged.max_limit, Some(200));

        let filled = PaginateOptions::new().with_defaults(&defaults);
        assert_eq!(filled.limit, Some(json!(20)));
        assert_eq!(filled.max_limit, Some(50));
    }

    #[rstest]
    fn find_options_flatten_the_populate_spec() {
        let options = PaginateOptions::new()
            .populate(vec!["author".to_owned(), "editor".to_owned()])
            .lean(true);
        let find = options.find_options(10, 5);

        assert_eq!(find.skip, 10);
        assert_eq!(find.limit, Some(5));
        assert!(find.lean);
        assert!(find.lean_with_id);
        assert_eq!(find.populate, vec!["author".to_owned(), "editor".to_owned()]);
    }

    #[rstest]
    fn options_deserialise_from_a_request_payload() {
        let options: PaginateOptions = serde_json::from_value(json!({
            "page": "2",
            "limit": 25,
            "sort": [{"field": "title", "order": "asc"}],
            "populate": "author",
            "lean": true,
        }))
        .expect("payload deserialises");

        assert_eq!(options.page, Some(json!("2")));
        assert_eq!(options.limit, Some(json!(25)));
        assert_eq!(options.sort, vec![SortKey::asc("title")]);
        assert_eq!(options.populate, Some(PopulateSpec::One("author".to_owned())));
        assert!(options.lean);
    }
}
