//! Storage capability boundary.
//!
//! Ports describe how the mapping layer expects to interact with a document
//! store: a [`DocumentCollection`] supports counting, windowed reads with
//! query modifiers, and document writes; a [`SchemaHost`] exposes the
//! schema-augmentation point extensions are applied through. Adapters map
//! their failures into [`StorageError`] variants instead of returning
//! `anyhow::Result`.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::paginate::PaginateDefaults;

/// A document as stored in a collection: an arbitrary JSON value, in
/// practice always a JSON object carrying an [`ID_FIELD`] entry.
pub type Document = Value;

/// Field under which a document's identifier is stored.
pub const ID_FIELD: &str = "_id";

/// Stable document identifier stored as a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Read a document's identifier from its [`ID_FIELD`] entry.
#[must_use]
pub fn document_id_of(document: &Document) -> Option<DocumentId> {
    lookup_path(document, ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| uuid::Uuid::parse_str(raw).ok())
        .map(DocumentId::from_uuid)
}

/// Resolve a dotted field path (`"auditing.deleted"`) inside a document.
#[must_use]
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Equality predicate over dotted field paths.
///
/// An empty filter matches every document. A `null` expectation matches both
/// an explicit `null` and an absent field, mirroring common document-store
/// semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    /// Filter matching every document.
    #[must_use]
    pub const fn all() -> Self {
        Self(BTreeMap::new())
    }

    /// Alias of [`Filter::all`]; add clauses with [`Filter::with`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality clause on a dotted field path.
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.0.insert(path.into(), expected.into());
        self
    }

    /// Add the clause excluding soft-deleted records.
    #[must_use]
    pub fn exclude_deleted(self) -> Self {
        self.with(AUDIT_DELETED_FIELD, false)
    }

    /// Whether the document satisfies every clause.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.0.iter().all(|(path, expected)| {
            lookup_path(document, path).map_or_else(|| expected.is_null(), |found| found == expected)
        })
    }
}

/// Dotted path of the soft-delete marker inside audited documents.
pub const AUDIT_DELETED_FIELD: &str = "auditing.deleted";

/// Sort direction for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest value first.
    Asc,
    /// Largest value first.
    Desc,
}

/// A sort key: a dotted field path plus a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Dotted field path to sort on.
    pub field: String,
    /// Direction applied to this key.
    pub order: SortOrder,
}

impl SortKey {
    /// Ascending sort on a field.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending sort on a field.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Populate request: one reference field or an ordered sequence of them,
/// each resolved independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PopulateSpec {
    /// A single reference field to resolve.
    One(String),
    /// An ordered sequence of reference fields.
    Many(Vec<String>),
}

impl PopulateSpec {
    /// Iterate the requested reference fields in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::One(field) => std::slice::from_ref(field).iter(),
            Self::Many(fields) => fields.iter(),
        }
        .map(String::as_str)
    }
}

impl From<&str> for PopulateSpec {
    fn from(field: &str) -> Self {
        Self::One(field.to_owned())
    }
}

impl From<String> for PopulateSpec {
    fn from(field: String) -> Self {
        Self::One(field)
    }
}

impl From<Vec<String>> for PopulateSpec {
    fn from(fields: Vec<String>) -> Self {
        Self::Many(fields)
    }
}

/// Query modifiers for a windowed read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindOptions {
    /// Dotted field paths to project; empty selects everything. The
    /// document identifier is always retained.
    pub select: Vec<String>,
    /// Sort keys applied in order before windowing.
    pub sort: Vec<SortKey>,
    /// Rows to skip before the window.
    pub skip: u64,
    /// Maximum rows to return; `None` is unbounded and `Some(0)` returns
    /// no rows at all.
    pub limit: Option<u64>,
    /// Return plain documents without adapter-specific hydration.
    pub lean: bool,
    /// With `lean`, mirror the document identifier into an `id` string
    /// field.
    pub lean_with_id: bool,
    /// Reference fields to resolve into their referenced documents.
    pub populate: Vec<String>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            select: Vec::new(),
            sort: Vec::new(),
            skip: 0,
            limit: None,
            lean: false,
            lean_with_id: true,
            populate: Vec::new(),
        }
    }
}

/// A reference field declaration: which collection the identifiers stored
/// under `field` point into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReference {
    /// Dotted path of the field holding a referenced document id.
    pub field: String,
    /// Name of the collection the reference points into.
    pub collection: String,
}

impl FieldReference {
    /// Declare that `field` references documents of `collection`.
    #[must_use]
    pub fn new(field: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            collection: collection.into(),
        }
    }
}

/// Per-collection configuration established once at startup and read-only
/// thereafter: declared indexes, the auditing marker, reference fields, and
/// pagination defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Dotted field paths with a declared index. Declarations are a
    /// performance contract; adapters are free to honour them lazily.
    #[serde(default)]
    pub indexes: Vec<String>,
    /// Whether records of this collection carry the auditing block.
    #[serde(default)]
    pub audited: bool,
    /// Reference field declarations used to resolve populate requests.
    #[serde(default)]
    pub references: Vec<FieldReference>,
    /// Pagination defaults applied when callers omit page options.
    #[serde(default)]
    pub pagination: Option<PaginateDefaults>,
}

impl CollectionSchema {
    /// A bare schema with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
            audited: false,
            references: Vec::new(),
            pagination: None,
        }
    }

    /// Declare a reference field.
    #[must_use]
    pub fn with_reference(mut self, reference: FieldReference) -> Self {
        self.references.push(reference);
        self
    }

    /// Declare an index on a dotted field path, ignoring duplicates.
    pub fn ensure_index(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.indexes.contains(&path) {
            self.indexes.push(path);
        }
    }

    /// Reference declaration for a field, if any.
    #[must_use]
    pub fn reference_for(&self, field: &str) -> Option<&FieldReference> {
        self.references
            .iter()
            .find(|reference| reference.field == field)
    }
}

/// Errors surfaced by storage adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Connectivity or shared-state failures inside the adapter.
    #[error("storage connection failed: {message}")]
    Connection {
        /// Adapter-provided failure description.
        message: String,
    },
    /// A read, count, or write could not be executed.
    #[error("storage query failed: {message}")]
    Query {
        /// Adapter-provided failure description.
        message: String,
    },
    /// A document could not be encoded or decoded.
    #[error("document serialisation failed: {message}")]
    Serialization {
        /// Underlying serialisation failure description.
        message: String,
    },
    /// A write addressed a document that does not exist.
    #[error("document {id} does not exist")]
    MissingDocument {
        /// Identifier the write addressed.
        id: DocumentId,
    },
}

impl StorageError {
    /// Helper for connection-level failures.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for query failures.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Helper for serialisation failures.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// A document collection: counting, windowed reads, and document writes.
///
/// Implementations are stateless with respect to concurrent invocations;
/// connection lifecycle and durability belong to the adapter behind this
/// trait, never to the extensions layered on top of it.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Count documents matching the filter, ignoring any window.
    async fn count(&self, filter: &Filter) -> Result<u64, StorageError>;

    /// Read documents matching the filter with the given modifiers applied.
    async fn find(&self, filter: &Filter, options: &FindOptions)
    -> Result<Vec<Document>, StorageError>;

    /// Insert a new document, assigning an identifier when it has none.
    /// Returns the document as stored.
    async fn insert(&self, document: Document) -> Result<Document, StorageError>;

    /// Replace an existing document in full. Returns the document as stored.
    async fn replace(&self, id: &DocumentId, document: Document)
    -> Result<Document, StorageError>;
}

/// The schema-augmentation point extensions are applied through during
/// activation.
pub trait SchemaHost {
    /// Names of the collections the host currently holds.
    fn collection_names(&self) -> Result<Vec<String>, StorageError>;

    /// Mutate the schema of a named collection. Returns `false` when the
    /// collection does not exist.
    fn update_schema(
        &self,
        name: &str,
        apply: &mut dyn FnMut(&mut CollectionSchema),
    ) -> Result<bool, StorageError>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn empty_filter_matches_everything() {
        let filter = Filter::all();
        assert!(filter.matches(&json!({"title": "a"})));
        assert!(filter.matches(&json!({})));
    }

    #[rstest]
    fn filter_compares_dotted_paths() {
        let filter = Filter::new().with("auditing.deleted", false);
        assert!(filter.matches(&json!({"auditing": {"deleted": false}})));
        assert!(!filter.matches(&json!({"auditing": {"deleted": true}})));
    }

    #[rstest]
    fn null_clause_matches_absent_field() {
        let filter = Filter::new().with("owner", Value::Null);
        assert!(filter.matches(&json!({"title": "a"})));
        assert!(filter.matches(&json!({"owner": null})));
        assert!(!filter.matches(&json!({"owner": "someone"})));
    }

    #[rstest]
    fn missing_field_does_not_match_concrete_clause() {
        let filter = Filter::new().with("owner", "someone");
        assert!(!filter.matches(&json!({"title": "a"})));
    }

    #[rstest]
    fn populate_spec_accepts_single_value_or_sequence() {
        let single = PopulateSpec::from("author");
        assert_eq!(single.fields().collect::<Vec<_>>(), vec!["author"]);

        let many = PopulateSpec::from(vec!["author".to_owned(), "editor".to_owned()]);
        assert_eq!(many.fields().collect::<Vec<_>>(), vec!["author", "editor"]);
    }

    #[rstest]
    fn document_id_round_trips_through_a_document() {
        let id = DocumentId::random();
        let document = json!({ID_FIELD: id.to_string(), "title": "a"});
        assert_eq!(document_id_of(&document), Some(id));
    }

    #[rstest]
    fn ensure_index_ignores_duplicates() {
        let mut schema = CollectionSchema::new("notes");
        schema.ensure_index(AUDIT_DELETED_FIELD);
        schema.ensure_index(AUDIT_DELETED_FIELD);
        assert_eq!(schema.indexes, vec![AUDIT_DELETED_FIELD.to_owned()]);
    }
}
