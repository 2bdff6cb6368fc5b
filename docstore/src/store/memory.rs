//! In-memory document database adapter.
//!
//! Test and demonstration infrastructure, not a storage engine: named
//! collections of JSON documents with equality filters over dotted paths,
//! multi-key sorting, windowing, projection, reference resolution
//! (populate), and per-collection schemas. Declared indexes are recorded on
//! the schema only; the adapter scans.
//!
//! Collections hand out cheap clones sharing one locked state, mirroring a
//! pooled connection handle. Lock poisoning surfaces as a connection-level
//! [`StorageError`] rather than a panic.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use pagination::Page;

use crate::domain::ports::{
    CollectionSchema, Document, DocumentCollection, DocumentId, Filter, FindOptions, ID_FIELD,
    SchemaHost, SortKey, SortOrder, StorageError, document_id_of, lookup_path,
};
use crate::paginate::{Paginate, PaginateOptions};

#[derive(Debug)]
struct CollectionState {
    schema: CollectionSchema,
    documents: Vec<Document>,
}

type SharedState = Arc<RwLock<CollectionState>>;
type CollectionMap = BTreeMap<String, SharedState>;

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read()
        .map_err(|_| StorageError::connection("collection state lock poisoned"))
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write()
        .map_err(|_| StorageError::connection("collection state lock poisoned"))
}

/// Named in-memory collections sharing one database handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    collections: Arc<RwLock<CollectionMap>>,
}

impl MemoryDatabase {
    /// An empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection from its schema.
    ///
    /// # Errors
    ///
    /// [`StorageError::Query`] when a collection of that name already
    /// exists, [`StorageError::Connection`] on poisoned shared state.
    pub fn create_collection(
        &self,
        schema: CollectionSchema,
    ) -> Result<MemoryCollection, StorageError> {
        let mut collections = write_lock(&self.collections)?;
        let name = schema.name.clone();
        if collections.contains_key(&name) {
            return Err(StorageError::query(format!(
                "collection {name} already exists"
            )));
        }
        let state = Arc::new(RwLock::new(CollectionState {
            schema,
            documents: Vec::new(),
        }));
        collections.insert(name.clone(), Arc::clone(&state));
        debug!(collection = %name, "created collection");
        Ok(MemoryCollection {
            name,
            state,
            peers: Arc::downgrade(&self.collections),
        })
    }

    /// Handle to a named collection, if it exists.
    ///
    /// # Errors
    ///
    /// [`StorageError::Connection`] on poisoned shared state.
    pub fn collection(&self, name: &str) -> Result<Option<MemoryCollection>, StorageError> {
        let collections = read_lock(&self.collections)?;
        Ok(collections.get(name).map(|state| MemoryCollection {
            name: name.to_owned(),
            state: Arc::clone(state),
            peers: Arc::downgrade(&self.collections),
        }))
    }

    /// Snapshot of a named collection's schema.
    ///
    /// # Errors
    ///
    /// [`StorageError::Connection`] on poisoned shared state.
    pub fn schema(&self, name: &str) -> Result<Option<CollectionSchema>, StorageError> {
        let collections = read_lock(&self.collections)?;
        collections
            .get(name)
            .map(|state| Ok(read_lock(state)?.schema.clone()))
            .transpose()
    }

    /// Paginate a named collection with its schema's pagination defaults
    /// filled into the unset options.
    ///
    /// # Errors
    ///
    /// [`StorageError::Query`] when the collection does not exist; any
    /// storage failure from the underlying count or read, unchanged.
    pub async fn paginate(
        &self,
        name: &str,
        filter: &Filter,
        options: PaginateOptions,
    ) -> Result<Page<Document>, StorageError> {
        let collection = self
            .collection(name)?
            .ok_or_else(|| StorageError::query(format!("unknown collection {name}")))?;
        let defaults = collection.schema()?.pagination.unwrap_or_default();
        let merged = options.with_defaults(&defaults);
        collection.paginate(filter, &merged).await
    }
}

impl SchemaHost for MemoryDatabase {
    fn collection_names(&self) -> Result<Vec<String>, StorageError> {
        let collections = read_lock(&self.collections)?;
        Ok(collections.keys().cloned().collect())
    }

    fn update_schema(
        &self,
        name: &str,
        apply: &mut dyn FnMut(&mut CollectionSchema),
    ) -> Result<bool, StorageError> {
        let collections = read_lock(&self.collections)?;
        match collections.get(name) {
            None => Ok(false),
            Some(state) => {
                let mut state = write_lock(state)?;
                apply(&mut state.schema);
                Ok(true)
            }
        }
    }
}

/// Handle to one in-memory collection.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    state: SharedState,
    peers: Weak<RwLock<CollectionMap>>,
}

impl MemoryCollection {
    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the collection's schema.
    ///
    /// # Errors
    ///
    /// [`StorageError::Connection`] on poisoned shared state.
    pub fn schema(&self) -> Result<CollectionSchema, StorageError> {
        Ok(read_lock(&self.state)?.schema.clone())
    }

    fn peer_state(&self, collection: &str) -> Result<SharedState, StorageError> {
        let peers = self
            .peers
            .upgrade()
            .ok_or_else(|| StorageError::connection("database handle has been dropped"))?;
        let map = read_lock(&peers)?;
        map.get(collection).cloned().ok_or_else(|| {
            StorageError::query(format!(
                "unknown collection {collection} referenced by populate"
            ))
        })
    }

    /// Resolve declared reference fields into their referenced documents.
    ///
    /// Fields without a schema reference declaration are skipped; a
    /// reference id with no matching document leaves the raw id in place.
    fn populate_rows(
        &self,
        rows: &mut [Document],
        fields: &[String],
        schema: &CollectionSchema,
    ) -> Result<(), StorageError> {
        for field in fields {
            let Some(reference) = schema.reference_for(field) else {
                debug!(
                    collection = %self.name,
                    field = %field,
                    "no reference declared for populate field"
                );
                continue;
            };
            let peer = self.peer_state(&reference.collection)?;
            for row in rows.iter_mut() {
                let Some(raw_id) = lookup_path(row, field).cloned() else {
                    continue;
                };
                let resolved = {
                    let peer_state = read_lock(&peer)?;
                    peer_state
                        .documents
                        .iter()
                        .find(|candidate| lookup_path(candidate, ID_FIELD) == Some(&raw_id))
                        .cloned()
                };
                if let Some(referenced) = resolved {
                    set_path(row, field, referenced);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn count(&self, filter: &Filter) -> Result<u64, StorageError> {
        let state = read_lock(&self.state)?;
        let matched = state
            .documents
            .iter()
            .filter(|document| filter.matches(document))
            .count();
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StorageError> {
        // Clone the matches out before any further work so populate can
        // re-enter this collection without holding its lock.
        let (matched, schema) = {
            let state = read_lock(&self.state)?;
            let matched: Vec<Document> = state
                .documents
                .iter()
                .filter(|document| filter.matches(document))
                .cloned()
                .collect();
            (matched, state.schema.clone())
        };

        let mut sorted = matched;
        sort_rows(&mut sorted, &options.sort);
        let mut rows = window(sorted, options.skip, options.limit);

        if !options.select.is_empty() {
            for row in &mut rows {
                *row = project(row, &options.select);
            }
        }
        if !options.populate.is_empty() {
            self.populate_rows(&mut rows, &options.populate, &schema)?;
        }
        if options.lean && options.lean_with_id {
            for row in &mut rows {
                mirror_id(row);
            }
        }

        Ok(rows)
    }

    async fn insert(&self, document: Document) -> Result<Document, StorageError> {
        let mut object = into_object(document)?;
        object
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(DocumentId::random().to_string()));
        let stored = Value::Object(object);

        let mut state = write_lock(&self.state)?;
        state.documents.push(stored.clone());
        debug!(collection = %self.name, total = state.documents.len(), "inserted document");
        Ok(stored)
    }

    async fn replace(&self, id: &DocumentId, document: Document) -> Result<Document, StorageError> {
        let mut object = into_object(document)?;
        object.insert(ID_FIELD.to_owned(), Value::String(id.to_string()));
        let stored = Value::Object(object);

        let mut state = write_lock(&self.state)?;
        let slot = state
            .documents
            .iter_mut()
            .find(|candidate| document_id_of(candidate) == Some(*id))
            .ok_or(StorageError::MissingDocument { id: *id })?;
        *slot = stored.clone();
        debug!(collection = %self.name, %id, "replaced document");
        Ok(stored)
    }
}

fn into_object(document: Document) -> Result<Map<String, Value>, StorageError> {
    match document {
        Value::Object(object) => Ok(object),
        other => Err(StorageError::serialization(format!(
            "document must be a JSON object, got {other}"
        ))),
    }
}

fn window(rows: Vec<Document>, skip: u64, limit: Option<u64>) -> Vec<Document> {
    let skipped = rows
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX));
    match limit {
        Some(limit) => skipped
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect(),
        None => skipped.collect(),
    }
}

fn sort_rows(rows: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|left, right| {
        for key in keys {
            let by_key = compare_fields(
                lookup_path(left, &key.field),
                lookup_path(right, &key.field),
            );
            let directed = match key.order {
                SortOrder::Asc => by_key,
                SortOrder::Desc => by_key.reverse(),
            };
            if directed != Ordering::Equal {
                return directed;
            }
        }
        Ordering::Equal
    });
}

/// Absent fields sort before present ones; across types, the order is
/// null < bool < number < string, with arrays and objects treated as
/// mutually unordered.
fn compare_fields(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn type_rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn compare_numbers(left: &serde_json::Number, right: &serde_json::Number) -> Ordering {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return a.cmp(&b);
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Project a document onto the selected dotted paths, always retaining the
/// identifier field.
fn project(document: &Document, select: &[String]) -> Document {
    let mut projected = Map::new();
    if let Some(id) = lookup_path(document, ID_FIELD) {
        projected.insert(ID_FIELD.to_owned(), id.clone());
    }
    for path in select {
        if let Some(value) = lookup_path(document, path) {
            insert_path(&mut projected, path, value.clone());
        }
    }
    Value::Object(projected)
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(nested) = entry.as_object_mut() {
                insert_path(nested, rest, value);
            }
        }
    }
}

fn set_path(document: &mut Document, path: &str, value: Value) {
    let Some(object) = document.as_object_mut() else {
        return;
    };
    match path.split_once('.') {
        None => {
            object.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            if let Some(nested) = object.get_mut(head) {
                set_path(nested, rest, value);
            }
        }
    }
}

fn mirror_id(row: &mut Document) {
    let Some(id) = lookup_path(row, ID_FIELD).cloned() else {
        return;
    };
    if let (Some(object), Some(raw)) = (row.as_object_mut(), id.as_str()) {
        object.insert("id".to_owned(), Value::String(raw.to_owned()));
    }
}
