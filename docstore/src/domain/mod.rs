//! Domain primitives and storage ports.
//!
//! Purpose: define the record lifecycle types (auditing block, caller
//! context, actor references) and the storage capability boundary the
//! extensions operate against. Keep types immutable where possible and
//! document invariants and serialisation contracts (serde) in each type's
//! Rustdoc.

pub mod auditing;
pub mod ports;

pub use self::auditing::{
    ActorId, AuditedRecord, Auditing, CallerContext, RecordNotDeletable, ZoneOffset,
};
pub use self::ports::{
    AUDIT_DELETED_FIELD, CollectionSchema, Document, DocumentCollection, DocumentId,
    FieldReference, Filter, FindOptions, ID_FIELD, PopulateSpec, SchemaHost, SortKey, SortOrder,
    StorageError, document_id_of, lookup_path,
};
