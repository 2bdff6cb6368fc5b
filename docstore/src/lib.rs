//! Document-collection mapping layer with auditing and pagination
//! extensions.
//!
//! Two independent, composable utilities operate against a document
//! collection abstraction:
//!
//! - the **auditing save path** ([`store::RecordStore`]) stamps lifecycle
//!   metadata on every save and enforces soft-delete semantics, failing a
//!   save with [`domain::RecordNotDeletable`] when a guarded record is
//!   marked deleted;
//! - the **pagination extension** ([`paginate::Paginate`]) adds
//!   page-windowed retrieval with totals to every
//!   [`domain::DocumentCollection`], normalising loose page input instead
//!   of rejecting it.
//!
//! Collection schemas are configured once at startup through the two-phase
//! [`registry::ExtensionRegistry`]: register extensions, then activate them
//! against the storage layer in one call. The crate ships an in-memory
//! adapter ([`store::MemoryDatabase`]) for tests and demonstrations;
//! anything durable lives behind the [`domain::ports`] traits.
//!
//! # Example
//!
//! ```
//! use docstore::domain::{CollectionSchema, Filter};
//! use docstore::paginate::PaginateOptions;
//! use docstore::registry::ExtensionRegistry;
//! use docstore::store::MemoryDatabase;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), docstore::domain::StorageError> {
//! let database = MemoryDatabase::new();
//! database.create_collection(CollectionSchema::new("notes"))?;
//!
//! let report = ExtensionRegistry::with_defaults().activate(&database)?;
//! assert!(report.is_complete());
//!
//! let page = database
//!     .paginate("notes", &Filter::all(), PaginateOptions::new())
//!     .await?;
//! assert_eq!(page.total_pages, 1);
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod paginate;
pub mod registry;
pub mod store;

pub use pagination::Page;

pub use crate::domain::{
    ActorId, AuditedRecord, Auditing, CallerContext, DocumentCollection, Filter,
    RecordNotDeletable, StorageError, ZoneOffset,
};
pub use crate::paginate::{Paginate, PaginateOptions};
pub use crate::registry::ExtensionRegistry;
pub use crate::store::{RecordStore, SaveError};
