//! The audited save path.
//!
//! [`RecordStore`] makes the auditing side effect visible at the call site:
//! `save` runs the named [`Auditing::stamp`] step and only then delegates to
//! the [`DocumentCollection`] port, inserting new records and replacing
//! existing ones. `soft_delete` checks the deletion guard before touching
//! the marker, so a refused delete leaves the record exactly as it was.
//!
//! [`Auditing::stamp`]: crate::domain::auditing::Auditing::stamp

pub mod memory;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::auditing::{AuditedRecord, CallerContext, RecordNotDeletable};
use crate::domain::ports::{Document, DocumentCollection, StorageError, document_id_of};

pub use self::memory::{MemoryCollection, MemoryDatabase};

/// Failures of the audited save path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// The save would soft-delete a record whose deletion guard is set.
    #[error(transparent)]
    NotDeletable(#[from] RecordNotDeletable),
    /// The delegated storage call failed; surfaced unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The explicit save path over one document collection.
#[derive(Debug, Clone)]
pub struct RecordStore<C> {
    collection: C,
}

impl<C: DocumentCollection> RecordStore<C> {
    /// Wrap a collection in the audited save path.
    #[must_use]
    pub const fn new(collection: C) -> Self {
        Self { collection }
    }

    /// The underlying collection.
    #[must_use]
    pub const fn collection(&self) -> &C {
        &self.collection
    }

    /// Save a record, stamping its auditing block first.
    ///
    /// A record that has never been saved is inserted and adopts the
    /// identifier the store assigns; an existing record is replaced in
    /// full. Returns the document as stored.
    ///
    /// # Errors
    ///
    /// [`SaveError::NotDeletable`] when the record is marked deleted while
    /// its deletion guard is set — nothing is stamped and no write is
    /// issued. [`SaveError::Storage`] carries any delegated storage
    /// failure unchanged; the in-memory record keeps its stamped fields in
    /// that case.
    pub async fn save<T>(
        &self,
        record: &mut T,
        context: Option<&CallerContext>,
    ) -> Result<Document, SaveError>
    where
        T: AuditedRecord + Serialize + Send,
    {
        let was_new = record.auditing().is_new();
        record.auditing_mut().stamp(Utc::now(), context)?;

        let document = serde_json::to_value(&*record)
            .map_err(|err| StorageError::serialization(err.to_string()))?;

        let stored = if was_new {
            let stored = self.collection.insert(document).await?;
            if let Some(id) = document_id_of(&stored) {
                record.assign_document_id(id);
            }
            stored
        } else {
            let id = record
                .document_id()
                .ok_or_else(|| StorageError::query("existing record carries no document id"))?;
            self.collection.replace(&id, document).await?
        };

        debug!(new = was_new, "saved audited record");
        Ok(stored)
    }

    /// Soft-delete a record: set the marker and run the normal save path.
    ///
    /// The deletion guard is checked before the marker is touched, so a
    /// refused delete leaves the record's `deleted` flag false and every
    /// other field unchanged.
    ///
    /// # Errors
    ///
    /// [`SaveError::NotDeletable`] when the deletion guard is set;
    /// [`SaveError::Storage`] for delegated storage failures.
    pub async fn soft_delete<T>(
        &self,
        record: &mut T,
        context: Option<&CallerContext>,
    ) -> Result<Document, SaveError>
    where
        T: AuditedRecord + Serialize + Send,
    {
        if !record.auditing().can_be_deleted() {
            return Err(RecordNotDeletable.into());
        }
        record.auditing_mut().set_deleted(true);
        self.save(record, context).await
    }
}
