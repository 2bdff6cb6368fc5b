//! Record lifecycle metadata and soft-delete semantics.
//!
//! Every audited record carries an [`Auditing`] block serialised under its
//! `auditing` key: creation and update stamps, optional actor references,
//! the soft-delete marker, and the zone offsets the writes were made from.
//! [`Auditing::stamp`] is the single named step the save path runs before a
//! write, so the side effect is visible at the call site instead of hiding
//! behind an implicit persistence hook.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::ports::DocumentId;

/// Opaque reference to an actor identity (for example a user id).
///
/// The mapping layer stores the reference and never validates or
/// dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a new random actor reference.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Minutes east of UTC, captured at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneOffset(i32);

impl ZoneOffset {
    /// An explicit offset in minutes east of UTC.
    #[must_use]
    pub const fn minutes(minutes: i32) -> Self {
        Self(minutes)
    }

    /// The local process offset at the time of the call.
    #[must_use]
    pub fn local() -> Self {
        Self(Local::now().offset().local_minus_utc().div_euclid(60))
    }

    /// Offset in minutes east of UTC.
    #[must_use]
    pub const fn as_minutes(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}m", self.0)
    }
}

/// Caller-supplied context accompanying a save: who is writing and from
/// which zone offsets. Every field is optional; an absent context stamps
/// timestamps only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    actor: Option<ActorId>,
    creation_zone_offset: Option<ZoneOffset>,
    update_zone_offset: Option<ZoneOffset>,
}

impl CallerContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying only an actor reference.
    #[must_use]
    pub fn for_actor(actor: ActorId) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    /// Attach an actor reference.
    #[must_use]
    pub const fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Attach the offset the record is being created from.
    #[must_use]
    pub const fn with_creation_zone_offset(mut self, offset: ZoneOffset) -> Self {
        self.creation_zone_offset = Some(offset);
        self
    }

    /// Attach the offset the record is being updated from.
    #[must_use]
    pub const fn with_update_zone_offset(mut self, offset: ZoneOffset) -> Self {
        self.update_zone_offset = Some(offset);
        self
    }

    /// Actor reference, if supplied.
    #[must_use]
    pub const fn actor(&self) -> Option<ActorId> {
        self.actor
    }

    /// Creation zone offset, if supplied.
    #[must_use]
    pub const fn creation_zone_offset(&self) -> Option<ZoneOffset> {
        self.creation_zone_offset
    }

    /// Update zone offset, if supplied.
    #[must_use]
    pub const fn update_zone_offset(&self) -> Option<ZoneOffset> {
        self.update_zone_offset
    }
}

/// Raised when a save would soft-delete a record whose deletion guard is
/// set. The save aborts before any field is stamped and no write is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record cannot be deleted: its deletion guard is set")]
pub struct RecordNotDeletable;

/// Lifecycle metadata carried by every audited record.
///
/// A record whose `created_at` is unset is new: its first successful save
/// stamps creation and update fields together. Later saves only advance the
/// update fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Auditing {
    /// Set once, on the first successful save.
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    /// Actor that created the record, when the first save carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by: Option<ActorId>,
    /// Advanced on every save.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_update_at: Option<DateTime<Utc>>,
    /// Actor of the most recent save that carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_update_by: Option<ActorId>,
    /// Soft-delete marker.
    deleted: bool,
    /// Deletion guard: while `false`, the record refuses soft deletion.
    can_be_deleted: bool,
    /// Offset the record was created from, in minutes east of UTC.
    creation_zone_offset: ZoneOffset,
    /// Offset the record was last written from, in minutes east of UTC.
    update_zone_offset: ZoneOffset,
}

impl Default for Auditing {
    fn default() -> Self {
        let offset = ZoneOffset::local();
        Self {
            created_at: None,
            created_by: None,
            last_update_at: None,
            last_update_by: None,
            deleted: false,
            can_be_deleted: true,
            creation_zone_offset: offset,
            update_zone_offset: offset,
        }
    }
}

impl Auditing {
    /// A fresh block with defaults: not deleted, deletable, local offsets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh block whose deletion guard is already set.
    #[must_use]
    pub fn undeletable() -> Self {
        Self {
            can_be_deleted: false,
            ..Self::default()
        }
    }

    /// Whether the record has never been saved.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.created_at.is_none()
    }

    /// Creation stamp, set on the first save.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Actor that created the record.
    #[must_use]
    pub const fn created_by(&self) -> Option<ActorId> {
        self.created_by
    }

    /// Stamp of the most recent save.
    #[must_use]
    pub const fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.last_update_at
    }

    /// Actor of the most recent save that carried one.
    #[must_use]
    pub const fn last_update_by(&self) -> Option<ActorId> {
        self.last_update_by
    }

    /// Whether the record is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether soft deletion is permitted.
    #[must_use]
    pub const fn can_be_deleted(&self) -> bool {
        self.can_be_deleted
    }

    /// Offset the record was created from.
    #[must_use]
    pub const fn creation_zone_offset(&self) -> ZoneOffset {
        self.creation_zone_offset
    }

    /// Offset the record was last written from.
    #[must_use]
    pub const fn update_zone_offset(&self) -> ZoneOffset {
        self.update_zone_offset
    }

    /// Set or clear the deletion guard.
    pub const fn set_can_be_deleted(&mut self, can_be_deleted: bool) {
        self.can_be_deleted = can_be_deleted;
    }

    pub(crate) const fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Apply the pre-write audit stamp.
    ///
    /// Runs, in order: the deletion guard (a soft-deleted block whose guard
    /// is set fails with [`RecordNotDeletable`] before anything is
    /// mutated); creation stamping when the record is new; update stamping
    /// from the caller context; and finally `last_update_at = now`. The
    /// update offset falls back to the context's creation offset when only
    /// that one is supplied.
    ///
    /// # Errors
    ///
    /// [`RecordNotDeletable`] when the block is marked deleted while its
    /// deletion guard is set.
    pub fn stamp(
        &mut self,
        now: DateTime<Utc>,
        context: Option<&CallerContext>,
    ) -> Result<(), RecordNotDeletable> {
        if self.deleted && !self.can_be_deleted {
            return Err(RecordNotDeletable);
        }

        if self.is_new() {
            self.created_at = Some(now);
            if let Some(context) = context {
                if let Some(actor) = context.actor() {
                    self.created_by = Some(actor);
                }
                if let Some(offset) = context.creation_zone_offset() {
                    self.creation_zone_offset = offset;
                }
            }
        }

        if let Some(context) = context {
            if let Some(actor) = context.actor() {
                self.last_update_by = Some(actor);
            }
            if let Some(offset) = context
                .update_zone_offset()
                .or_else(|| context.creation_zone_offset())
            {
                self.update_zone_offset = offset;
            }
        }

        self.last_update_at = Some(now);
        Ok(())
    }
}

/// A record type that carries an [`Auditing`] block and a document
/// identity, making it eligible for the audited save path.
pub trait AuditedRecord {
    /// Identifier of the stored document, absent until the first save.
    fn document_id(&self) -> Option<DocumentId>;

    /// Adopt the identifier assigned by the store on first save.
    fn assign_document_id(&mut self, id: DocumentId);

    /// The auditing block.
    fn auditing(&self) -> &Auditing;

    /// Mutable access to the auditing block.
    fn auditing_mut(&mut self) -> &mut Auditing;
}
