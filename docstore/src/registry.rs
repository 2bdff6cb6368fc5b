//! Extension registration and two-phase activation.
//!
//! Extensions configure collection schemas, and all of them are collected
//! into an [`ExtensionRegistry`] constructed once at startup — an explicit
//! object passed to whoever needs it, never a process-wide list. Startup is
//! two distinct phases: registration accumulates extensions, then a single
//! [`ExtensionRegistry::activate`] call applies them against the storage
//! layer's [`SchemaHost`] and yields an [`ActivationReport`] as the
//! completion signal. Activation consumes the registry, so late
//! registration is unrepresentable.

use tracing::{debug, warn};

use crate::domain::ports::{AUDIT_DELETED_FIELD, CollectionSchema, SchemaHost, StorageError};
use crate::paginate::PaginateDefaults;

/// Which collections an extension applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionTarget {
    /// Every collection the host holds at activation time.
    AllCollections,
    /// One named collection.
    Collection(String),
}

/// A schema-level extension applied during activation.
pub trait SchemaExtension: Send + Sync {
    /// Stable extension name used in reports and logs.
    fn name(&self) -> &str;

    /// Collections the extension applies to.
    fn target(&self) -> &ExtensionTarget;

    /// Mutate one matching collection schema.
    fn apply(&self, schema: &mut CollectionSchema);
}

/// Marks collections as audited and declares the index that keeps
/// "exclude deleted" queries efficient.
#[derive(Debug, Clone)]
pub struct AuditingExtension {
    target: ExtensionTarget,
}

impl AuditingExtension {
    /// Audit every collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target: ExtensionTarget::AllCollections,
        }
    }

    /// Audit one named collection.
    #[must_use]
    pub fn for_collection(name: impl Into<String>) -> Self {
        Self {
            target: ExtensionTarget::Collection(name.into()),
        }
    }
}

impl Default for AuditingExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaExtension for AuditingExtension {
    fn name(&self) -> &str {
        "auditing"
    }

    fn target(&self) -> &ExtensionTarget {
        &self.target
    }

    fn apply(&self, schema: &mut CollectionSchema) {
        schema.audited = true;
        schema.ensure_index(AUDIT_DELETED_FIELD);
    }
}

/// Writes pagination defaults into collection schemas; paginated reads fill
/// unset caller options from them.
#[derive(Debug, Clone)]
pub struct PaginationExtension {
    target: ExtensionTarget,
    defaults: PaginateDefaults,
}

impl PaginationExtension {
    /// Apply the defaults to every collection.
    #[must_use]
    pub const fn new(defaults: PaginateDefaults) -> Self {
        Self {
            target: ExtensionTarget::AllCollections,
            defaults,
        }
    }

    /// Apply the defaults to one named collection.
    #[must_use]
    pub fn for_collection(name: impl Into<String>, defaults: PaginateDefaults) -> Self {
        Self {
            target: ExtensionTarget::Collection(name.into()),
            defaults,
        }
    }
}

impl SchemaExtension for PaginationExtension {
    fn name(&self) -> &str {
        "pagination"
    }

    fn target(&self) -> &ExtensionTarget {
        &self.target
    }

    fn apply(&self, schema: &mut CollectionSchema) {
        schema.pagination = Some(self.defaults.clone());
    }
}

/// One extension/collection pair recorded during activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationEntry {
    /// Extension name.
    pub extension: String,
    /// Collection the extension targeted.
    pub collection: String,
}

/// Outcome of the activation phase: which extension/collection pairs were
/// applied and which targets named collections the host does not hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    applied: Vec<ActivationEntry>,
    skipped: Vec<ActivationEntry>,
}

impl ActivationReport {
    /// Extension/collection pairs that were applied.
    #[must_use]
    pub fn applied(&self) -> &[ActivationEntry] {
        &self.applied
    }

    /// Targets that named a collection the host does not hold.
    #[must_use]
    pub fn skipped(&self) -> &[ActivationEntry] {
        &self.skipped
    }

    /// Whether every registered target was applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Accumulates schema extensions during the registration phase.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn SchemaExtension>>,
}

impl ExtensionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the stock extension set: auditing on every
    /// collection.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().register(AuditingExtension::new())
    }

    /// Register an extension. Registration order is application order.
    #[must_use]
    pub fn register(mut self, extension: impl SchemaExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether no extension has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Apply every registered extension against the host's schemas.
    ///
    /// Consumes the registry: this call is the boundary between the
    /// registration and activation phases, and the returned report is the
    /// completion signal. An extension targeting a collection the host does
    /// not hold is recorded as skipped and logged at WARN, never an error.
    ///
    /// # Errors
    ///
    /// [`StorageError`] when the host cannot enumerate or update its
    /// schemas.
    pub fn activate(self, host: &dyn SchemaHost) -> Result<ActivationReport, StorageError> {
        let mut report = ActivationReport::default();
        for extension in &self.extensions {
            match extension.target() {
                ExtensionTarget::AllCollections => {
                    for name in host.collection_names()? {
                        apply_to(host, extension.as_ref(), &name, &mut report)?;
                    }
                }
                ExtensionTarget::Collection(name) => {
                    apply_to(host, extension.as_ref(), name, &mut report)?;
                }
            }
        }
        debug!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "extension activation complete"
        );
        Ok(report)
    }
}

fn apply_to(
    host: &dyn SchemaHost,
    extension: &dyn SchemaExtension,
    collection: &str,
    report: &mut ActivationReport,
) -> Result<(), StorageError> {
    let mut apply = |schema: &mut CollectionSchema| extension.apply(schema);
    let entry = ActivationEntry {
        extension: extension.name().to_owned(),
        collection: collection.to_owned(),
    };
    if host.update_schema(collection, &mut apply)? {
        debug!(
            extension = extension.name(),
            collection, "applied schema extension"
        );
        report.applied.push(entry);
    } else {
        warn!(
            extension = extension.name(),
            collection, "collection does not exist for the extension"
        );
        report.skipped.push(entry);
    }
    Ok(())
}
