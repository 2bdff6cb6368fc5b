//! Audited record lifecycle against the in-memory adapter: registration,
//! activation, save, update, and soft delete.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docstore::domain::{
    ActorId, AuditedRecord, Auditing, CallerContext, CollectionSchema, DocumentCollection,
    DocumentId, Filter, FindOptions, RecordNotDeletable, ZoneOffset,
};
use docstore::paginate::{Paginate, PaginateDefaults, PaginateOptions};
use docstore::registry::{ExtensionRegistry, PaginationExtension};
use docstore::store::{MemoryCollection, MemoryDatabase, RecordStore, SaveError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<DocumentId>,
    title: String,
    auditing: Auditing,
}

impl Note {
    fn new(title: &str) -> Self {
        Self {
            id: None,
            title: title.to_owned(),
            auditing: Auditing::new(),
        }
    }

    fn undeletable(title: &str) -> Self {
        Self {
            auditing: Auditing::undeletable(),
            ..Self::new(title)
        }
    }
}

impl AuditedRecord for Note {
    fn document_id(&self) -> Option<DocumentId> {
        self.id
    }

    fn assign_document_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    fn auditing(&self) -> &Auditing {
        &self.auditing
    }

    fn auditing_mut(&mut self) -> &mut Auditing {
        &mut self.auditing
    }
}

fn audited_notes() -> (MemoryDatabase, MemoryCollection) {
    let database = MemoryDatabase::new();
    let collection = database
        .create_collection(CollectionSchema::new("notes"))
        .expect("collection creates");
    let report = ExtensionRegistry::with_defaults()
        .register(PaginationExtension::new(
            PaginateDefaults::new().with_limit(10),
        ))
        .activate(&database)
        .expect("activation succeeds");
    assert!(report.is_complete());
    (database, collection)
}

async fn stored_document(collection: &MemoryCollection, id: DocumentId) -> Value {
    let filter = Filter::new().with("_id", id.to_string());
    let rows = collection
        .find(&filter, &FindOptions::default())
        .await
        .expect("find succeeds");
    rows.into_iter().next().expect("document exists")
}

#[tokio::test]
async fn activation_marks_the_schema_audited_and_indexed() {
    let (database, _collection) = audited_notes();

    let schema = database
        .schema("notes")
        .expect("schema reads")
        .expect("schema exists");

    assert!(schema.audited);
    assert!(schema.indexes.contains(&"auditing.deleted".to_owned()));
    assert_eq!(
        schema.pagination,
        Some(PaginateDefaults::new().with_limit(10))
    );
}

#[tokio::test]
async fn first_save_persists_the_auditing_block() {
    let (_database, collection) = audited_notes();
    let store = RecordStore::new(collection.clone());
    let actor = ActorId::random();
    let context = CallerContext::for_actor(actor).with_creation_zone_offset(ZoneOffset::minutes(60));

    let mut note = Note::new("minutes");
    store
        .save(&mut note, Some(&context))
        .await
        .expect("save succeeds");

    let stored = stored_document(&collection, note.id.expect("id assigned")).await;
    assert!(stored.pointer("/auditing/createdAt").is_some());
    assert_eq!(
        stored.pointer("/auditing/createdBy"),
        Some(&Value::String(actor.to_string()))
    );
    assert_eq!(
        stored.pointer("/auditing/creationZoneOffset"),
        Some(&Value::from(60))
    );
    assert_eq!(
        stored.pointer("/auditing/deleted"),
        Some(&Value::Bool(false))
    );
}

#[tokio::test]
async fn updates_preserve_creation_metadata() {
    let (_database, collection) = audited_notes();
    let store = RecordStore::new(collection.clone());
    let creator = ActorId::random();
    let editor = ActorId::random();

    let mut note = Note::new("draft");
    store
        .save(&mut note, Some(&CallerContext::for_actor(creator)))
        .await
        .expect("first save succeeds");

    note.title = "final".to_owned();
    store
        .save(&mut note, Some(&CallerContext::for_actor(editor)))
        .await
        .expect("second save succeeds");

    let stored = stored_document(&collection, note.id.expect("id assigned")).await;
    assert_eq!(
        stored.pointer("/auditing/createdBy"),
        Some(&Value::String(creator.to_string()))
    );
    assert_eq!(
        stored.pointer("/auditing/lastUpdateBy"),
        Some(&Value::String(editor.to_string()))
    );
    assert_eq!(stored.pointer("/title"), Some(&Value::String("final".to_owned())));
    assert_eq!(
        collection.count(&Filter::all()).await.expect("count"),
        1,
        "updates replace, they do not duplicate"
    );
}

#[tokio::test]
async fn soft_deleted_records_drop_out_of_live_queries() {
    let (_database, collection) = audited_notes();
    let store = RecordStore::new(collection.clone());

    let mut keep = Note::new("keep");
    let mut discard = Note::new("discard");
    store.save(&mut keep, None).await.expect("save succeeds");
    store.save(&mut discard, None).await.expect("save succeeds");

    store
        .soft_delete(&mut discard, None)
        .await
        .expect("soft delete succeeds");

    let live = Filter::new().exclude_deleted();
    assert_eq!(collection.count(&live).await.expect("count"), 1);
    assert_eq!(collection.count(&Filter::all()).await.expect("count"), 2);

    let page = collection
        .paginate(&live, &PaginateOptions::new())
        .await
        .expect("paginate succeeds");
    assert_eq!(page.total_items, 1);
    assert_eq!(
        page.rows
            .first()
            .and_then(|row| row.pointer("/title")),
        Some(&Value::String("keep".to_owned()))
    );
}

#[tokio::test]
async fn guarded_record_refuses_deletion_and_stays_intact() {
    let (_database, collection) = audited_notes();
    let store = RecordStore::new(collection.clone());

    let mut note = Note::undeletable("permanent");
    store.save(&mut note, None).await.expect("save succeeds");
    let before = note.auditing.clone();

    let err = store
        .soft_delete(&mut note, None)
        .await
        .expect_err("guard refuses");

    assert_eq!(err, SaveError::NotDeletable(RecordNotDeletable));
    assert!(!note.auditing.is_deleted());
    assert_eq!(note.auditing, before);

    let stored = stored_document(&collection, note.id.expect("id assigned")).await;
    assert_eq!(
        stored.pointer("/auditing/deleted"),
        Some(&Value::Bool(false)),
        "persisted state is untouched by the refused delete"
    );
}
