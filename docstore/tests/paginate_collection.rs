//! End-to-end pagination behaviour against the in-memory adapter.

use docstore::domain::{CollectionSchema, DocumentCollection, Filter, SortKey};
use docstore::paginate::{Paginate, PaginateOptions};
use docstore::store::{MemoryCollection, MemoryDatabase};
use serde_json::json;

async fn seeded_collection(total: i64) -> MemoryCollection {
    let database = MemoryDatabase::new();
    let collection = database
        .create_collection(CollectionSchema::new("notes"))
        .expect("collection creates");
    for position in 0..total {
        collection
            .insert(json!({
                "position": position,
                "kind": if position % 2 == 0 { "even" } else { "odd" },
            }))
            .await
            .expect("document inserts");
    }
    collection
}

fn positions(page: &docstore::Page<serde_json::Value>) -> Vec<i64> {
    page.rows
        .iter()
        .filter_map(|row| row.get("position").and_then(serde_json::Value::as_i64))
        .collect()
}

#[tokio::test]
async fn default_options_return_the_first_ten_rows() {
    let collection = seeded_collection(25).await;

    let page = collection
        .paginate(&Filter::all(), &PaginateOptions::new())
        .await
        .expect("paginate succeeds");

    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 10);
    assert_eq!(page.rows.len(), 10);
    assert_eq!(page.total_items, 25);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn zero_limit_returns_metadata_without_rows() {
    let collection = seeded_collection(25).await;

    let page = collection
        .paginate(&Filter::all(), &PaginateOptions::new().limit(0))
        .await
        .expect("paginate succeeds");

    assert!(page.rows.is_empty());
    assert_eq!(page.limit, 0);
    assert_eq!(page.count, 25);
    assert_eq!(page.total_items, 25);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn overshooting_page_clamps_to_the_last_real_page() {
    let collection = seeded_collection(25).await;
    let options = PaginateOptions::new()
        .page(1000)
        .limit(10)
        .sort([SortKey::asc("position")]);

    let page = collection
        .paginate(&Filter::all(), &options)
        .await
        .expect("paginate succeeds");

    assert_eq!(page.total_pages, 3);
    assert_eq!(page.page, 3);
    assert_eq!(positions(&page), vec![20, 21, 22, 23, 24]);
}

#[tokio::test]
async fn limit_above_the_maximum_clamps_to_the_maximum() {
    let collection = seeded_collection(25).await;

    let page = collection
        .paginate(&Filter::all(), &PaginateOptions::new().limit(1000))
        .await
        .expect("paginate succeeds");

    assert_eq!(page.limit, 100);
    assert_eq!(page.rows.len(), 25);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn garbage_page_input_behaves_like_the_first_page() {
    let collection = seeded_collection(25).await;
    let sort = [SortKey::asc("position")];

    let loose = collection
        .paginate(
            &Filter::all(),
            &PaginateOptions::new().page("abc").sort(sort.clone()),
        )
        .await
        .expect("paginate succeeds");
    let explicit = collection
        .paginate(
            &Filter::all(),
            &PaginateOptions::new().page(1).sort(sort),
        )
        .await
        .expect("paginate succeeds");

    assert_eq!(loose, explicit);
}

#[tokio::test]
async fn identical_calls_yield_identical_pages() {
    let collection = seeded_collection(25).await;
    let options = PaginateOptions::new()
        .page(2)
        .limit(7)
        .sort([SortKey::desc("position")]);

    let first = collection
        .paginate(&Filter::all(), &options)
        .await
        .expect("paginate succeeds");
    let second = collection
        .paginate(&Filter::all(), &options)
        .await
        .expect("paginate succeeds");

    assert_eq!(first, second);
}

#[tokio::test]
async fn filters_shrink_the_totals_not_just_the_rows() {
    let collection = seeded_collection(25).await;
    let filter = Filter::new().with("kind", "even");

    let page = collection
        .paginate(&filter, &PaginateOptions::new().limit(5))
        .await
        .expect("paginate succeeds");

    assert_eq!(page.total_items, 13);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.rows.len(), 5);
}
