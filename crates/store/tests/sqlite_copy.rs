//! Copying a populated SQLite file into another backend.

use vitalbot_core::reading::{NewReading, Subject};
use vitalbot_core::store::RecordStore;
use vitalbot_store::{InMemoryStore, SqliteStore, copy_records};

#[tokio::test]
async fn sqlite_file_copies_into_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bp_data.db");
    let source = SqliteStore::open(path.to_str().unwrap(), 1).await.unwrap();
    source.initialize().await.unwrap();

    let alice = Subject::new("staff-1", "Alice");
    let bob = Subject::new("staff-2", "Bob");
    for (subject, systolic) in [(&alice, 118), (&bob, 165), (&alice, 142)] {
        let new = NewReading {
            systolic: Some(systolic),
            diastolic: Some(85),
            pulse: Some(72),
            label: Some("normal".into()),
            ..NewReading::for_subject(subject)
        };
        source.append(new).await.unwrap();
    }

    let destination = SqliteStore::open(dir.path().join("copy.db").to_str().unwrap(), 1)
        .await
        .unwrap();
    destination.initialize().await.unwrap();

    let report = copy_records(&source, &destination).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.copied, 3);
    assert_eq!(report.failed, 0);

    let original = source.history("staff-1", 10).await;
    let copied = destination.history("staff-1", 10).await;
    assert_eq!(copied.len(), 2);
    assert_eq!(
        copied.iter().map(|r| &r.created_at).collect::<Vec<_>>(),
        original.iter().map(|r| &r.created_at).collect::<Vec<_>>()
    );
    assert_eq!(destination.history("staff-2", 10).await[0].systolic, Some(165));
}

#[tokio::test]
async fn copy_into_memory_keeps_names() {
    let dir = tempfile::tempdir().unwrap();
    let source = SqliteStore::open(dir.path().join("bp.db").to_str().unwrap(), 1)
        .await
        .unwrap();
    source.initialize().await.unwrap();
    source
        .append(NewReading::for_subject(&Subject::new("u9", "王五")))
        .await
        .unwrap();

    let destination = InMemoryStore::new();
    copy_records(&source, &destination).await.unwrap();

    let page = destination.history("u9", 10).await;
    assert_eq!(page[0].subject_name.as_deref(), Some("王五"));
}
