use scan_inventory::{
    Category, CategoryId, Config, ConsistencyCoordinator, ConsistencyWarning, DecodeEvent,
    Document, InventoryEntry, ScanDebouncer, Storage,
};
use std::collections::HashSet;
use tempfile::TempDir;

async fn open(dir: &TempDir) -> (ConsistencyCoordinator, Storage) {
    let config = Config::with_data_dir(dir.path());
    let storage = Storage::open(&config).unwrap();
    let coordinator = ConsistencyCoordinator::open(storage.store.clone()).await;
    (coordinator, storage)
}

fn keyed(entries: &[InventoryEntry]) -> HashSet<(String, Option<CategoryId>, u32)> {
    entries
        .iter()
        .map(|e| (e.value.clone(), e.category_id.clone(), e.count))
        .collect()
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = TempDir::new().unwrap();

    let parts_id = {
        let (mut coordinator, _storage) = open(&dir).await;
        let parts = coordinator.add_category("Parts").await.unwrap();
        coordinator.record_scan("0012345", Some(&parts.id)).await.unwrap();
        coordinator.record_scan("0012345", Some(&parts.id)).await.unwrap();
        coordinator.record_scan("0012345", None).await.unwrap();
        coordinator.shutdown().await.unwrap();
        parts.id
    };

    let (coordinator, _storage) = open(&dir).await;
    assert_eq!(coordinator.categories().len(), 1);
    assert_eq!(coordinator.categories()[0].name, "Parts");
    assert_eq!(
        keyed(coordinator.entries()),
        [
            ("0012345".to_string(), Some(parts_id), 2),
            ("0012345".to_string(), None, 1),
        ]
        .into_iter()
        .collect()
    );
    assert!(coordinator.startup_warnings().is_empty());
}

#[tokio::test]
async fn interrupted_cascade_is_repaired_on_next_start() {
    let dir = TempDir::new().unwrap();

    {
        let (mut coordinator, _storage) = open(&dir).await;
        let c1 = coordinator.add_category("C1").await.unwrap();
        coordinator.record_scan("A", Some(&c1.id)).await.unwrap();
        coordinator.record_scan("B", Some(&c1.id)).await.unwrap();
        coordinator.shutdown().await.unwrap();
    }

    // Categories were rewritten without C1, then the process died before
    // the entries followed
    {
        let config = Config::with_data_dir(dir.path());
        let storage = Storage::open(&config).unwrap();
        let none: Vec<Category> = Vec::new();
        storage.store.save(Document::Categories, &none).await.unwrap();
    }

    let (coordinator, storage) = open(&dir).await;
    assert!(coordinator.categories().is_empty());
    assert!(coordinator.entries().iter().all(|e| e.category_id.is_none()));
    assert_eq!(
        coordinator.startup_warnings(),
        &[ConsistencyWarning::RepairedEntries { count: 2 }]
    );

    let persisted: Vec<InventoryEntry> = storage.store.load(Document::Entries).await;
    assert!(persisted.iter().all(|e| e.category_id.is_none()));
}

#[tokio::test]
async fn data_files_are_plain_json_arrays() {
    let dir = TempDir::new().unwrap();
    let (mut coordinator, storage) = open(&dir).await;
    let parts = coordinator.add_category("Parts").await.unwrap();
    coordinator.record_scan("0012345", Some(&parts.id)).await.unwrap();
    coordinator.record_scan("999", None).await.unwrap();

    let raw = std::fs::read_to_string(storage.files.data_dir().join("entries.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["value"], "0012345");
    assert_eq!(records[0]["count"], 1);
    assert_eq!(records[0]["categoryId"], parts.id.as_str());
    assert!(records[1]["categoryId"].is_null());

    let raw = std::fs::read_to_string(storage.files.data_dir().join("categories.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[0]["name"], "Parts");
    assert_eq!(json[0]["id"], parts.id.as_str());
}

#[tokio::test]
async fn missing_file_copy_loads_from_key_value_store() {
    let dir = TempDir::new().unwrap();
    {
        let (mut coordinator, storage) = open(&dir).await;
        coordinator.add_category("Parts").await.unwrap();
        coordinator.record_scan("A", None).await.unwrap();
        coordinator.shutdown().await.unwrap();

        std::fs::remove_file(storage.files.data_dir().join("entries.json")).unwrap();
        std::fs::write(storage.files.data_dir().join("categories.json"), "{truncated").unwrap();
    }

    let (coordinator, _storage) = open(&dir).await;
    assert_eq!(coordinator.categories().len(), 1);
    assert_eq!(coordinator.entries().len(), 1);
    assert_eq!(coordinator.entries()[0].value, "A");
}

#[tokio::test]
async fn export_writes_one_line_per_entry() {
    let dir = TempDir::new().unwrap();
    let (mut coordinator, storage) = open(&dir).await;
    let parts = coordinator.add_category("Parts").await.unwrap();
    coordinator.record_scan("A", Some(&parts.id)).await.unwrap();
    coordinator.record_scan("A", Some(&parts.id)).await.unwrap();
    coordinator.record_scan("B", None).await.unwrap();

    let path = storage
        .files
        .save_export_file(&coordinator.export_text(), "barcodes")
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "A x2 (Parts)\nB (No Category)\n"
    );
}

#[tokio::test]
async fn debounced_burst_records_one_scan() {
    let dir = TempDir::new().unwrap();
    let (mut coordinator, _storage) = open(&dir).await;
    let parts = coordinator.add_category("Parts").await.unwrap();

    let mut debouncer = ScanDebouncer::default();
    debouncer.select_category(Some(parts.id.clone()));

    // One frame decodes the same symbol repeatedly
    let accepted: Vec<_> = (0..10)
        .filter_map(|_| debouncer.on_decode(DecodeEvent::now("0012345")))
        .collect();
    assert_eq!(accepted.len(), 1);
    coordinator.record_accepted(&accepted[0]).await.unwrap();

    assert_eq!(coordinator.entries().len(), 1);
    assert_eq!(coordinator.entries()[0].count, 1);
    assert_eq!(coordinator.entries()[0].category_id, Some(parts.id));
}

#[tokio::test]
async fn rename_and_recategorize_survive_restart() {
    let dir = TempDir::new().unwrap();

    let (parts_id, tools_id) = {
        let (mut coordinator, _storage) = open(&dir).await;
        let parts = coordinator.add_category("Parts").await.unwrap();
        let tools = coordinator.add_category("Tools").await.unwrap();
        let entry = coordinator
            .record_scan("0012345", Some(&parts.id))
            .await
            .unwrap()
            .entry_id()
            .clone();

        coordinator
            .rename_category(&parts.id, "Spare Parts")
            .await
            .unwrap();
        coordinator
            .set_category(&entry, Some(tools.id.clone()))
            .await
            .unwrap();
        // Dropped without shutdown: every change was already saved
        (parts.id, tools.id)
    };

    let (coordinator, _storage) = open(&dir).await;
    let names: Vec<(&CategoryId, &str)> = coordinator
        .categories()
        .iter()
        .map(|c| (&c.id, c.name.as_str()))
        .collect();
    assert_eq!(names, vec![(&parts_id, "Spare Parts"), (&tools_id, "Tools")]);
    assert_eq!(coordinator.entries().len(), 1);
    assert_eq!(coordinator.entries()[0].category_id, Some(tools_id));
}

#[tokio::test]
async fn padded_values_stay_distinct_across_restart() {
    let dir = TempDir::new().unwrap();
    {
        let (mut coordinator, _storage) = open(&dir).await;
        coordinator.record_scan(" AB", None).await.unwrap();
        coordinator.record_scan("AB", None).await.unwrap();
        coordinator.shutdown().await.unwrap();
    }

    let (coordinator, _storage) = open(&dir).await;
    let values: Vec<&str> = coordinator.entries().iter().map(|e| e.value.as_str()).collect();
    assert_eq!(values, vec![" AB", "AB"]);
}
