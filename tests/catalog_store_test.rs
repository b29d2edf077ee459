// tests/catalog_store_test.rs

use chrono::{NaiveDate, TimeZone, Utc};
use sat_dl::catalog::Catalog;
use sat_dl::error::AppError;
use sat_dl::remote::EntryStat;
use tempfile::TempDir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn entry(name: &str, size: u64) -> EntryStat {
    EntryStat {
        name: name.to_string(),
        size,
        mtime: Utc.with_ymd_and_hms(2020, 6, 12, 8, 30, 0).unwrap(),
    }
}

#[test]
fn test_save_and_reload_roundtrip() {
    let dir = TempDir::new().unwrap();
    let mut catalog = Catalog::new_empty("ftp://h/pub", dir.path(), "MOD021KM");
    catalog.insert_scan(d(2020, 6, 12), &[entry("A.hdf", 100)]);
    catalog.set_converted(d(2020, 6, 12), "A.hdf", Some(88));
    catalog.recompute_envelope();
    catalog.recompute_gaps();

    let path = Catalog::storage_path(dir.path(), "MOD021KM");
    catalog.save(&path).unwrap();

    let reloaded = Catalog::load_or_init("ftp://h/pub", dir.path(), "MOD021KM").unwrap();
    assert_eq!(
        serde_json::to_value(&reloaded).unwrap(),
        serde_json::to_value(&catalog).unwrap()
    );
    // 刚加载的清单未发生变更, 不需要写盘
    assert!(!reloaded.is_dirty());
}

#[test]
fn test_legacy_hidden_catalog_is_found() {
    let dir = TempDir::new().unwrap();
    let mut catalog = Catalog::new_empty("ftp://h/pub", dir.path(), "P");
    catalog.insert_scan(d(2020, 6, 12), &[entry("A.hdf", 100)]);
    let legacy = dir.path().join("P").join(".inventory.json");
    catalog.save(&legacy).unwrap();

    let reloaded = Catalog::load_or_init("ftp://h/pub", dir.path(), "P").unwrap();
    assert!(reloaded.dates.contains_key(&d(2020, 6, 12)));
}

#[test]
fn test_corrupt_catalog_is_not_silently_rebuilt() {
    let dir = TempDir::new().unwrap();
    let path = Catalog::storage_path(dir.path(), "P");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json at all").unwrap();

    // 损坏的清单必须报错, 由调用方决定删除重建还是中止
    let err = Catalog::load_or_init("r", dir.path(), "P").unwrap_err();
    assert!(matches!(err, AppError::CorruptCatalog(_)));
    assert!(path.is_file());
}

#[test]
fn test_moved_local_root_scenario() {
    let old_dir = TempDir::new().unwrap();
    let new_dir = TempDir::new().unwrap();

    let mut catalog = Catalog::new_empty("ftp://h/pub", old_dir.path(), "P");
    catalog.insert_scan(d(2020, 6, 12), &[entry("A.hdf", 100)]);
    catalog.recompute_envelope();
    let path = Catalog::storage_path(old_dir.path(), "P");
    catalog.save(&path).unwrap();

    // 目录整体迁移后重新加载: 路径被修正, 数据不变, 进入待写盘状态
    let mut moved = Catalog::load(&path).unwrap();
    assert!(!moved.is_dirty());
    assert!(moved.mark_moved(new_dir.path()));

    let resolved = dunce::canonicalize(new_dir.path()).unwrap();
    assert_eq!(moved.metadata.local.root, resolved);
    assert_eq!(moved.metadata.local.path, resolved.join("P"));
    assert_eq!(moved.dates, catalog.dates);
    assert!(moved.is_dirty());
}
