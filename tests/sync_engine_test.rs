// tests/sync_engine_test.rs

use chrono::{NaiveDate, TimeZone, Utc};
use sat_dl::catalog::Catalog;
use sat_dl::daterange;
use sat_dl::remote::MemoryArchive;
use sat_dl::sync::SyncEngine;
use std::path::Path;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn mtime(y: i32, m: u32, day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, 12, 0, 0).unwrap()
}

fn range(y: i32) -> (NaiveDate, NaiveDate) {
    daterange::parse_range(y as i64, None).unwrap()
}

#[tokio::test]
async fn test_fresh_sync_records_remote_stats() {
    // --- Arrange: 远程只有 2020_06_12 下的一个文件 ---
    let archive = MemoryArchive::new();
    archive.add_file("MOD021KM/2020/2020_06_12/A.hdf", 100, mtime(2020, 6, 12));

    let mut catalog = Catalog::new_empty("ftp://h/pub", Path::new("/data"), "MOD021KM");
    let engine = SyncEngine::new(&archive, "MOD021KM");

    // --- Act ---
    let report = engine.refresh(&mut catalog, range(2020), false).await.unwrap();

    // --- Assert ---
    assert_eq!(report.scanned_dates, 1);
    let stat = &catalog.dates[&d(2020, 6, 12)]["A.hdf"];
    assert_eq!(stat.size, 100);
    assert_eq!(stat.mtime, mtime(2020, 6, 12));
    assert_eq!(stat.converted, None);
    assert_eq!(catalog.metadata.database.start, d(2020, 6, 12));
    assert_eq!(catalog.metadata.database.stop, d(2020, 6, 12));
    assert_eq!(catalog.metadata.file.ext, ".hdf");
    assert_eq!(catalog.metadata.file.count, 1);
    assert!(catalog.temp.is_empty());
}

#[tokio::test]
async fn test_gap_correctness() {
    let archive = MemoryArchive::new();
    archive.add_file("P/2020/2020_06_12/A.hdf", 10, mtime(2020, 6, 12));
    archive.add_file("P/2020/2020_06_15/B.hdf", 20, mtime(2020, 6, 15));
    // 空日期目录不算已知数据
    archive.add_dir("P/2020/2020_06_14");

    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();

    let gaps: Vec<NaiveDate> = catalog.gaps.iter().copied().collect();
    assert_eq!(gaps, vec![d(2020, 6, 13), d(2020, 6, 14)]);
    assert_eq!(catalog.metadata.database.missing, 2);

    // gaps ∪ keys(dates) 覆盖整个已知范围, 且两者不相交
    let mut day = catalog.metadata.database.start;
    while day <= catalog.metadata.database.stop {
        assert!(catalog.dates.contains_key(&day) ^ catalog.gaps.contains(&day));
        day = day.succ_opt().unwrap();
    }
}

#[tokio::test]
async fn test_incremental_sync_is_idempotent() {
    let archive = MemoryArchive::new();
    archive.add_file("P/2020/2020_06_12/A.hdf", 10, mtime(2020, 6, 12));
    archive.add_file("P/2020/2020_06_13/B.hdf", 20, mtime(2020, 6, 13));

    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();

    let snapshot = serde_json::to_value(&catalog).unwrap();
    let updated_before = catalog.metadata.database.updated;

    // 远程无变化时再次同步: 清单内容不变, updated 不推进
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();
    assert_eq!(serde_json::to_value(&catalog).unwrap(), snapshot);
    assert_eq!(catalog.metadata.database.updated, updated_before);
    assert!(!catalog.is_dirty_since(updated_before));
}

#[tokio::test]
async fn test_incremental_sync_picks_up_new_dates_in_boundary_year() {
    let archive = MemoryArchive::new();
    archive.add_file("P/2020/2020_06_12/A.hdf", 10, mtime(2020, 6, 12));

    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();

    // 边界年份不完整, 新出现的日期目录会在下次同步被发现
    archive.add_file("P/2020/2020_06_20/C.hdf", 30, mtime(2020, 6, 20));
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();

    assert!(catalog.dates.contains_key(&d(2020, 6, 20)));
    assert_eq!(catalog.metadata.database.stop, d(2020, 6, 20));
}

#[tokio::test]
async fn test_resync_is_superset_and_preserves_converted() {
    let archive = MemoryArchive::new();
    archive.add_file("P/2019/2019_12_30/A.hdf", 10, mtime(2019, 12, 30));
    archive.add_file("P/2020/2020_01_02/B.hdf", 20, mtime(2020, 1, 2));

    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    engine
        .refresh(&mut catalog, (d(2019, 1, 1), d(2020, 12, 31)), false)
        .await
        .unwrap();
    catalog.set_converted(d(2019, 12, 30), "A.hdf", Some(8));

    let keys_before: Vec<NaiveDate> = catalog.dates.keys().copied().collect();

    // 远程不变的前提下强制重扫: 日期集合不缩小, converted 经 temp 恢复
    engine
        .refresh(&mut catalog, (d(2019, 1, 1), d(2020, 12, 31)), true)
        .await
        .unwrap();

    let keys_after: Vec<NaiveDate> = catalog.dates.keys().copied().collect();
    assert_eq!(keys_after, keys_before);
    assert_eq!(catalog.dates[&d(2019, 12, 30)]["A.hdf"].converted, Some(8));
    assert!(catalog.temp.is_empty());
}

#[tokio::test]
async fn test_confirmed_gap_not_rescanned() {
    let archive = MemoryArchive::new();
    archive.add_file("P/2020/2020_06_12/A.hdf", 10, mtime(2020, 6, 12));
    archive.add_file("P/2020/2020_06_14/B.hdf", 20, mtime(2020, 6, 14));

    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();
    assert!(catalog.gaps.contains(&d(2020, 6, 13)));

    // 缺口日期事后在远程出现目录: 增量路径不会重查已确认的缺口
    archive.add_file("P/2020/2020_06_13/C.hdf", 30, mtime(2020, 6, 13));
    engine.refresh(&mut catalog, range(2020), false).await.unwrap();
    assert!(!catalog.dates.contains_key(&d(2020, 6, 13)));

    // 强制重扫会重新发现它
    engine.refresh(&mut catalog, range(2020), true).await.unwrap();
    assert!(catalog.dates.contains_key(&d(2020, 6, 13)));
    assert!(!catalog.gaps.contains(&d(2020, 6, 13)));
}

#[tokio::test]
async fn test_non_year_entries_ignored() {
    let archive = MemoryArchive::new();
    archive.add_file("P/2020/2020_06_12/A.hdf", 10, mtime(2020, 6, 12));
    archive.add_dir("P/doc");
    archive.add_file("P/README.txt", 1, mtime(2020, 1, 1));

    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    let report = engine.refresh(&mut catalog, range(2020), false).await.unwrap();
    assert_eq!(report.scanned_dates, 1);
    assert!(report.skipped_years.is_empty());
}

#[tokio::test]
async fn test_missing_product_is_invalid() {
    let archive = MemoryArchive::new();
    archive.add_dir("OTHER");
    let mut catalog = Catalog::new_empty("r", Path::new("/data"), "P");
    let engine = SyncEngine::new(&archive, "P");
    let err = engine
        .refresh(&mut catalog, range(2020), false)
        .await
        .unwrap_err();
    assert!(matches!(err, sat_dl::error::AppError::InvalidProduct(p) if p == "P"));
}
