// src/sync.rs

use crate::catalog::Catalog;
use crate::constants;
use crate::daterange;
use crate::error::{AppError, AppResult};
use crate::remote::{RemoteArchive, RemoteError, join_remote};
use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}_\d{2}_\d{2}$").unwrap());

/// 一次同步的汇总：扫描的日期数与跳过的年份 (含原因)
#[derive(Debug, Default)]
pub struct SyncReport {
    pub scanned_dates: usize,
    pub skipped_years: Vec<(i32, String)>,
}

/// 远程目录树遍历与清单调和。
///
/// 年份严格顺序处理：后处理年份的"已知"判断依赖先处理年份
/// 写入清单的状态。
pub struct SyncEngine<'a> {
    archive: &'a dyn RemoteArchive,
    product: String,
}

impl<'a> SyncEngine<'a> {
    pub fn new(archive: &'a dyn RemoteArchive, product: impl Into<String>) -> Self {
        Self {
            archive,
            product: product.into(),
        }
    }

    /// 使清单与远程目录树一致。
    ///
    /// 增量路径只重查范围之外的年份与不完整的边界年份；
    /// `resync` 路径清空全部已知状态后重查所有年份。
    pub async fn refresh(
        &self,
        catalog: &mut Catalog,
        requested: (NaiveDate, NaiveDate),
        resync: bool,
    ) -> AppResult<SyncReport> {
        let mut report = SyncReport::default();

        let years = self.candidate_years().await?;
        debug!("远程年份目录: {:?}", years);

        if resync {
            info!("强制重扫: 清空既有日期与缺口记录");
            catalog.begin_resync();
        }

        for year in years {
            if !resync && !year_needs_scan(catalog, year) {
                debug!("年份 {} 已完整覆盖，跳过", year);
                continue;
            }
            match self.scan_year(catalog, year).await {
                Ok(count) => report.scanned_dates += count,
                Err(AppError::Remote(e)) if !matches!(e, RemoteError::ConnectionLost(_)) => {
                    report.skipped_years.push((year, e.to_string()));
                }
                Err(e) => return Err(e),
            }
            catalog.recompute_envelope();
        }

        catalog.recompute_gaps();
        self.report_gaps(catalog, requested);
        catalog.end_sync();

        if !report.skipped_years.is_empty() {
            let detail = report
                .skipped_years
                .iter()
                .map(|(y, reason)| format!("{} ({})", y, reason))
                .join(", ");
            warn!("以下年份目录无法访问，已跳过: {}", detail);
        }
        Ok(report)
    }

    /// 列出产品目录下的年份目录
    async fn candidate_years(&self) -> AppResult<Vec<i32>> {
        let names = self.archive.list(&self.product).await.map_err(|e| match e {
            RemoteError::NotFound(_) => AppError::InvalidProduct(self.product.clone()),
            other => AppError::Remote(other),
        })?;
        let mut years: Vec<i32> = names
            .iter()
            .filter(|n| YEAR_RE.is_match(n))
            .filter_map(|n| n.parse().ok())
            .collect();
        years.sort_unstable();
        Ok(years)
    }

    /// 扫描一个年份目录下所有尚未确认的日期目录
    async fn scan_year(&self, catalog: &mut Catalog, year: i32) -> AppResult<usize> {
        let year_path = join_remote(&self.product, &year.to_string());
        let names = self.archive.list(&year_path).await?;

        let mut scanned = 0;
        for name in names {
            if !DATE_RE.is_match(&name) {
                debug!("忽略非日期目录 '{}/{}'", year_path, name);
                continue;
            }
            let Ok(date) = NaiveDate::parse_from_str(&name, constants::REMOTE_DATE_FORMAT) else {
                debug!("目录名 '{}' 不是有效日期", name);
                continue;
            };
            // 已确认的缺口与已有文件记录的日期不再重查
            if catalog.gaps.contains(&date) {
                continue;
            }
            if catalog.dates.get(&date).is_some_and(|r| !r.is_empty()) {
                continue;
            }

            let date_path = join_remote(&year_path, &name);
            let mut entries = self.archive.stat_scan(&date_path).await?;
            if entries.is_empty() {
                debug!("日期目录 '{}' 为空", date_path);
                continue;
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            catalog.insert_scan(date, &entries);
            scanned += 1;
            debug!("已记录 {} ({} 个文件)", date_path, entries.len());
        }
        Ok(scanned)
    }

    /// 人类可读的缺口汇报，限制在请求范围内；
    /// 请求超出已知范围时告警 (无界哨兵除外)。
    fn report_gaps(&self, catalog: &Catalog, requested: (NaiveDate, NaiveDate)) {
        let (req_start, req_stop) = requested;
        let db = &catalog.metadata.database;
        if catalog.is_empty() {
            warn!("产品 '{}' 在远程档案中没有任何数据", self.product);
            return;
        }

        if req_start < db.start && req_start != daterange::unbounded_start() {
            warn!(
                "请求范围早于已知数据起点 {} (产品 '{}')",
                db.start, self.product
            );
        }
        if req_stop > db.stop && req_stop != daterange::unbounded_stop() {
            warn!(
                "请求范围晚于已知数据终点 {} (产品 '{}')",
                db.stop, self.product
            );
        }

        let in_range: Vec<NaiveDate> = catalog
            .gaps
            .iter()
            .copied()
            .filter(|d| *d >= req_start && *d <= req_stop)
            .collect();
        if in_range.is_empty() {
            return;
        }
        let ranges = collapse_ranges(&in_range);
        let detail = ranges
            .iter()
            .map(|(a, b)| {
                if a == b {
                    a.to_string()
                } else {
                    format!("{} ~ {}", a, b)
                }
            })
            .join(", ");
        warn!(
            "请求范围内有 {} 个无数据日期: {}",
            in_range.len(),
            detail
        );
    }
}

/// 年份过滤 (增量路径)：范围外的年份、以及起止所在的
/// 不完整边界年份需要重查。
fn year_needs_scan(catalog: &Catalog, year: i32) -> bool {
    if catalog.is_empty() {
        return true;
    }
    let (start, stop) = (
        catalog.metadata.database.start,
        catalog.metadata.database.stop,
    );
    if year < start.year() || year > stop.year() {
        return true;
    }
    if year == start.year() && !(start.month() == 1 && start.day() == 1) {
        return true;
    }
    if year == stop.year() && !(stop.month() == 12 && stop.day() == 31) {
        return true;
    }
    false
}

/// 将有序日期序列折叠为连续区间
pub fn collapse_ranges(dates: &[NaiveDate]) -> Vec<(NaiveDate, NaiveDate)> {
    let mut ranges: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for &d in dates {
        match ranges.last_mut() {
            Some((_, stop)) if stop.succ_opt() == Some(d) => *stop = d,
            _ => ranges.push((d, d)),
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_collapse_ranges() {
        let dates = vec![
            d(2020, 6, 13),
            d(2020, 6, 14),
            d(2020, 6, 16),
            d(2020, 7, 1),
            d(2020, 7, 2),
        ];
        assert_eq!(
            collapse_ranges(&dates),
            vec![
                (d(2020, 6, 13), d(2020, 6, 14)),
                (d(2020, 6, 16), d(2020, 6, 16)),
                (d(2020, 7, 1), d(2020, 7, 2)),
            ]
        );
    }

    #[test]
    fn test_year_filter_boundaries() {
        let mut catalog = Catalog::new_empty("r", std::path::Path::new("/data"), "P");
        // 空清单: 所有年份都需扫描
        assert!(year_needs_scan(&catalog, 2019));

        catalog.insert_scan(
            d(2019, 3, 5),
            &[crate::remote::EntryStat {
                name: "A.hdf".into(),
                size: 1,
                mtime: chrono::Utc::now(),
            }],
        );
        catalog.insert_scan(
            d(2021, 6, 1),
            &[crate::remote::EntryStat {
                name: "B.hdf".into(),
                size: 1,
                mtime: chrono::Utc::now(),
            }],
        );
        catalog.recompute_envelope();

        // 范围外
        assert!(year_needs_scan(&catalog, 2018));
        assert!(year_needs_scan(&catalog, 2022));
        // 不完整的边界年份
        assert!(year_needs_scan(&catalog, 2019));
        assert!(year_needs_scan(&catalog, 2021));
        // 完整覆盖的内部年份
        assert!(!year_needs_scan(&catalog, 2020));
    }
}
