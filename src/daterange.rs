// src/daterange.rs

use crate::constants;
use crate::error::{AppError, AppResult};
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    Stop,
}

/// 将一对部分精度的日期整数解析为具体的起止日期。
///
/// 支持 `yyyy`、`yyyymm`、`yyyymmdd` 三种精度；起始值缺失的月/日
/// 向最早补齐，结束值向最晚补齐。第二个值缺省时取第一个值。
/// 倒序范围不在此处报错，由下游产生空迭代。
pub fn parse_range(start: i64, stop: Option<i64>) -> AppResult<(NaiveDate, NaiveDate)> {
    let start_date = expand(start, Bound::Start)?;
    let stop_date = expand(stop.unwrap_or(start), Bound::Stop)?;
    Ok((start_date, stop_date))
}

fn expand(value: i64, bound: Bound) -> AppResult<NaiveDate> {
    let invalid = || AppError::InvalidDateFormat(value);
    if !(0..=99_99_99_99).contains(&value) {
        return Err(invalid());
    }
    let (year, month, day) = if value <= 9999 {
        // yyyy
        match bound {
            Bound::Start => (value as i32, 1, 1),
            Bound::Stop => (value as i32, 12, 31),
        }
    } else if value <= 9999_12 {
        // yyyymm
        let (y, m) = ((value / 100) as i32, (value % 100) as u32);
        match bound {
            Bound::Start => (y, m, 1),
            Bound::Stop => {
                let last = last_day_of_month(y, m).ok_or_else(invalid)?;
                (y, m, last)
            }
        }
    } else {
        // yyyymmdd
        (
            (value / 10_000) as i32,
            ((value / 100) % 100) as u32,
            (value % 100) as u32,
        )
    };
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// 某年某月的最后一天，月份非法时返回 None
fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(next_first.pred_opt()?.day())
}

/// "无界"请求的哨兵起始日期 (0000-01-01)
pub fn unbounded_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(constants::UNBOUNDED_START_YEAR, 1, 1).unwrap()
}

/// "无界"请求的哨兵结束日期 (9999-12-31)
pub fn unbounded_stop() -> NaiveDate {
    NaiveDate::from_ymd_opt(constants::UNBOUNDED_STOP_YEAR, 12, 31).unwrap()
}
