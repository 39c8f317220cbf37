//! Fiscal-year partition policy shared by the merger (writes) and the
//! resolver (bounded reads).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::canonical::{fiscal_year, fiscal_year_of};

/// Partitions scanned when a contract has no usable start date.
pub const FALLBACK_WINDOW_YEARS: i32 = 5;

/// Directory name of one partition in the columnar layout.
pub fn partition_dir_name(fiscal_year: i32) -> String {
    format!("fiscal_year={fiscal_year}")
}

pub fn current_fiscal_year(today: NaiveDate) -> i32 {
    fiscal_year(today)
}

/// Inclusive range of fiscal-year partitions a query may touch. An inverted
/// range is empty and scans nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionWindow {
    pub first: i32,
    pub last: i32,
}

impl PartitionWindow {
    pub fn new(first: i32, last: i32) -> Self {
        Self { first, last }
    }

    /// One year before the start fiscal year through two years after the end
    /// fiscal year (or the current fiscal year when open-ended), capped at the
    /// newest partition known to hold data.
    pub fn for_contract(
        start_date: Option<&str>,
        end_date: Option<&str>,
        today: NaiveDate,
        newest_with_data: i32,
    ) -> Self {
        let current = current_fiscal_year(today);
        let Some(start_fy) = start_date.and_then(fiscal_year_of) else {
            return Self::most_recent(newest_with_data, today, FALLBACK_WINDOW_YEARS);
        };
        let end_fy = end_date.and_then(fiscal_year_of);
        let last = end_fy.map(|fy| fy + 2).unwrap_or(current);
        Self {
            first: start_fy - 1,
            last: last.min(newest_with_data),
        }
    }

    /// The `years` newest partitions that can hold data, never past today's
    /// fiscal year.
    pub fn most_recent(newest_with_data: i32, today: NaiveDate, years: i32) -> Self {
        let last = current_fiscal_year(today).min(newest_with_data);
        Self {
            first: last - (years.max(1) - 1),
            last,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    pub fn contains(&self, fiscal_year: i32) -> bool {
        (self.first..=self.last).contains(&fiscal_year)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.first..=self.last
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.last - self.first + 1) as usize
        }
    }
}
