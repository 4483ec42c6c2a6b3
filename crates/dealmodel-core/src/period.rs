//! Period arithmetic: period counts, labels, divisors, and spreadsheet
//! serial dates for a date range at a given granularity.

use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ModelGenError;
use crate::ModelGenResult;

/// Spreadsheet date epoch: serial 0 is 1899-12-30. Relative to
/// 1900-01-01 this carries the historical +2 offset (the 1900
/// leap-year anomaly), which date-aware financial functions expect
/// bit-for-bit.
const EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Period granularity of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    Daily,
    Monthly,
    Quarterly,
    #[serde(alias = "annual")]
    Yearly,
}

impl Granularity {
    /// Calendar days assumed per period when counting periods.
    pub fn days_per_period(&self) -> u32 {
        match self {
            Granularity::Daily => 1,
            Granularity::Monthly => 30,
            Granularity::Quarterly => 90,
            Granularity::Yearly => 365,
        }
    }

    /// Divisor converting an annual rate to a per-period rate.
    pub fn divisor(&self) -> Decimal {
        match self {
            Granularity::Daily => dec!(365),
            Granularity::Monthly => dec!(12),
            Granularity::Quarterly => dec!(4),
            Granularity::Yearly => Decimal::ONE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        }
    }
}

/// Per-granularity caps on the period count, bounding generation cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodCaps {
    pub daily: u32,
    pub monthly: u32,
    pub quarterly: u32,
    pub yearly: u32,
}

impl Default for PeriodCaps {
    fn default() -> Self {
        PeriodCaps {
            daily: 1000,
            monthly: 600,
            quarterly: 400,
            yearly: 100,
        }
    }
}

impl PeriodCaps {
    pub fn for_granularity(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Daily => self.daily,
            Granularity::Monthly => self.monthly,
            Granularity::Quarterly => self.quarterly,
            Granularity::Yearly => self.yearly,
        }
    }
}

/// One operating period of the model grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    /// Zero-based index
    pub index: u32,
    /// Human label, e.g. "Q1 2025"
    pub label: String,
    /// Calendar date of the period start
    pub date: NaiveDate,
    /// Spreadsheet serial date of `date`
    pub serial: i64,
}

/// Number of periods covering `start..end`: elapsed days divided by the
/// granularity's day count, rounded up, clamped to the configured cap.
/// Non-negative and monotonic in the range length; an inverted range
/// counts as zero.
pub fn count_periods(
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
    caps: &PeriodCaps,
) -> u32 {
    let elapsed = (end - start).num_days();
    if elapsed <= 0 {
        return 0;
    }
    let days = granularity.days_per_period() as i64;
    let count = (elapsed + days - 1) / days;
    (count as u64).min(caps.for_granularity(granularity) as u64) as u32
}

/// Calendar date of period `index` (zero-based) from `start`.
pub fn period_date(
    start: NaiveDate,
    index: u32,
    granularity: Granularity,
) -> ModelGenResult<NaiveDate> {
    let date = match granularity {
        Granularity::Daily => start.checked_add_days(Days::new(index as u64)),
        Granularity::Monthly => start.checked_add_months(Months::new(index)),
        Granularity::Quarterly => start.checked_add_months(Months::new(index * 3)),
        Granularity::Yearly => start.checked_add_months(Months::new(index * 12)),
    };
    date.ok_or_else(|| {
        ModelGenError::DateError(format!(
            "period {index} ({}) overflows the calendar from {start}",
            granularity.as_str()
        ))
    })
}

/// Human label for period `index`, e.g. "Q1 2025", "Jan 2025", "2025".
pub fn period_label(
    start: NaiveDate,
    index: u32,
    granularity: Granularity,
) -> ModelGenResult<String> {
    let date = period_date(start, index, granularity)?;
    Ok(match granularity {
        Granularity::Daily => date.format("%d %b %Y").to_string(),
        Granularity::Monthly => date.format("%b %Y").to_string(),
        Granularity::Quarterly => {
            let quarter = date.month0() / 3 + 1;
            format!("Q{} {}", quarter, date.year())
        }
        Granularity::Yearly => date.year().to_string(),
    })
}

/// Spreadsheet serial of an arbitrary date: days since 1899-12-30.
pub fn serial_date(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(EPOCH.0, EPOCH.1, EPOCH.2)
        .expect("static epoch date is valid");
    (date - epoch).num_days()
}

/// Spreadsheet serial of period `index` from `start`.
pub fn period_serial(
    start: NaiveDate,
    index: u32,
    granularity: Granularity,
) -> ModelGenResult<i64> {
    Ok(serial_date(period_date(start, index, granularity)?))
}

/// The full period grid for `count` periods from `start`.
pub fn build_grid(
    start: NaiveDate,
    count: u32,
    granularity: Granularity,
) -> ModelGenResult<Vec<Period>> {
    (0..count)
        .map(|index| {
            let date = period_date(start, index, granularity)?;
            Ok(Period {
                index,
                label: period_label(start, index, granularity)?,
                date,
                serial: serial_date(date),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_divisors() {
        assert_eq!(Granularity::Daily.divisor(), dec!(365));
        assert_eq!(Granularity::Monthly.divisor(), dec!(12));
        assert_eq!(Granularity::Quarterly.divisor(), dec!(4));
        assert_eq!(Granularity::Yearly.divisor(), dec!(1));
    }

    #[test]
    fn test_count_periods_rounds_up() {
        let caps = PeriodCaps::default();
        let start = date(2025, 1, 1);
        // 365 days at quarterly (90-day) granularity: ceil(365/90) = 5
        assert_eq!(
            count_periods(start, date(2026, 1, 1), Granularity::Quarterly, &caps),
            5
        );
        // Exactly one yearly period
        assert_eq!(
            count_periods(start, date(2026, 1, 1), Granularity::Yearly, &caps),
            1
        );
        // 31 days monthly: ceil(31/30) = 2
        assert_eq!(
            count_periods(start, date(2025, 2, 1), Granularity::Monthly, &caps),
            2
        );
    }

    #[test]
    fn test_count_periods_non_negative_and_monotonic() {
        let caps = PeriodCaps::default();
        let start = date(2025, 6, 1);
        assert_eq!(count_periods(start, start, Granularity::Daily, &caps), 0);
        assert_eq!(
            count_periods(start, date(2025, 1, 1), Granularity::Daily, &caps),
            0
        );

        let mut prev = 0;
        for months in 1..=24 {
            let end = start.checked_add_months(Months::new(months)).unwrap();
            let n = count_periods(start, end, Granularity::Monthly, &caps);
            assert!(n >= prev, "count must be monotonic in range length");
            prev = n;
        }
    }

    #[test]
    fn test_count_periods_capped() {
        let caps = PeriodCaps::default();
        let start = date(2020, 1, 1);
        let end = date(2030, 1, 1);
        assert_eq!(count_periods(start, end, Granularity::Daily, &caps), 1000);
    }

    #[test]
    fn test_labels() {
        let start = date(2025, 1, 15);
        assert_eq!(
            period_label(start, 0, Granularity::Quarterly).unwrap(),
            "Q1 2025"
        );
        assert_eq!(
            period_label(start, 3, Granularity::Quarterly).unwrap(),
            "Q4 2025"
        );
        assert_eq!(
            period_label(start, 1, Granularity::Monthly).unwrap(),
            "Feb 2025"
        );
        assert_eq!(period_label(start, 2, Granularity::Yearly).unwrap(), "2027");
        assert_eq!(
            period_label(start, 1, Granularity::Daily).unwrap(),
            "16 Jan 2025"
        );
    }

    #[test]
    fn test_serial_date_epoch_offset() {
        // 1900-01-01 is serial 2 relative to the 1899-12-30 epoch
        assert_eq!(serial_date(date(1900, 1, 1)), 2);
        // Known anchor: 2025-01-01 is Excel serial 45658
        assert_eq!(serial_date(date(2025, 1, 1)), 45658);
    }

    #[test]
    fn test_grid() {
        let grid = build_grid(date(2025, 1, 1), 4, Granularity::Quarterly).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0].label, "Q1 2025");
        assert_eq!(grid[3].label, "Q4 2025");
        assert_eq!(grid[1].date, date(2025, 4, 1));
        assert_eq!(grid[0].serial, 45658);
    }
}
