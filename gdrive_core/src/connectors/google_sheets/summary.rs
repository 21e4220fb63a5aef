//! Expense totals over a sheet's value grid.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ConnectorError;
use crate::utils::round_cents;

const UNCATEGORIZED: &str = "Uncategorized";

/// Inclusive `YYYY-MM-DD:YYYY-MM-DD` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn parse(raw: &str) -> Result<Self, ConnectorError> {
        let invalid = || {
            ConnectorError::InvalidParams(format!(
                "date_range must look like YYYY-MM-DD:YYYY-MM-DD, got '{}'",
                raw
            ))
        };
        let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
        let [start, end] = parts.as_slice() else {
            return Err(invalid());
        };
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").map_err(|_| invalid())?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").map_err(|_| invalid())?;
        if start > end {
            return Err(ConnectorError::InvalidParams(format!(
                "date_range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub count: usize,
    pub categories: BTreeMap<String, CategoryTotal>,
    /// Non-blank rows dropped because the date or amount did not parse.
    pub skipped_rows: usize,
}

struct Columns {
    date: usize,
    category: usize,
    amount: usize,
}

impl Columns {
    fn from_header(header: &[Value]) -> Self {
        let find = |name: &str, fallback: usize| {
            header
                .iter()
                .position(|cell| {
                    cell.as_str()
                        .map(|s| s.trim().eq_ignore_ascii_case(name))
                        .unwrap_or(false)
                })
                .unwrap_or(fallback)
        };
        Self {
            date: find("Date", 0),
            category: find("Category", 2),
            amount: find("Amount", 3),
        }
    }
}

fn is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Serial for 9999-12-31; larger numbers in the date column are not dates.
const MAX_SERIAL: f64 = 2_958_466.0;

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, or a spreadsheet serial day number.
pub fn parse_date(cell: &Value) -> Option<NaiveDate> {
    match cell {
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
                .ok()
        }
        Value::Number(n) => {
            let serial = n.as_f64()?;
            if !serial.is_finite() || !(1.0..MAX_SERIAL).contains(&serial) {
                return None;
            }
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            epoch.checked_add_signed(Duration::try_days(serial.floor() as i64)?)
        }
        _ => None,
    }
}

/// Accepts numbers, or strings like `$1,234.50`.
pub fn parse_amount(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn category_label(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => UNCATEGORIZED.to_string(),
    }
}

/// Aggregates every data row below the header row of `values`.
pub fn summarize(values: &[Vec<Value>], range: Option<&DateRange>) -> ExpenseSummary {
    let mut summary = ExpenseSummary::default();
    let Some((header, rows)) = values.split_first() else {
        return summary;
    };
    let cols = Columns::from_header(header);

    for row in rows {
        if row.iter().all(is_blank) {
            continue;
        }
        let date = row.get(cols.date).and_then(parse_date);
        let amount = row.get(cols.amount).and_then(parse_amount);
        let (Some(date), Some(amount)) = (date, amount) else {
            summary.skipped_rows += 1;
            continue;
        };
        if let Some(range) = range {
            if !range.contains(date) {
                continue;
            }
        }
        let entry = summary
            .categories
            .entry(category_label(row.get(cols.category)))
            .or_default();
        entry.total += amount;
        entry.count += 1;
        summary.total += amount;
        summary.count += 1;
    }

    summary.total = round_cents(summary.total);
    for entry in summary.categories.values_mut() {
        entry.total = round_cents(entry.total);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid(rows: Value) -> Vec<Vec<Value>> {
        serde_json::from_value(rows).unwrap()
    }

    fn sample() -> Vec<Vec<Value>> {
        grid(json!([
            ["Date", "Description", "Category", "Amount", "Payment Method", "Notes", "Tags"],
            ["2024-01-05", "Lunch", "Food", 10.0],
            ["2024-02-01", "Snack", "Food", 5.0],
            ["2024-01-10", "Train", "Travel", 20.0]
        ]))
    }

    #[test]
    fn totals_without_filter() {
        let s = summarize(&sample(), None);
        assert_eq!(s.total, 35.0);
        assert_eq!(s.count, 3);
        assert_eq!(
            s.categories["Food"],
            CategoryTotal {
                total: 15.0,
                count: 2
            }
        );
        assert_eq!(
            s.categories["Travel"],
            CategoryTotal {
                total: 20.0,
                count: 1
            }
        );
        assert_eq!(s.skipped_rows, 0);
    }

    #[test]
    fn january_filter_is_inclusive() {
        let range = DateRange::parse("2024-01-01:2024-01-31").unwrap();
        let s = summarize(&sample(), Some(&range));
        assert_eq!(s.total, 30.0);
        assert_eq!(s.count, 2);
        assert_eq!(
            s.categories["Food"],
            CategoryTotal {
                total: 10.0,
                count: 1
            }
        );
        assert_eq!(s.categories["Travel"].total, 20.0);

        let edge = DateRange::parse("2024-01-10:2024-01-10").unwrap();
        assert_eq!(summarize(&sample(), Some(&edge)).count, 1);
    }

    #[test]
    fn malformed_ranges_rejected() {
        for raw in ["2024-01-01", "2024-01-01:2024-13-01", "a:b", "2024-02-01:2024-01-01", "2024-01-01:2024-01-02:2024-01-03"] {
            assert!(DateRange::parse(raw).is_err(), "{}", raw);
        }
    }

    #[test]
    fn unparseable_rows_are_counted_and_blank_rows_ignored() {
        let values = grid(json!([
            ["Date", "Description", "Category", "Amount"],
            ["2024-01-05", "Lunch", "Food", "$1,200.50"],
            ["not a date", "Oops", "Food", 3],
            ["2024-01-06", "Oops", "Food", "abc"],
            ["", "", "", ""],
            [],
            ["2024/01/07", "Misc", "", 4]
        ]));
        let s = summarize(&values, None);
        assert_eq!(s.count, 2);
        assert_eq!(s.total, 1204.5);
        assert_eq!(s.skipped_rows, 2);
        assert_eq!(s.categories[UNCATEGORIZED].total, 4.0);
    }

    #[test]
    fn header_lookup_by_name() {
        let values = grid(json!([
            ["Amount", "Category", "Date"],
            [7.25, "Books", "2024-03-01"]
        ]));
        let s = summarize(&values, None);
        assert_eq!(s.categories["Books"].total, 7.25);
    }

    #[test]
    fn serial_dates_and_empty_grids() {
        assert_eq!(
            parse_date(&json!(45296)),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(parse_date(&json!(0)), None);
        assert_eq!(summarize(&[], None), ExpenseSummary::default());
        assert_eq!(summarize(&sample()[..1], None).count, 0);
    }

    #[test]
    fn out_of_range_serials_are_skipped() {
        assert_eq!(parse_date(&json!(1.0e15)), None);
        assert_eq!(parse_date(&json!(2_958_466)), None);
        assert_eq!(
            parse_date(&json!(2_958_465)),
            NaiveDate::from_ymd_opt(9999, 12, 31)
        );

        let rows = grid(json!([
            ["Date", "Description", "Category", "Amount"],
            [1.0e15, "order id in the wrong column", "Food", 3.0],
            ["2024-01-05", "Lunch", "Food", 10.0]
        ]));
        let s = summarize(&rows, None);
        assert_eq!(s.count, 1);
        assert_eq!(s.skipped_rows, 1);
        assert_eq!(s.total, 10.0);
    }
}
