use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::datetime::{display_weeknum, full_year_span, normalize_cell, weekday_index};
use crate::error::HeatmapError;
use crate::table::Table;

/// One calendar day on the heatmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,

    pub value: u64,

    /// 0 = Monday .. 6 = Sunday
    pub weekday: u32,

    /// 0..=53, see [`display_weeknum`]
    pub weeknum: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<u8>,
}

impl DayRecord {
    pub fn new(date: NaiveDate, value: u64) -> Self {
        Self {
            date,
            value,
            weekday: weekday_index(date),
            weeknum: display_weeknum(date),
            event: None,
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn is_month_start(&self) -> bool {
        self.date.day() == 1
    }
}

/// Which columns to read and how to interpret their dates.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub date_col: String,
    pub value_col: String,
    pub timezone: Option<Tz>,
}

impl InputSpec {
    pub fn new(date_col: impl Into<String>, value_col: impl Into<String>) -> Self {
        Self {
            date_col: date_col.into(),
            value_col: value_col.into(),
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }
}

/// Daily counts covering whole years, one record per calendar day.
#[derive(Debug, Clone, Default)]
pub struct DayTable {
    records: Vec<DayRecord>,
    years: Vec<i32>,
}

impl DayTable {
    /// Counts rows per day and fills the gaps.
    ///
    /// A row contributes to its day's count only when its value cell is
    /// present; rows with a missing or unreadable date are skipped. The
    /// resulting span runs from Jan 1 of the earliest observed year to
    /// Dec 31 of the latest.
    #[tracing::instrument(skip(table, spec), fields(rows = table.len(), date_col = %spec.date_col, value_col = %spec.value_col))]
    pub fn build(table: &Table, spec: &InputSpec) -> anyhow::Result<Self> {
        if table.is_empty() {
            warn!("input table is empty; no years to display");
            return Ok(Self::default());
        }

        table.require_column(&spec.date_col)?;
        table.require_column(&spec.value_col)?;

        let mut observed: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        let mut skipped = 0usize;

        for (idx, row) in table.rows().iter().enumerate() {
            let date = Table::cell(row, &spec.date_col)
                .and_then(|cell| normalize_cell(cell, spec.timezone.as_ref()));
            let Some(date) = date else {
                skipped += 1;
                debug!(row = idx, cell = ?row.get(&spec.date_col), "skipping row without a usable date");
                continue;
            };

            let count = observed.entry(date).or_insert(0);
            if Table::cell(row, &spec.value_col).is_some() {
                *count += 1;
            }
        }

        if skipped > 0 {
            warn!(skipped, "rows with missing or unparseable dates were ignored");
        }

        Ok(Self::from_counts(observed))
    }

    /// Builds the full span from already aggregated per-day counts.
    ///
    /// Every key counts as observed, so a day mapped to 0 still brings its
    /// year into range.
    pub fn from_counts(observed: BTreeMap<NaiveDate, u64>) -> Self {
        let mut years: Vec<i32> = observed.keys().map(Datelike::year).collect();
        years.dedup();

        let (Some(first), Some(last)) = (years.first().copied(), years.last().copied()) else {
            return Self::default();
        };

        let records: Vec<DayRecord> = full_year_span(first, last)
            .into_iter()
            .map(|date| DayRecord::new(date, observed.get(&date).copied().unwrap_or(0)))
            .collect();

        info!(
            days = records.len(),
            observed_days = observed.len(),
            first_year = first,
            last_year = last,
            "built day table"
        );

        Self { records, years }
    }

    pub fn records(&self) -> &[DayRecord] {
        &self.records
    }

    /// Years that had at least one readable row, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    /// The records of a single observed year.
    pub fn select_year(&self, year: i32) -> Result<&[DayRecord], HeatmapError> {
        if !self.contains_year(year) {
            return Err(HeatmapError::YearNotInData {
                year,
                available: self.years.clone(),
            });
        }

        let start = self.records.partition_point(|rec| rec.year() < year);
        let end = self.records.partition_point(|rec| rec.year() <= year);
        Ok(&self.records[start..end])
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.position(date).map(|idx| &self.records[idx])
    }

    /// Drops every event mark.
    pub fn clear_events(&mut self) {
        for record in &mut self.records {
            record.event = None;
        }
    }

    pub(crate) fn get_mut(&mut self, date: NaiveDate) -> Option<&mut DayRecord> {
        self.position(date).map(|idx| &mut self.records[idx])
    }

    fn position(&self, date: NaiveDate) -> Option<usize> {
        self.records.binary_search_by_key(&date, |rec| rec.date).ok()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    use super::{DayTable, InputSpec};
    use crate::error::HeatmapError;
    use crate::table::{Row, Table};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn row(date: serde_json::Value, value: serde_json::Value) -> Row {
        let mut row = Row::new();
        row.insert("date".to_string(), date);
        row.insert("value".to_string(), value);
        row
    }

    fn spec() -> InputSpec {
        InputSpec::new("date", "value")
    }

    #[test]
    fn counts_rows_per_day_and_fills_the_year() {
        let table = Table::from_rows(vec![
            row(json!("2023-01-01"), json!("a")),
            row(json!("2023-01-01 23:59:59"), json!("b")),
            row(json!("2023-12-31"), json!("c")),
        ]);

        let days = DayTable::build(&table, &spec()).expect("build");

        assert_eq!(days.len(), 365);
        assert_eq!(days.years(), [2023]);
        assert_eq!(days.get(ymd(2023, 1, 1)).map(|r| r.value), Some(2));
        assert_eq!(days.get(ymd(2023, 12, 31)).map(|r| r.value), Some(1));

        let total: u64 = days.records().iter().map(|r| r.value).sum();
        assert_eq!(total, 3);
        assert_eq!(
            days.records().iter().filter(|r| r.value == 0).count(),
            363
        );
    }

    #[test]
    fn null_values_are_not_counted_but_keep_the_year() {
        let table = Table::from_rows(vec![
            row(json!("2021-06-01"), json!("x")),
            row(json!("2022-03-05"), json!(null)),
        ]);

        let days = DayTable::build(&table, &spec()).expect("build");

        assert_eq!(days.years(), [2021, 2022]);
        assert_eq!(days.len(), 365 + 365);
        assert_eq!(days.get(ymd(2022, 3, 5)).map(|r| r.value), Some(0));
    }

    #[test]
    fn unparseable_dates_are_skipped() {
        let table = Table::from_rows(vec![
            row(json!("not a date"), json!("x")),
            row(json!("2020-02-29"), json!("y")),
        ]);

        let days = DayTable::build(&table, &spec()).expect("build");

        assert_eq!(days.years(), [2020]);
        assert_eq!(days.len(), 366);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = Table::from_rows(vec![row(json!("2020-01-01"), json!(1))]);
        let err = DayTable::build(&table, &InputSpec::new("date", "count"))
            .expect_err("missing column");

        assert!(err.to_string().contains("count"));
    }

    #[test]
    fn selecting_an_absent_year_fails() {
        let table = Table::from_rows(vec![
            row(json!("2020-05-01"), json!(1)),
            row(json!("2022-05-01"), json!(1)),
        ]);
        let days = DayTable::build(&table, &spec()).expect("build");

        assert_eq!(
            days.select_year(2019),
            Err(HeatmapError::YearNotInData {
                year: 2019,
                available: vec![2020, 2022],
            })
        );
        // 2021 lies inside the span but had no rows
        assert!(days.select_year(2021).is_err());

        let year = days.select_year(2022).expect("2022");
        assert_eq!(year.len(), 365);
        assert_eq!(year.first().map(|r| r.date), Some(ymd(2022, 1, 1)));
        assert_eq!(year.last().map(|r| r.date), Some(ymd(2022, 12, 31)));
    }

    #[test]
    fn far_future_epochs_are_skipped() {
        let table = Table::from_rows(vec![
            row(json!(0), json!(1)),
            row(json!(8_000_000_000_000i64), json!(1)),
        ]);
        let days = DayTable::build(&table, &spec()).expect("build");

        assert_eq!(days.years(), [1970]);
        assert_eq!(days.len(), 365);
    }

    #[test]
    fn empty_table_has_no_years() {
        let days = DayTable::build(&Table::default(), &spec()).expect("build");

        assert!(days.is_empty());
        assert!(days.select_year(2023).is_err());
    }

    proptest! {
        #[test]
        fn span_has_one_record_per_day(offsets in proptest::collection::vec(0i64..(40 * 366), 1..40)) {
            let base = ymd(1990, 1, 1);
            let rows: Vec<Row> = offsets
                .iter()
                .map(|off| {
                    let date = base + chrono::Duration::days(*off);
                    row(json!(date.format("%Y-%m-%d").to_string()), json!(1))
                })
                .collect();

            let days = DayTable::build(&Table::from_rows(rows), &spec()).expect("build");

            let first = *days.years().first().expect("first year");
            let last = *days.years().last().expect("last year");
            let expected = (ymd(last, 12, 31) - ymd(first, 1, 1)).num_days() + 1;
            prop_assert_eq!(days.len() as i64, expected);
            prop_assert_eq!(
                days.records().iter().map(|r| r.value).sum::<u64>(),
                offsets.len() as u64
            );
            prop_assert!(days.records().windows(2).all(|w| w[0].date.succ_opt() == Some(w[1].date)));
            prop_assert!(days.records().iter().all(|r| r.weeknum <= 53 && r.weekday <= 6));
        }
    }
}
