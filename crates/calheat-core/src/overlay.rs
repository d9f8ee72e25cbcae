use std::collections::BTreeSet;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::datetime::normalize_cell;
use crate::preprocess::DayTable;
use crate::table::Table;

/// Marker value written to days that had an event.
pub const EVENT_MARK: u8 = 1;

/// A set of event days drawn as a second, single-colour layer.
#[derive(Debug, Clone)]
pub struct EventOverlay {
    dates: BTreeSet<NaiveDate>,
    enabled: bool,
}

impl EventOverlay {
    pub fn from_dates<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        Self {
            dates: dates.into_iter().collect(),
            enabled: true,
        }
    }

    #[tracing::instrument(skip(table, tz), fields(rows = table.len()))]
    pub fn from_table(table: &Table, date_col: &str, tz: Option<&Tz>) -> anyhow::Result<Self> {
        if table.is_empty() {
            return Ok(Self::from_dates([]));
        }
        table.require_column(date_col)?;

        let mut skipped = 0usize;
        let dates: BTreeSet<NaiveDate> = table
            .rows()
            .iter()
            .filter_map(|row| {
                let date = Table::cell(row, date_col).and_then(|cell| normalize_cell(cell, tz));
                if date.is_none() {
                    skipped += 1;
                }
                date
            })
            .collect();

        if skipped > 0 {
            warn!(skipped, "event rows with unusable dates were ignored");
        }
        info!(events = dates.len(), "loaded event dates");

        Ok(Self {
            dates,
            enabled: true,
        })
    }

    /// Turns the layer on or off without discarding the dates.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dates(&self) -> &BTreeSet<NaiveDate> {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Marks matching days and returns how many were marked.
    ///
    /// Days without an event keep `event = None`.
    #[tracing::instrument(skip_all, fields(events = self.dates.len()))]
    pub fn apply(&self, days: &mut DayTable) -> usize {
        let mut marked = 0;
        for date in &self.dates {
            match days.get_mut(*date) {
                Some(record) => {
                    record.event = Some(EVENT_MARK);
                    marked += 1;
                }
                None => debug!(%date, "event date outside the displayed span"),
            }
        }
        marked
    }
}
