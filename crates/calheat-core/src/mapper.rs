use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::datetime::days_in_month;
use crate::error::HeatmapError;
use crate::preprocess::{
  DayRecord,
  DayTable
};

pub const DEFAULT_LINE_POS: f64 = 0.5;

/// Bottom row of the grid (Sunday).
const LAST_ROW: f64 = 6.0;

/// A straight line in grid units, x along
/// weeks and y along weekdays.
#[derive(
  Debug, Clone, Copy, PartialEq, Serialize,
)]
pub struct Segment {
  pub x0: f64,
  pub y0: f64,
  pub x1: f64,
  pub y1: f64
}

impl Segment {
  fn vertical(
    x: f64,
    y0: f64,
    y1: f64
  ) -> Self {
    Self {
      x0: x,
      y0,
      x1: x,
      y1
    }
  }

  fn horizontal(
    y: f64,
    x0: f64,
    x1: f64
  ) -> Self {
    Self {
      x0,
      y0: y,
      x1,
      y1: y
    }
  }
}

/// The boundary drawn where a month starts.
///
/// `first` runs down the left edge of the
/// 1st from its row to the bottom. When the
/// 1st is not a Monday, `step` adds the
/// ledge above the 1st and the rise on its
/// right edge up to the top row, so the
/// boundary wraps around the days of the
/// previous month sharing that week.
#[derive(
  Debug, Clone, Copy, PartialEq, Serialize,
)]
pub struct MonthSeparator {
  pub month_start: NaiveDate,
  pub first:       Segment,
  pub step:        Option<[Segment; 2]>
}

impl MonthSeparator {
  /// `None` unless `record` is the 1st of a
  /// month.
  #[must_use]
  pub fn from_record(
    record: &DayRecord,
    line_pos: f64
  ) -> Option<Self> {
    if !record.is_month_start() {
      return None;
    }

    let x = f64::from(record.weeknum);
    let y = f64::from(record.weekday);

    let first = Segment::vertical(
      x - line_pos,
      y - line_pos,
      LAST_ROW + line_pos
    );

    let step = (record.weekday != 0)
      .then(|| {
        [
          Segment::horizontal(
            y - line_pos,
            x - line_pos,
            x + line_pos
          ),
          Segment::vertical(
            x + line_pos,
            y - line_pos,
            -line_pos
          )
        ]
      });

    Some(Self {
      month_start: record.date,
      first,
      step
    })
  }

  pub fn segments(
    &self
  ) -> impl Iterator<Item = &Segment> {
    std::iter::once(&self.first).chain(
      self.step.iter().flatten()
    )
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize,
)]
pub struct GridCell {
  pub date: NaiveDate,
  pub x:    u32,
  pub y:    u32,
  pub z:    u64
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize,
)]
pub struct EventCell {
  pub date: NaiveDate,
  pub x:    u32,
  pub y:    u32,
  pub mark: u8
}

/// Everything needed to draw one year.
#[derive(Debug, Clone, Serialize)]
pub struct YearGrid {
  pub year:        i32,
  pub cells:       Vec<GridCell>,
  pub separators:  Vec<MonthSeparator>,
  pub month_ticks: Vec<f64>,
  pub events:      Vec<EventCell>
}

impl YearGrid {
  #[must_use]
  pub fn max_value(&self) -> u64 {
    self
      .cells
      .iter()
      .map(|cell| cell.z)
      .max()
      .unwrap_or(0)
  }

  #[must_use]
  pub fn min_value(&self) -> u64 {
    self
      .cells
      .iter()
      .map(|cell| cell.z)
      .min()
      .unwrap_or(0)
  }

  /// Number of columns, i.e. the largest
  /// weeknum plus one.
  #[must_use]
  pub fn week_count(&self) -> u32 {
    self
      .cells
      .iter()
      .map(|cell| cell.x + 1)
      .max()
      .unwrap_or(0)
  }

  pub fn cell_at(
    &self,
    x: u32,
    y: u32
  ) -> Option<&GridCell> {
    self
      .cells
      .iter()
      .find(|cell| cell.x == x && cell.y == y)
  }

  pub fn event_at(
    &self,
    x: u32,
    y: u32
  ) -> Option<&EventCell> {
    self
      .events
      .iter()
      .find(|cell| cell.x == x && cell.y == y)
  }
}

/// Maps day records of one year onto the
/// weeks × weekdays grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
  line_pos: f64
}

impl Default for CoordinateMapper {
  fn default() -> Self {
    Self {
      line_pos: DEFAULT_LINE_POS
    }
  }
}

impl CoordinateMapper {
  #[must_use]
  pub fn new(line_pos: f64) -> Self {
    Self { line_pos }
  }

  #[must_use]
  pub fn line_pos(&self) -> f64 {
    self.line_pos
  }

  #[tracing::instrument(skip(
    self, days
  ))]
  pub fn map(
    &self,
    days: &DayTable,
    year: i32
  ) -> Result<YearGrid, HeatmapError> {
    let records =
      days.select_year(year)?;

    let cells: Vec<GridCell> = records
      .iter()
      .map(|rec| GridCell {
        date: rec.date,
        x:    rec.weeknum,
        y:    rec.weekday,
        z:    rec.value
      })
      .collect();

    let separators: Vec<MonthSeparator> =
      records
        .iter()
        .filter_map(|rec| {
          MonthSeparator::from_record(
            rec,
            self.line_pos
          )
        })
        .collect();

    let events: Vec<EventCell> = records
      .iter()
      .filter_map(|rec| {
        rec.event.map(|mark| EventCell {
          date: rec.date,
          x: rec.weeknum,
          y: rec.weekday,
          mark
        })
      })
      .collect();

    debug!(
      cells = cells.len(),
      separators = separators.len(),
      events = events.len(),
      "mapped year onto grid"
    );

    Ok(YearGrid {
      year,
      cells,
      separators,
      month_ticks: month_ticks(year),
      events
    })
  }
}

/// Column positions for month labels: the
/// cumulative day count at each month's
/// end, pulled back half a month, in weeks.
#[must_use]
pub fn month_ticks(
  year: i32
) -> Vec<f64> {
  let mut elapsed = 0u32;
  (1..=12)
    .filter_map(|month| {
      days_in_month(year, month)
    })
    .map(|len| {
      elapsed += len;
      (f64::from(elapsed) - 15.0) / 7.0
    })
    .collect()
}
