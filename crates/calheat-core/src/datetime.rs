use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  NaiveDateTime,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde_json::Value;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M"
];

const COMPACT_UTC_FORMAT: &str =
  "%Y%m%dT%H%M%SZ";

/// Years a cell may fall in; anything
/// outside is treated as unreadable.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> =
  1..=9999;

fn loose_date_re() -> Option<&'static Regex> {
  static LOOSE_RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  LOOSE_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<year>\d{4})\s*[./-]\s*(?P<month>\d{1,2})\s*[./-]\s*(?P<day>\d{1,2})\.?(?:[ T].*)?$",
      )
      .ok()
    })
    .as_ref()
}

/// Reduces a table cell to the calendar
/// day it falls on.
///
/// Strings go through [`parse_date_text`];
/// JSON numbers are read as Unix epoch
/// seconds. Anything else, or a day outside
/// [`YEAR_RANGE`], yields `None`.
#[must_use]
pub fn normalize_cell(
  cell: &Value,
  tz: Option<&Tz>
) -> Option<NaiveDate> {
  let date = match cell {
    | Value::String(raw) => {
      parse_date_text(raw, tz)
    }
    | Value::Number(num) => {
      let secs = num.as_i64().or_else(
        || {
          num
            .as_f64()
            .map(|f| f.floor() as i64)
        }
      )?;
      let dt =
        DateTime::<Utc>::from_timestamp(
          secs, 0
        )?;
      Some(utc_to_day(dt, tz))
    }
    | _ => None
  }?;
  YEAR_RANGE
    .contains(&date.year())
    .then_some(date)
}

/// Parses a date or datetime string and
/// drops the time of day.
///
/// Offset-carrying timestamps keep their
/// literal local date unless a display
/// timezone is given, in which case the
/// instant is converted first.
#[must_use]
pub fn parse_date_text(
  raw: &str,
  tz: Option<&Tz>
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(match tz {
      | Some(zone) => {
        dt.with_timezone(zone)
          .date_naive()
      }
      | None => dt.date_naive()
    });
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      trimmed,
      COMPACT_UTC_FORMAT
    )
  {
    let dt = DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc);
    return Some(utc_to_day(dt, tz));
  }

  for fmt in NAIVE_DATETIME_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        trimmed, fmt
      )
    {
      return Some(ndt.date());
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
  {
    return Some(date);
  }

  let caps = loose_date_re()?
    .captures(trimmed)?;
  let year = caps
    .name("year")?
    .as_str()
    .parse::<i32>()
    .ok()?;
  let month = caps
    .name("month")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let day = caps
    .name("day")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

fn utc_to_day(
  dt: DateTime<Utc>,
  tz: Option<&Tz>
) -> NaiveDate {
  match tz {
    | Some(zone) => {
      dt.with_timezone(zone)
        .date_naive()
    }
    | None => dt.date_naive()
  }
}

pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "timezone cannot be empty"
    ));
  }

  trimmed.parse::<Tz>().map_err(
    |err| {
      anyhow!(
        "invalid timezone \
         '{trimmed}': {err}"
      )
    }
  )
}

/// Row index on the grid, Monday first.
#[must_use]
pub fn weekday_index(
  date: NaiveDate
) -> u32 {
  date
    .weekday()
    .num_days_from_monday()
}

/// Column index on the grid.
///
/// ISO week of `date`, except that early
/// January days still in the previous
/// year's week 52/53 go to column 0 and
/// late December days already in next
/// year's week 1 go to column 53, so a
/// single year always spans 0..=53.
#[must_use]
pub fn display_weeknum(
  date: NaiveDate
) -> u32 {
  let iso = date.iso_week().week();
  match (date.month(), iso) {
    | (1, w) if w >= 52 => 0,
    | (12, 1) => 53,
    | (_, w) => w
  }
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> Option<u32> {
  let first =
    NaiveDate::from_ymd_opt(
      year, month, 1
    )?;
  let next = if month == 12 {
    NaiveDate::from_ymd_opt(
      year + 1,
      1,
      1
    )?
  } else {
    NaiveDate::from_ymd_opt(
      year,
      month + 1,
      1
    )?
  };
  u32::try_from(
    next
      .signed_duration_since(first)
      .num_days()
  )
  .ok()
}

/// Every day from Jan 1 of `first_year`
/// through Dec 31 of `last_year`.
#[must_use]
pub fn full_year_span(
  first_year: i32,
  last_year: i32
) -> Vec<NaiveDate> {
  let (Some(start), Some(end)) = (
    NaiveDate::from_ymd_opt(
      first_year, 1, 1
    ),
    NaiveDate::from_ymd_opt(
      last_year, 12, 31
    )
  ) else {
    return Vec::new();
  };

  start
    .iter_days()
    .take_while(|day| *day <= end)
    .collect()
}
