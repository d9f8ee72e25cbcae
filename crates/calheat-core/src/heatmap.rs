use tracing::info;

use crate::error::HeatmapError;
use crate::figure::Figure;
use crate::locale::Locale;
use crate::mapper::{CoordinateMapper, YearGrid};
use crate::overlay::EventOverlay;
use crate::preprocess::{DayTable, InputSpec};
use crate::style::HeatmapStyle;
use crate::table::Table;

/// Prepared daily counts plus everything needed to draw any covered year.
#[derive(Debug, Clone)]
pub struct CalendarHeatmap {
    days: DayTable,
    value_col: String,
    style: HeatmapStyle,
    locale: Locale,
    events: Option<EventOverlay>,
}

impl CalendarHeatmap {
    pub fn new(table: &Table, spec: &InputSpec, locale: Locale) -> anyhow::Result<Self> {
        let days = DayTable::build(table, spec)?;
        info!(years = ?days.years(), "calendar heatmap ready");

        Ok(Self {
            days,
            value_col: spec.value_col.clone(),
            style: HeatmapStyle::default(),
            locale,
            events: None,
        })
    }

    pub fn with_style(mut self, style: HeatmapStyle) -> Self {
        self.style = style;
        self
    }

    /// Marks event days; replaces any earlier overlay and its marks.
    pub fn on_event(&mut self, overlay: EventOverlay) -> usize {
        self.days.clear_events();
        let marked = overlay.apply(&mut self.days);
        info!(
            marked,
            enabled = overlay.is_enabled(),
            "event overlay applied"
        );
        self.events = Some(overlay);
        marked
    }

    pub fn days(&self) -> &DayTable {
        &self.days
    }

    pub fn years(&self) -> &[i32] {
        self.days.years()
    }

    pub fn style(&self) -> &HeatmapStyle {
        &self.style
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn shows_events(&self) -> bool {
        self.events.as_ref().is_some_and(EventOverlay::is_enabled)
    }

    pub fn grid(&self, year: i32) -> Result<YearGrid, HeatmapError> {
        CoordinateMapper::new(self.style.line.line_pos).map(&self.days, year)
    }

    pub fn figure(&self, year: i32) -> Result<Figure, HeatmapError> {
        let grid = self.grid(year)?;
        let value_label = self
            .style
            .value_label
            .as_deref()
            .unwrap_or(&self.value_col);
        Ok(Figure::build(
            &grid,
            &self.style,
            self.locale,
            value_label,
            self.shows_events(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::CalendarHeatmap;
    use crate::error::HeatmapError;
    use crate::locale::Locale;
    use crate::overlay::EventOverlay;
    use crate::preprocess::InputSpec;
    use crate::table::{Row, Table};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn chat_table() -> Table {
        let rows = ["2023-01-01", "2023-01-01", "2023-12-31"]
            .into_iter()
            .map(|date| {
                let mut row = Row::new();
                row.insert("date".to_string(), json!(date));
                row.insert("message".to_string(), json!("hello"));
                row
            })
            .collect();
        Table::from_rows(rows)
    }

    #[test]
    fn figure_counts_messages_per_day() {
        let heatmap = CalendarHeatmap::new(
            &chat_table(),
            &InputSpec::new("date", "message"),
            Locale::Korean,
        )
        .expect("heatmap");

        let fig = serde_json::to_value(heatmap.figure(2023).expect("figure")).expect("json");
        let z = fig["data"][3]["z"].as_array().expect("z");
        assert_eq!(z[0], 2);
        assert_eq!(z[364], 1);
        assert_eq!(fig["data"][3]["hovertemplate"], "%{text}<br>message : %{z}");
        assert_eq!(fig["layout"]["xaxis"]["ticktext"][0], "1월");
    }

    #[test]
    fn events_can_be_switched_off() {
        let mut heatmap = CalendarHeatmap::new(
            &chat_table(),
            &InputSpec::new("date", "message"),
            Locale::English,
        )
        .expect("heatmap");

        assert!(!heatmap.shows_events());
        let marked = heatmap.on_event(EventOverlay::from_dates([ymd(2023, 7, 4)]).with_enabled(false));
        assert_eq!(marked, 1);
        assert!(!heatmap.shows_events());
        assert_eq!(heatmap.figure(2023).expect("figure").data.len(), 4);

        heatmap.on_event(EventOverlay::from_dates([ymd(2023, 7, 4)]));
        assert!(heatmap.shows_events());
        assert_eq!(heatmap.figure(2023).expect("figure").data.len(), 5);
    }

    #[test]
    fn later_overlay_replaces_earlier_marks() {
        let mut heatmap = CalendarHeatmap::new(
            &chat_table(),
            &InputSpec::new("date", "message"),
            Locale::English,
        )
        .expect("heatmap");

        heatmap.on_event(EventOverlay::from_dates([ymd(2023, 3, 1)]));
        heatmap.on_event(EventOverlay::from_dates([ymd(2023, 5, 1)]));

        let grid = heatmap.grid(2023).expect("grid");
        let dates: Vec<NaiveDate> = grid.events.iter().map(|ev| ev.date).collect();
        assert_eq!(dates, [ymd(2023, 5, 1)]);
        assert_eq!(heatmap.days().get(ymd(2023, 3, 1)).and_then(|d| d.event), None);
    }

    #[test]
    fn unknown_year_is_a_value_error() {
        let heatmap = CalendarHeatmap::new(
            &chat_table(),
            &InputSpec::new("date", "message"),
            Locale::English,
        )
        .expect("heatmap");

        let err = heatmap.figure(1999).expect_err("absent year");
        assert_eq!(
            err,
            HeatmapError::YearNotInData {
                year: 1999,
                available: vec![2023],
            }
        );
        assert_eq!(err.to_string(), "\"1999\" not in list: [2023]");
    }
}
