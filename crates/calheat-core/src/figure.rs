//! Plotly-compatible figure description of a [`YearGrid`].
//!
//! The output is the `{ "data": [...], "layout": {...} }` document a
//! plotly frontend accepts as-is.

use serde::Serialize;

use crate::locale::Locale;
use crate::mapper::{Segment, YearGrid};
use crate::style::HeatmapStyle;

const AXIS_COLOR: &str = "#9e9e9e";
const CELL_GAP: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Scatter(ScatterTrace),
    Heatmap(HeatmapTrace),
}

/// Line segments packed into one trace, separated by `null` gaps.
#[derive(Debug, Clone, Serialize)]
pub struct ScatterTrace {
    pub mode: &'static str,
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
    pub line: LineSpec,
    pub hoverinfo: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineSpec {
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapTrace {
    pub x: Vec<u32>,
    pub y: Vec<u32>,
    pub z: Vec<Option<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    pub xgap: u32,
    pub ygap: u32,
    pub colorscale: Vec<(f64, String)>,
    pub showscale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovertemplate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoverlabel: Option<HoverLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoverinfo: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoverLabel {
    pub namelength: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub height: u32,
    pub yaxis: Axis,
    pub xaxis: Axis,
    pub plot_bgcolor: &'static str,
    pub margin: Margin,
    pub showlegend: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Axis {
    pub showline: bool,
    pub showgrid: bool,
    pub zeroline: bool,
    pub tickmode: &'static str,
    pub ticktext: Vec<String>,
    pub tickvals: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autorange: Option<&'static str>,
    pub tickfont: Font,
}

#[derive(Debug, Clone, Serialize)]
pub struct Font {
    pub size: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Margin {
    pub t: u32,
}

impl Figure {
    /// Separator traces first, then counts, then events on top.
    #[tracing::instrument(skip_all, fields(year = grid.year, show_events = show_events))]
    pub fn build(
        grid: &YearGrid,
        style: &HeatmapStyle,
        locale: Locale,
        value_label: &str,
        show_events: bool,
    ) -> Self {
        let mut data: Vec<Trace> = separator_traces(grid, style)
            .into_iter()
            .map(Trace::Scatter)
            .collect();

        data.push(Trace::Heatmap(frequency_trace(grid, style, value_label)));

        if show_events {
            data.push(Trace::Heatmap(event_trace(grid, style)));
        }

        Self {
            data,
            layout: layout(grid, style, locale),
        }
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn separator_traces(grid: &YearGrid, style: &HeatmapStyle) -> [ScatterTrace; 3] {
    let firsts: Vec<Segment> = grid.separators.iter().map(|sep| sep.first).collect();
    let ledges: Vec<Segment> = grid
        .separators
        .iter()
        .filter_map(|sep| sep.step.map(|[ledge, _]| ledge))
        .collect();
    let rises: Vec<Segment> = grid
        .separators
        .iter()
        .filter_map(|sep| sep.step.map(|[_, rise]| rise))
        .collect();

    [&firsts, &ledges, &rises].map(|segments| {
        let (x, y) = gapped_xy(segments);
        ScatterTrace {
            mode: "lines",
            x,
            y,
            line: LineSpec {
                color: style.line.color.to_string(),
                width: style.line.width,
            },
            hoverinfo: "skip",
        }
    })
}

fn gapped_xy(segments: &[Segment]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut x = Vec::with_capacity(segments.len() * 3);
    let mut y = Vec::with_capacity(segments.len() * 3);
    for seg in segments {
        x.extend([Some(seg.x0), Some(seg.x1), None]);
        y.extend([Some(seg.y0), Some(seg.y1), None]);
    }
    (x, y)
}

fn frequency_trace(grid: &YearGrid, style: &HeatmapStyle, value_label: &str) -> HeatmapTrace {
    HeatmapTrace {
        x: grid.cells.iter().map(|cell| cell.x).collect(),
        y: grid.cells.iter().map(|cell| cell.y).collect(),
        z: grid.cells.iter().map(|cell| Some(cell.z)).collect(),
        text: Some(
            grid.cells
                .iter()
                .map(|cell| cell.date.format("%Y-%m-%d").to_string())
                .collect(),
        ),
        xgap: CELL_GAP,
        ygap: CELL_GAP,
        colorscale: style
            .frequency
            .colorscale()
            .into_iter()
            .map(|(pos, color)| (pos, color.to_string()))
            .collect(),
        showscale: false,
        zmin: None,
        zmax: None,
        hovertemplate: Some(format!("%{{text}}<br>{value_label} : %{{z}}")),
        hoverlabel: Some(HoverLabel { namelength: 0 }),
        hoverinfo: None,
    }
}

/// Same cells as the count layer; days without an event are `null`.
fn event_trace(grid: &YearGrid, style: &HeatmapStyle) -> HeatmapTrace {
    let color = style.event.color.to_string();
    HeatmapTrace {
        x: grid.cells.iter().map(|cell| cell.x).collect(),
        y: grid.cells.iter().map(|cell| cell.y).collect(),
        z: grid
            .cells
            .iter()
            .map(|cell| {
                grid.events
                    .iter()
                    .find(|ev| ev.date == cell.date)
                    .map(|ev| u64::from(ev.mark))
            })
            .collect(),
        text: None,
        xgap: CELL_GAP,
        ygap: CELL_GAP,
        colorscale: vec![(0.0, color.clone()), (1.0, color)],
        showscale: false,
        zmin: Some(0.0),
        zmax: Some(1.0),
        hovertemplate: None,
        hoverlabel: None,
        hoverinfo: Some("skip"),
    }
}

fn layout(grid: &YearGrid, style: &HeatmapStyle, locale: Locale) -> Layout {
    let axis = |ticktext: Vec<String>, tickvals: Vec<f64>, size: u32| Axis {
        showline: false,
        showgrid: false,
        zeroline: false,
        tickmode: "array",
        ticktext,
        tickvals,
        autorange: None,
        tickfont: Font {
            size,
            color: AXIS_COLOR,
        },
    };

    let weekdays = locale.weekday_names().iter().map(ToString::to_string).collect();
    let mut yaxis = axis(weekdays, (0..7).map(f64::from).collect(), 12);
    yaxis.autorange = Some("reversed");

    let months = locale.month_names().iter().map(ToString::to_string).collect();
    let xaxis = axis(months, grid.month_ticks.clone(), 14);

    Layout {
        height: style.height,
        yaxis,
        xaxis,
        plot_bgcolor: "#fff",
        margin: Margin { t: 40 },
        showlegend: false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use serde_json::Value;

    use super::Figure;
    use crate::locale::Locale;
    use crate::mapper::CoordinateMapper;
    use crate::overlay::EventOverlay;
    use crate::preprocess::DayTable;
    use crate::style::HeatmapStyle;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn figure_json(show_events: bool) -> Value {
        let mut days = DayTable::from_counts(BTreeMap::from([(ymd(2023, 2, 14), 4)]));
        EventOverlay::from_dates([ymd(2023, 2, 14)]).apply(&mut days);
        let grid = CoordinateMapper::default().map(&days, 2023).expect("grid");
        let figure = Figure::build(
            &grid,
            &HeatmapStyle::default(),
            Locale::English,
            "messages",
            show_events,
        );
        serde_json::to_value(&figure).expect("serialize")
    }

    #[test]
    fn traces_are_lines_then_heatmaps() {
        let fig = figure_json(true);
        let data = fig["data"].as_array().expect("data");

        assert_eq!(data.len(), 5);
        for trace in &data[..3] {
            assert_eq!(trace["type"], "scatter");
            assert_eq!(trace["mode"], "lines");
        }
        assert_eq!(data[3]["type"], "heatmap");
        assert_eq!(data[3]["hovertemplate"], "%{text}<br>messages : %{z}");
        assert_eq!(data[3]["z"].as_array().map(Vec::len), Some(365));
        assert_eq!(data[4]["zmax"], 1.0);

        let events: Vec<&Value> = data[4]["z"]
            .as_array()
            .expect("event z")
            .iter()
            .filter(|z| !z.is_null())
            .collect();
        assert_eq!(events, [&Value::from(1)]);
    }

    #[test]
    fn first_line_trace_has_one_segment_per_month() {
        let fig = figure_json(false);
        let data = fig["data"].as_array().expect("data");

        assert_eq!(data.len(), 4);
        let xs = data[0]["x"].as_array().expect("x");
        assert_eq!(xs.len(), 12 * 3);
        assert!(xs[2].is_null());
    }

    #[test]
    fn layout_uses_locale_and_reversed_weekdays() {
        let fig = figure_json(false);

        assert_eq!(fig["layout"]["height"], 250);
        assert_eq!(fig["layout"]["yaxis"]["autorange"], "reversed");
        assert_eq!(fig["layout"]["yaxis"]["ticktext"][0], "Mon");
        assert_eq!(fig["layout"]["xaxis"]["ticktext"][11], "Dec");
        assert!(fig["layout"]["xaxis"].get("autorange").is_none());
        assert_eq!(fig["data"][3]["colorscale"][0], serde_json::json!([0.0, "#ffffff"]));
    }
}
