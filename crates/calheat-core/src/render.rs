use std::io::Write;

use anyhow::anyhow;
use clap::ValueEnum;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::locale::Locale;
use crate::mapper::{Segment, YearGrid};
use crate::preprocess::DayRecord;
use crate::style::{HeatmapStyle, HexColor};

/// Pixels per grid unit; cells are this minus the gap.
const PITCH: f64 = 15.0;
const GAP: i32 = 3;
const LEFT: f64 = 40.0;
const RIGHT: f64 = 20.0;
const TOP: f64 = 40.0;
const LABEL_ROOM: f64 = 30.0;
const LABEL_COLOR: RGBColor = RGBColor(0x9e, 0x9e, 0x9e);

const SHADES: [char; 4] = ['░', '▒', '▓', '█'];
const EVENT_GLYPH: char = '●';

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Svg,
    Json,
    Text,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Draws the year as a standalone SVG document.
    #[tracing::instrument(skip(self, grid, style), fields(year = grid.year))]
    pub fn render_svg(
        &self,
        grid: &YearGrid,
        style: &HeatmapStyle,
        locale: Locale,
        show_events: bool,
    ) -> anyhow::Result<String> {
        let canvas = Canvas::for_grid(style);
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (canvas.width, canvas.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            let (zmin, zmax) = (grid.min_value(), grid.max_value());
            for cell in &grid.cells {
                let color: RGBColor = style.frequency.color_for(cell.z, zmin, zmax).into();
                root.draw(&Rectangle::new(canvas.cell_rect(cell.x, cell.y), color.filled()))
                    .map_err(draw_err)?;
            }

            if show_events {
                let color: RGBColor = style.event.color.into();
                for event in &grid.events {
                    root.draw(&Rectangle::new(canvas.cell_rect(event.x, event.y), color.filled()))
                        .map_err(draw_err)?;
                }
            }

            let line_color: RGBColor = style.line.color.into();
            let stroke = ShapeStyle::from(&line_color)
                .stroke_width((style.line.width.round() as u32).max(1));
            for segment in grid.separators.iter().flat_map(|sep| sep.segments()) {
                root.draw(&PathElement::new(canvas.segment_path(segment), stroke))
                    .map_err(draw_err)?;
            }

            let weekday_font = ("sans-serif", 12)
                .into_font()
                .color(&LABEL_COLOR)
                .pos(Pos::new(HPos::Right, VPos::Center));
            for (row, name) in locale.weekday_names().iter().enumerate() {
                let (_, y) = canvas.point(-0.5, row as f64);
                root.draw(&Text::new(
                    name.to_string(),
                    (LEFT as i32 - 6, y),
                    weekday_font.clone(),
                ))
                .map_err(draw_err)?;
            }

            let month_font = ("sans-serif", 14)
                .into_font()
                .color(&LABEL_COLOR)
                .pos(Pos::new(HPos::Center, VPos::Top));
            for (name, tick) in locale.month_names().iter().zip(&grid.month_ticks) {
                let (x, y) = canvas.point(*tick, 6.5);
                root.draw(&Text::new(name.to_string(), (x, y + 8), month_font.clone()))
                    .map_err(draw_err)?;
            }

            root.present().map_err(draw_err)?;
        }

        Ok(svg)
    }

    /// Terminal rendition: one line per weekday, one column per week.
    ///
    /// ANSI colour is only emitted when `to_terminal` is set and colour is on.
    #[tracing::instrument(skip(self, grid, style, writer), fields(year = grid.year))]
    pub fn write_text<W: Write>(
        &self,
        mut writer: W,
        grid: &YearGrid,
        style: &HeatmapStyle,
        locale: Locale,
        show_events: bool,
        to_terminal: bool,
    ) -> anyhow::Result<()> {
        let colored = self.color && to_terminal;
        let weekday_names = locale.weekday_names();
        let label_width = weekday_names
            .iter()
            .map(|name| UnicodeWidthStr::width(*name))
            .max()
            .unwrap_or(0);
        let weeks = grid.week_count();
        let (zmin, zmax) = (grid.min_value(), grid.max_value());

        writeln!(
            writer,
            "{}{}",
            " ".repeat(label_width + 1),
            month_header(grid, locale, weeks as usize)
        )?;

        for (row, name) in weekday_names.iter().enumerate() {
            let padding = label_width.saturating_sub(UnicodeWidthStr::width(*name));
            write!(writer, "{}{name} ", " ".repeat(padding))?;

            for week in 0..weeks {
                let glyph = match grid.cell_at(week, row as u32) {
                    None => " ".to_string(),
                    Some(_) if show_events && grid.event_at(week, row as u32).is_some() => {
                        paint(&EVENT_GLYPH.to_string(), style.event.color, colored)
                    }
                    Some(cell) if cell.z <= zmin || zmax <= zmin => "·".to_string(),
                    Some(cell) => {
                        let t = (cell.z - zmin) as f64 / (zmax - zmin) as f64;
                        let idx = ((t * SHADES.len() as f64).ceil() as usize)
                            .clamp(1, SHADES.len())
                            - 1;
                        let color = style.frequency.color_for(cell.z, zmin, zmax);
                        paint(&SHADES[idx].to_string(), color, colored)
                    }
                };
                write!(writer, "{glyph}")?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

}

fn paint(text: &str, color: HexColor, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }
    format!(
        "\x1b[38;2;{};{};{}m{text}\x1b[0m",
        color.r, color.g, color.b
    )
}

/// One JSON object per line, in date order.
pub fn write_records<W: Write>(mut writer: W, records: &[DayRecord]) -> anyhow::Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer)?;
    }
    Ok(())
}

fn month_header(grid: &YearGrid, locale: Locale, weeks: usize) -> String {
    let mut header = String::new();
    let mut used = 0usize;

    for (name, tick) in locale.month_names().iter().zip(&grid.month_ticks) {
        let col = tick.round().max(0.0) as usize;
        if col < used || col >= weeks {
            continue;
        }
        header.push_str(&" ".repeat(col - used));
        header.push_str(name);
        used = col + UnicodeWidthStr::width(*name);
    }

    header
}

struct Canvas {
    width: u32,
    height: u32,
}

impl Canvas {
    fn for_grid(style: &HeatmapStyle) -> Self {
        let width = (LEFT + 54.0 * PITCH + RIGHT) as u32;
        let needed = (TOP + 7.0 * PITCH + LABEL_ROOM) as u32;
        Self {
            width,
            height: style.height.max(needed),
        }
    }

    /// Grid units to pixels; cell `(x, y)` is centred on `(x, y)`.
    fn point(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (LEFT + (x + 0.5) * PITCH).round() as i32,
            (TOP + (y + 0.5) * PITCH).round() as i32,
        )
    }

    fn cell_rect(&self, x: u32, y: u32) -> [(i32, i32); 2] {
        let (x0, y0) = self.point(f64::from(x) - 0.5, f64::from(y) - 0.5);
        let (x1, y1) = self.point(f64::from(x) + 0.5, f64::from(y) + 0.5);
        let half = GAP / 2;
        [(x0 + half, y0 + half), (x1 - (GAP - half), y1 - (GAP - half))]
    }

    fn segment_path(&self, segment: &Segment) -> Vec<(i32, i32)> {
        vec![
            self.point(segment.x0, segment.y0),
            self.point(segment.x1, segment.y1),
        ]
    }
}

fn draw_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("failed to draw heatmap: {err}")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::{Canvas, Renderer, write_records};
    use crate::config::Config;
    use crate::locale::Locale;
    use crate::mapper::{CoordinateMapper, YearGrid};
    use crate::overlay::EventOverlay;
    use crate::preprocess::{DayRecord, DayTable};
    use crate::style::HeatmapStyle;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn grid_2023() -> YearGrid {
        let mut days = DayTable::from_counts(BTreeMap::from([
            (ymd(2023, 1, 1), 2),
            (ymd(2023, 6, 15), 8),
        ]));
        EventOverlay::from_dates([ymd(2023, 3, 1)]).apply(&mut days);
        CoordinateMapper::default().map(&days, 2023).expect("grid")
    }

    fn plain_renderer() -> Renderer {
        let mut cfg = Config::default();
        cfg.apply_overrides([("color".to_string(), "off".to_string())]);
        Renderer::new(&cfg).expect("renderer")
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.apply_overrides([("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn svg_contains_cells_and_labels() {
        let svg = plain_renderer()
            .render_svg(&grid_2023(), &HeatmapStyle::default(), Locale::English, true)
            .expect("svg");

        assert!(svg.contains("<svg"));
        assert!(svg.contains("Jan"));
        assert!(svg.contains("Sun"));
        // 365 cells, 1 event cell and the background
        assert!(svg.matches("<rect").count() >= 366);
    }

    #[test]
    fn text_grid_has_seven_weekday_rows() {
        let mut out = Vec::new();
        plain_renderer()
            .write_text(
                &mut out,
                &grid_2023(),
                &HeatmapStyle::default(),
                Locale::Korean,
                true,
                false,
            )
            .expect("text");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 8);
        assert!(lines[0].contains("1월"));
        assert!(lines[1].starts_with("월 "));
        assert!(lines[7].starts_with("일 "));
        assert!(text.contains('●'));
        assert!(text.contains('█'));
    }

    #[test]
    fn text_grid_is_plain_unless_writing_to_a_terminal() {
        let renderer = Renderer::new(&Config::default()).expect("renderer");
        let grid = grid_2023();
        let style = HeatmapStyle::default();

        let mut plain = Vec::new();
        renderer
            .write_text(&mut plain, &grid, &style, Locale::English, true, false)
            .expect("text");
        assert!(!plain.contains(&0x1b));

        let mut painted = Vec::new();
        renderer
            .write_text(&mut painted, &grid, &style, Locale::English, true, true)
            .expect("text");
        assert!(painted.contains(&0x1b));

        let mut off = Vec::new();
        plain_renderer()
            .write_text(&mut off, &grid, &style, Locale::English, true, true)
            .expect("text");
        assert!(!off.contains(&0x1b));
    }

    #[test]
    fn records_are_json_lines() {
        let records = vec![
            DayRecord::new(ymd(2023, 1, 1), 2),
            DayRecord::new(ymd(2023, 1, 2), 0),
        ];
        let mut out = Vec::new();
        write_records(&mut out, &records).expect("write");
        let text = String::from_utf8(out).expect("utf8");

        assert_eq!(
            text.lines().next(),
            Some(r#"{"date":"2023-01-01","value":2,"weekday":6,"weeknum":0}"#)
        );
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn cells_leave_a_gap() {
        let canvas = Canvas::for_grid(&HeatmapStyle::default());
        let [(x0, y0), (x1, y1)] = canvas.cell_rect(0, 0);

        assert_eq!((x0, y0), (41, 41));
        assert_eq!((x1 - x0, y1 - y0), (12, 12));
        assert_eq!(canvas.height, 250);
    }
}
