use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info, instrument};

use crate::cli::{Command, EventArgs, ExportArgs, InputArgs, RenderArgs};
use crate::config::Config;
use crate::datetime::parse_timezone;
use crate::heatmap::CalendarHeatmap;
use crate::locale::Locale;
use crate::overlay::EventOverlay;
use crate::preprocess::InputSpec;
use crate::render::{OutputFormat, Renderer, write_records};
use crate::style::HeatmapStyle;
use crate::table::Table;

#[instrument(skip_all)]
pub fn dispatch(cfg: &Config, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Render(args) => cmd_render(cfg, renderer, args),
        Command::Export(args) => cmd_export(cfg, args),
        Command::Years(args) => cmd_years(cfg, args),
    }
}

#[instrument(skip(cfg, renderer, args), fields(year = args.year, format = ?args.format))]
fn cmd_render(cfg: &Config, renderer: &Renderer, args: RenderArgs) -> anyhow::Result<()> {
    let locale = match args.lang.as_deref() {
        Some(raw) => Locale::parse(raw)?,
        None => configured_locale(cfg)?,
    };
    let heatmap = load_heatmap(cfg, &args.input, &args.events, locale)?;
    let style = heatmap.style();
    let show_events = heatmap.shows_events();

    let rendered = match args.format {
        OutputFormat::Json => heatmap.figure(args.year)?.to_json_pretty()?,
        OutputFormat::Svg => {
            let grid = heatmap.grid(args.year)?;
            renderer.render_svg(&grid, style, locale, show_events)?
        }
        OutputFormat::Text => {
            let grid = heatmap.grid(args.year)?;
            let to_terminal = args
                .output
                .as_deref()
                .is_none_or(|path| path.as_os_str() == "-")
                && io::stdout().is_terminal();
            let mut buf = Vec::new();
            renderer.write_text(&mut buf, &grid, style, locale, show_events, to_terminal)?;
            String::from_utf8(buf).context("text grid was not valid UTF-8")?
        }
    };

    write_output(args.output.as_deref(), &rendered)?;
    info!(year = args.year, "rendered heatmap");
    Ok(())
}

#[instrument(skip(cfg, args), fields(year = ?args.year))]
fn cmd_export(cfg: &Config, args: ExportArgs) -> anyhow::Result<()> {
    let heatmap = load_heatmap(cfg, &args.input, &args.events, configured_locale(cfg)?)?;
    let records = match args.year {
        Some(year) => heatmap.days().select_year(year)?,
        None => heatmap.days().records(),
    };

    let mut buf = Vec::new();
    write_records(&mut buf, records)?;
    let text = String::from_utf8(buf).context("records were not valid UTF-8")?;
    write_output(args.output.as_deref(), &text)?;

    info!(records = records.len(), "exported day records");
    Ok(())
}

#[instrument(skip(cfg, args))]
fn cmd_years(cfg: &Config, args: InputArgs) -> anyhow::Result<()> {
    let table = Table::load(&args.input, args.input_format)?;
    let heatmap = CalendarHeatmap::new(&table, &input_spec(cfg, &args)?, Locale::default())?;

    let mut out = io::stdout().lock();
    for year in heatmap.years() {
        writeln!(out, "{year}")?;
    }
    Ok(())
}

fn load_heatmap(
    cfg: &Config,
    input: &InputArgs,
    events: &EventArgs,
    locale: Locale,
) -> anyhow::Result<CalendarHeatmap> {
    let spec = input_spec(cfg, input)?;
    let table = Table::load(&input.input, input.input_format)?;
    let mut heatmap =
        CalendarHeatmap::new(&table, &spec, locale)?.with_style(HeatmapStyle::from_config(cfg)?);

    if let Some(path) = &events.events {
        let event_col = events
            .event_date_col
            .clone()
            .or_else(|| cfg.get("event.date.column"))
            .unwrap_or_else(|| spec.date_col.clone());
        let enabled = !events.no_events && cfg.get_bool("event.use").unwrap_or(true);

        let event_table = Table::load(path, events.events_format)
            .with_context(|| format!("failed to load events from {}", path.display()))?;
        let overlay = EventOverlay::from_table(&event_table, &event_col, spec.timezone.as_ref())?
            .with_enabled(enabled);
        heatmap.on_event(overlay);
    }

    Ok(heatmap)
}

fn input_spec(cfg: &Config, input: &InputArgs) -> anyhow::Result<InputSpec> {
    let date_col = input
        .date_col
        .clone()
        .or_else(|| cfg.get("date.column"))
        .unwrap_or_else(|| "date".to_string());
    let value_col = input
        .value_col
        .clone()
        .or_else(|| cfg.get("value.column"))
        .unwrap_or_else(|| "value".to_string());
    let timezone = cfg
        .get("date.timezone")
        .map(|raw| parse_timezone(&raw))
        .transpose()
        .context("invalid date.timezone")?;

    debug!(%date_col, %value_col, ?timezone, "resolved input columns");
    Ok(InputSpec::new(date_col, value_col).with_timezone(timezone))
}

fn configured_locale(cfg: &Config) -> anyhow::Result<Locale> {
    cfg.get("language")
        .map(|raw| Locale::parse(&raw))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn write_output(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(output = %path.display(), bytes = contents.len(), "wrote output");
        }
        _ => {
            let mut out = io::stdout().lock();
            out.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                writeln!(out)?;
            }
        }
    }
    Ok(())
}
