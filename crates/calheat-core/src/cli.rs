use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::OutputFormat;
use crate::table::InputFormat;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "calheat",
    version,
    about = "Calendar heatmaps from tables of dated events",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "calheatrc", global = true)]
    pub calheatrc: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Draw one year as SVG, plotly JSON or a terminal grid
    Render(RenderArgs),
    /// Print the prepared day records as JSON lines
    Export(ExportArgs),
    /// List the years present in the input
    Years(InputArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Input table; `-` reads stdin
    pub input: PathBuf,

    #[arg(long = "input-format", value_enum)]
    pub input_format: Option<InputFormat>,

    #[arg(long = "date-col")]
    pub date_col: Option<String>,

    #[arg(long = "value-col")]
    pub value_col: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EventArgs {
    /// Table of event days to overlay
    #[arg(long = "events")]
    pub events: Option<PathBuf>,

    #[arg(long = "events-format", value_enum)]
    pub events_format: Option<InputFormat>,

    #[arg(long = "event-date-col")]
    pub event_date_col: Option<String>,

    /// Load events but leave the overlay off
    #[arg(long = "no-events")]
    pub no_events: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub events: EventArgs,

    #[arg(long = "year")]
    pub year: i32,

    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Svg)]
    pub format: OutputFormat,

    /// Output file; stdout when omitted or `-`
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Label language: ko or en
    #[arg(long = "lang")]
    pub lang: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub events: EventArgs,

    /// Restrict to one year
    #[arg(long = "year")]
    pub year: Option<i32>,

    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.KEY=VALUE` / `rc.KEY:VALUE` tokens out of the argument list
/// so they can appear anywhere, including after the subcommand.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};
    use crate::render::OutputFormat;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_removed() {
        let pre = preprocess_args(&os(&[
            "calheat",
            "render",
            "rc.language=en",
            "chat.csv",
            "rc.line.pos:0.3",
            "--year",
            "2023",
        ]))
        .expect("preprocess");

        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.language".to_string(), "en".to_string()),
                ("rc.line.pos".to_string(), "0.3".to_string()),
            ]
        );
        assert_eq!(pre.cleaned_args.len(), 5);
    }

    #[test]
    fn parses_render_command() {
        let cli = GlobalCli::parse_from(os(&[
            "calheat",
            "-vv",
            "render",
            "chat.csv",
            "--year",
            "2023",
            "--format",
            "json",
            "--rc",
            "line.color=#000000",
            "--events",
            "holidays.csv",
        ]));

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides.len(), 1);
        assert_eq!(cli.rc_overrides[0].value, "#000000");
        match cli.command {
            Command::Render(args) => {
                assert_eq!(args.year, 2023);
                assert_eq!(args.format, OutputFormat::Json);
                assert!(args.events.events.is_some());
                assert!(!args.events.no_events);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn render_requires_a_year() {
        let parsed = GlobalCli::try_parse_from(os(&["calheat", "render", "chat.csv"]));
        assert!(parsed.is_err());
    }
}
