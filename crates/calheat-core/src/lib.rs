pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod figure;
pub mod heatmap;
pub mod locale;
pub mod mapper;
pub mod overlay;
pub mod preprocess;
pub mod render;
pub mod style;
pub mod table;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use error::HeatmapError;
pub use heatmap::CalendarHeatmap;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting calheat"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.calheatrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  debug!(
    files = ?cfg.loaded_files,
    "configuration loaded"
  );

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &cfg,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
