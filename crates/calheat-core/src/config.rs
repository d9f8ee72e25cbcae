use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const RC_ENV_VAR: &str = "CALHEATRC";
const RC_FILE_NAME: &str = ".calheatrc";

const DEFAULTS: &[(&str, &str)] = &[
  ("language", "ko"),
  ("color", "on"),
  ("date.column", "date"),
  ("value.column", "value"),
  ("line.color", "#9e9e9e"),
  ("line.pos", "0.5"),
  ("line.width", "1.5"),
  ("freq.min_color", "#eeeeee"),
  ("freq.max_color", "#678fae"),
  ("event.color", "#76cf63"),
  ("event.use", "on"),
  ("layout.height", "250")
];

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading calheatrc");
      cfg.load_file(&path, &mut Vec::new())?;
    } else {
      debug!(
        "no calheatrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self
      .map
      .get(key)
      .filter(|v| !v.trim().is_empty())
      .cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_f64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<f64>> {
    self
      .get(key)
      .map(|raw| {
        raw.trim().parse::<f64>().map_err(
          |err| {
            anyhow!(
              "invalid number for \
               {key}: {raw} ({err})"
            )
          }
        )
      })
      .transpose()
  }

  pub fn get_u32(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u32>> {
    self
      .get(key)
      .map(|raw| {
        raw.trim().parse::<u32>().map_err(
          |err| {
            anyhow!(
              "invalid integer for \
               {key}: {raw} ({err})"
            )
          }
        )
      })
      .transpose()
  }

  /// `chain` holds the canonical paths of
  /// the files currently being read, outermost
  /// first.
  #[tracing::instrument(skip(self, chain))]
  fn load_file(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical =
      fs::canonicalize(&path)
        .unwrap_or_else(|_| path.clone());
    if chain.contains(&canonical) {
      let cycle = chain
        .iter()
        .chain(std::iter::once(&canonical))
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ");
      return Err(anyhow!(
        "include cycle: {cycle}"
      ));
    }

    self
      .loaded_files
      .push(path.clone());

    let is_toml = path
      .extension()
      .is_some_and(|ext| ext == "toml");
    if is_toml {
      return self
        .load_toml(&path, &text);
    }

    chain.push(canonical);
    self.load_lines(&path, &text, chain)?;
    chain.pop();

    Ok(())
  }

  fn load_lines(
    &mut self,
    path: &Path,
    text: &str,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      // colours are written as #rrggbb; a trailing
      // comment needs whitespace on both sides of '#'
      if let Some(idx) = line.find(" # ") {
        line = line[..idx].trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path, chain)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }

  fn load_toml(
    &mut self,
    path: &Path,
    text: &str
  ) -> anyhow::Result<()> {
    let table = toml::from_str::<
      toml::Table
    >(text)
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;

    let mut flat = Vec::new();
    flatten_toml("", &table, &mut flat);
    for (key, value) in flat {
      trace!(key = %key, value = %value, "loaded toml config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

fn flatten_toml(
  prefix: &str,
  table: &toml::Table,
  out: &mut Vec<(String, String)>
) {
  for (name, value) in table {
    let key = if prefix.is_empty() {
      name.clone()
    } else {
      format!("{prefix}.{name}")
    };

    match value {
      | toml::Value::Table(inner) => {
        flatten_toml(&key, inner, out);
      }
      | toml::Value::String(s) => {
        out.push((key, s.clone()));
      }
      | toml::Value::Boolean(b) => {
        let text =
          if *b { "on" } else { "off" };
        out.push((key, text.to_string()));
      }
      | other => {
        out.push((key, other.to_string()));
      }
    }
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping {RC_FILE_NAME}"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
