use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, anyhow};
use clap::ValueEnum;
use serde_json::Value;
use tracing::{debug, info};

pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Json,
    Jsonl,
}

impl InputFormat {
    /// Guesses the format from a file extension, defaulting to CSV.
    pub fn infer(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Self::Json,
            "jsonl" | "ndjson" => Self::Jsonl,
            _ => Self::Csv,
        }
    }
}

/// Rows of named cells, as read from a CSV or JSON source.
///
/// Empty CSV fields and missing JSON keys both read back as `None` from
/// [`Table::cell`].
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, row: Row) {
        for key in row.keys() {
            if !self.columns.iter().any(|col| col == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path, format: Option<InputFormat>) -> anyhow::Result<Self> {
        let format = format.unwrap_or_else(|| InputFormat::infer(path));

        let table = if path.as_os_str() == "-" {
            debug!(?format, "reading table from stdin");
            Self::from_reader(io::stdin().lock(), format)
        } else {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Self::from_reader(BufReader::new(file), format)
        }
        .with_context(|| format!("failed to read table from {}", path.display()))?;

        info!(
            rows = table.len(),
            columns = ?table.columns,
            ?format,
            "loaded table"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, format: InputFormat) -> anyhow::Result<Self> {
        match format {
            InputFormat::Csv => read_csv(reader),
            InputFormat::Json => read_json(reader),
            InputFormat::Jsonl => read_jsonl(BufReader::new(reader)),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|col| col == name)
    }

    pub fn require_column(&self, name: &str) -> anyhow::Result<()> {
        if self.has_column(name) {
            return Ok(());
        }
        Err(anyhow!(
            "column '{name}' not found; available columns: {}",
            self.columns.join(", ")
        ))
    }

    /// Cell lookup that folds JSON `null` into `None`.
    pub fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
        row.get(column).filter(|value| !value.is_null())
    }
}

fn read_csv<R: Read>(reader: R) -> anyhow::Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut table = Table::new(headers.clone());

    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("invalid CSV record {}", idx + 1))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, field)| {
                let value = if field.is_empty() {
                    Value::Null
                } else {
                    Value::String(field.to_string())
                };
                (name.clone(), value)
            })
            .collect();
        table.rows.push(row);
    }

    Ok(table)
}

fn read_json<R: Read>(reader: R) -> anyhow::Result<Table> {
    let rows: Vec<Row> =
        serde_json::from_reader(reader).context("expected a JSON array of objects")?;
    Ok(Table::from_rows(rows))
}

fn read_jsonl<R: BufRead>(reader: R) -> anyhow::Result<Table> {
    let mut table = Table::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: Row = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON object at line {}", idx + 1))?;
        table.push_row(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::{InputFormat, Table};

    #[test]
    fn csv_empty_fields_become_missing() {
        let raw = "date,value\n2023-01-01,hi\n2023-01-02,\n";
        let table = Table::from_reader(raw.as_bytes(), InputFormat::Csv).expect("csv");

        assert_eq!(table.columns(), ["date", "value"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            Table::cell(&table.rows()[0], "value"),
            Some(&json!("hi"))
        );
        assert_eq!(Table::cell(&table.rows()[1], "value"), None);
    }

    #[test]
    fn jsonl_collects_union_of_keys() {
        let raw = "{\"date\":\"2023-01-01\"}\n\n{\"date\":\"2023-01-02\",\"user\":\"kim\"}\n";
        let table = Table::from_reader(raw.as_bytes(), InputFormat::Jsonl).expect("jsonl");

        assert_eq!(table.len(), 2);
        assert!(table.has_column("user"));
        assert!(table.require_column("value").is_err());
    }

    #[test]
    fn json_array_is_read() {
        let raw = r#"[{"date": 1672531200, "value": null}]"#;
        let table = Table::from_reader(raw.as_bytes(), InputFormat::Json).expect("json");

        assert_eq!(table.len(), 1);
        assert_eq!(Table::cell(&table.rows()[0], "value"), None);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(InputFormat::infer(Path::new("chat.json")), InputFormat::Json);
        assert_eq!(InputFormat::infer(Path::new("chat.NDJSON")), InputFormat::Jsonl);
        assert_eq!(InputFormat::infer(Path::new("chat.csv")), InputFormat::Csv);
        assert_eq!(InputFormat::infer(Path::new("-")), InputFormat::Csv);
    }
}
