use schwab_api_wrapper::UtcDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Document printed on stdout for every successful command.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub meta: Meta,
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub command: &'static str,
    pub generated_at: UtcDateTime,
    pub mock: bool,
}

impl Envelope {
    pub fn new(command: &'static str, mock: bool, data: Value) -> Self {
        Self {
            meta: Meta {
                command,
                generated_at: UtcDateTime::now(),
                mock,
            },
            data,
        }
    }
}

pub fn render(envelope: &Envelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope)?),
    }
    Ok(())
}

fn render_table(envelope: &Envelope) -> Result<String, CliError> {
    let mut out = String::new();
    out.push_str(&format!("command     : {}\n", envelope.meta.command));
    out.push_str(&format!("generated_at: {}\n", envelope.meta.generated_at));
    if envelope.meta.mock {
        out.push_str("mock        : true\n");
    }
    out.push('\n');

    match &envelope.data {
        Value::Array(rows) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
            out.push_str(&rows_table(rows));
        }
        Value::Object(fields) => out.push_str(&fields_table(fields)?),
        other => {
            for line in serde_json::to_string_pretty(other)?.lines() {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

/// One row per object, one column per scalar field seen in any row.
fn rows_table(rows: &[Value]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        for (key, value) in row {
            if is_scalar(value) && !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .filter_map(Value::as_object)
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(*column).map(scalar_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{column:<width$}"))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// `key: value` lines; nested values are printed as indented JSON.
fn fields_table(fields: &Map<String, Value>) -> Result<String, CliError> {
    let width = fields.keys().map(String::len).max().unwrap_or_default();
    let mut out = String::new();
    for (key, value) in fields {
        if is_scalar(value) {
            out.push_str(&format!("{key:<width$} : {}\n", scalar_text(value)));
        } else {
            out.push_str(&format!("{key}:\n"));
            for line in serde_json::to_string_pretty(value)?.lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
