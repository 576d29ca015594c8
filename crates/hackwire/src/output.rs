use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hackwire_frame::{Catalog, FieldValue, Message};
use serde::Serialize;

const PREVIEW_LIMIT: usize = 96;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FieldOutput<'a> {
    name: &'a str,
    kind: String,
    size: usize,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    opcode: u8,
    name: &'a str,
    fields: Vec<FieldOutput<'a>>,
    source: &'a str,
    timestamp: String,
}

/// Print one decoded message. `catalog` supplies field names.
pub fn print_message(message: &Message, catalog: &Catalog, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                opcode: message.opcode,
                name: &message.name,
                fields: field_outputs(message, catalog),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "OPCODE", "FIELD", "SIZE", "VALUE"]);
            let fields = field_outputs(message, catalog);
            if fields.is_empty() {
                table.add_row(vec![
                    message.name.clone(),
                    message.opcode.to_string(),
                    "-".to_string(),
                    "0".to_string(),
                    String::new(),
                ]);
            }
            for field in fields {
                table.add_row(vec![
                    message.name.clone(),
                    message.opcode.to_string(),
                    format!("{} ({})", field.name, field.kind),
                    field.size.to_string(),
                    preview_value(&field.value),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut line = format!("{} opcode={} source={}", message.name, message.opcode, source);
            for field in field_outputs(message, catalog) {
                line.push_str(&format!(" {}={}", field.name, preview_value(&field.value)));
            }
            println!("{line}");
        }
        OutputFormat::Raw => {
            if let Some(field) = message.fields.last() {
                print_raw(&raw_bytes(field));
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn field_outputs<'a>(message: &'a Message, catalog: &'a Catalog) -> Vec<FieldOutput<'a>> {
    let spec = catalog.by_opcode(message.opcode);
    message
        .fields
        .iter()
        .enumerate()
        .map(|(idx, value)| FieldOutput {
            name: spec
                .and_then(|spec| spec.fields.get(idx))
                .map(|field| field.name.as_str())
                .unwrap_or("?"),
            kind: value.kind().to_string(),
            size: raw_bytes(value).len(),
            value: json_value(value),
        })
        .collect()
}

fn json_value(value: &FieldValue) -> serde_json::Value {
    match value {
        FieldValue::Text(text) => serde_json::Value::String(text.clone()),
        FieldValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => serde_json::Value::String(text.to_string()),
            Err(_) => serde_json::Value::String(format!("<binary {} bytes>", bytes.len())),
        },
        FieldValue::Structured(value) => value.clone(),
    }
}

fn raw_bytes(value: &FieldValue) -> Vec<u8> {
    match value {
        FieldValue::Bytes(bytes) => bytes.to_vec(),
        FieldValue::Text(text) => text.as_bytes().to_vec(),
        FieldValue::Structured(value) => value.to_string().into_bytes(),
    }
}

fn preview_value(value: &serde_json::Value) -> String {
    let text = match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= PREVIEW_LIMIT {
        return text;
    }
    let cut: String = text.chars().take(PREVIEW_LIMIT).collect();
    format!("{cut}…")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
