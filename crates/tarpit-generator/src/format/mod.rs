//! Format encoders: render a [`crate::value::Value`] (or, for the
//! tabular formats, a generated row) into the bytes of a specific
//! document syntax. Each encoder mirrors the original's `Encoder`
//! interface -- `start`/`marshal`/`delimiter`/`end` -- so a staller
//! can treat every format as an opaque byte-producing pipe.

mod hcl;
mod ini;
mod tabular;
mod xml;

use crate::value::Value;
use crate::GeneratorError;
use tarpit_rng::SeededRng;

pub use tabular::HEADER_FIELDS as TABULAR_HEADER_FIELDS;

pub fn tabular_row(rng: &mut SeededRng) -> Vec<String> {
    tabular::generate_row(rng)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Xml,
    Toml,
    Hcl,
    Ini,
    Csv,
    Sql,
}

impl Format {
    pub const ALL: &'static [Format] = &[
        Format::Json,
        Format::Yaml,
        Format::Xml,
        Format::Toml,
        Format::Hcl,
        Format::Ini,
        Format::Csv,
        Format::Sql,
    ];

    pub fn is_tabular(&self) -> bool {
        matches!(self, Format::Csv | Format::Sql)
    }

    pub fn start(&self) -> Vec<u8> {
        match self {
            Format::Xml => br#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?><root>"#.to_vec(),
            Format::Csv => format!("{}\n", tabular::HEADER_FIELDS.join(",")).into_bytes(),
            Format::Sql => format!(
                "INSERT INTO `UserRecords` (`{}`) VALUES (\n",
                tabular::HEADER_FIELDS.join("`, `")
            )
            .into_bytes(),
            _ => Vec::new(),
        }
    }

    pub fn end(&self) -> Vec<u8> {
        match self {
            Format::Xml => b"</root>".to_vec(),
            Format::Csv => b"\n".to_vec(),
            Format::Sql => b")".to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn delimiter(&self) -> Vec<u8> {
        match self {
            Format::Csv => b"\n".to_vec(),
            Format::Sql => b",\n".to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Yaml => "application/x-yaml",
            Format::Xml => "application/xml",
            Format::Toml => "application/toml",
            Format::Hcl => "application/hcl",
            Format::Ini => "text/plain",
            Format::Csv => "text/csv",
            Format::Sql => "text/plain",
        }
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, GeneratorError> {
        match self {
            Format::Json => encode_json(value),
            Format::Yaml => encode_yaml(value),
            Format::Xml => xml::encode(value),
            Format::Toml => encode_toml(value),
            Format::Hcl => hcl::encode(value),
            Format::Ini => ini::encode(value),
            Format::Csv | Format::Sql => {
                Err(GeneratorError::Encode("tabular formats render rows, not documents".into()))
            }
        }
    }

    pub fn encode_row(&self, row: &[String]) -> Result<Vec<u8>, GeneratorError> {
        match self {
            Format::Csv => encode_csv_row(row),
            Format::Sql => Ok(format!("(`{}`)", row.join("`, `")).into_bytes()),
            _ => Err(GeneratorError::Encode("non-tabular format asked to render a row".into())),
        }
    }
}

pub(super) fn value_to_serde_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_serde_json).collect()),
        Value::Object(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                obj.insert(k.clone(), value_to_serde_json(v));
            }
            serde_json::Value::Object(obj)
        }
    }
}

fn encode_json(value: &Value) -> Result<Vec<u8>, GeneratorError> {
    serde_json::to_vec(&value_to_serde_json(value)).map_err(|e| GeneratorError::Encode(e.to_string()))
}

fn encode_yaml(value: &Value) -> Result<Vec<u8>, GeneratorError> {
    serde_yaml::to_string(&value_to_serde_json(value))
        .map(|s| s.into_bytes())
        .map_err(|e| GeneratorError::Encode(e.to_string()))
}

fn encode_toml(value: &Value) -> Result<Vec<u8>, GeneratorError> {
    // toml::Value does not accept a bare scalar or array at the document
    // root, only tables -- mirrors the original, which silently dropped
    // non-map input (`if v == nil { return nil, nil }`).
    let Value::Object(_) = value else {
        return Ok(Vec::new());
    };
    let json = value_to_serde_json(value);
    let toml_value: toml::Value = serde_json::from_value(json).map_err(|e| GeneratorError::Encode(e.to_string()))?;
    toml::to_string_pretty(&toml_value)
        .map(|s| s.into_bytes())
        .map_err(|e| GeneratorError::Encode(e.to_string()))
}

fn encode_csv_row(row: &[String]) -> Result<Vec<u8>, GeneratorError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer
        .write_record(row)
        .map_err(|e| GeneratorError::Encode(e.to_string()))?;
    writer.into_inner().map_err(|e| GeneratorError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_round_trips_through_serde() {
        let mut map = BTreeMap::new();
        map.insert("key".to_string(), Value::String("value".to_string()));
        let doc = Value::Object(map);
        let bytes = Format::Json.encode(&doc).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn toml_root_must_be_a_table() {
        let bytes = Format::Toml.encode(&Value::Int(5)).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn csv_row_is_comma_joined() {
        let row = vec!["a".to_string(), "b,c".to_string()];
        let bytes = Format::Csv.encode_row(&row).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"b,c\""));
    }
}
