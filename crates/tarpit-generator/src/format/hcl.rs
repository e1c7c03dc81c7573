//! Minimal HCL writer: every top-level object key becomes a block,
//! every leaf a `name = "json-encoded-value"` attribute. Mirrors the
//! original's `mapUnknownHclBlocks`/`mapUnknownValuesToHclBlock`,
//! which did the same flattening with `hclwrite` rather than a
//! typed schema.

use crate::value::Value;
use crate::GeneratorError;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub fn encode(value: &Value) -> Result<Vec<u8>, GeneratorError> {
    let Value::Object(map) = value else {
        return Ok(Vec::new());
    };
    let mut out = String::new();
    for (block_name, block_value) in map {
        write_block(&mut out, block_name, block_value);
    }
    Ok(out.into_bytes())
}

fn write_block(out: &mut String, name: &str, value: &Value) {
    let _ = writeln!(out, "{name} {{");
    if let Value::Object(fields) = value {
        write_attributes(out, fields);
    }
    let _ = writeln!(out, "}}");
}

fn write_attributes(out: &mut String, fields: &BTreeMap<String, Value>) {
    for (key, value) in fields {
        let rendered = serde_json::to_string(&super::value_to_serde_json(value)).unwrap_or_default();
        let _ = writeln!(out, "  {key} = {rendered}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_object_root_is_empty() {
        assert!(encode(&Value::Int(1)).unwrap().is_empty());
    }

    #[test]
    fn block_per_top_level_key() {
        let mut fields = BTreeMap::new();
        fields.insert("port".to_string(), Value::Int(8080));
        let mut root = BTreeMap::new();
        root.insert("server".to_string(), Value::Object(fields));
        let bytes = encode(&Value::Object(root)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("server {"));
        assert!(text.contains("port = 8080"));
    }
}
