//! INI writer built on the `ini` crate. Top-level object keys become
//! sections, nested scalars become keys -- same flattening the
//! original performed by hand with `gopkg.in/ini.v1`.

use crate::value::Value;
use crate::GeneratorError;

pub fn encode(value: &Value) -> Result<Vec<u8>, GeneratorError> {
    let Value::Object(map) = value else {
        return Ok(Vec::new());
    };

    let mut file = ini::Ini::new();
    for (section_name, section_value) in map {
        if let Value::Object(fields) = section_value {
            let mut section = file.with_section(Some(section_name.clone()));
            for (key, field_value) in fields {
                section.set(key.clone(), render_scalar(field_value));
            }
        }
    }

    let mut buf = Vec::new();
    file.write_to(&mut buf).map_err(|e| GeneratorError::Encode(e.to_string()))?;
    Ok(buf)
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(&super::value_to_serde_json(other)).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn section_per_top_level_key() {
        let mut fields = BTreeMap::new();
        fields.insert("host".to_string(), Value::String("localhost".to_string()));
        let mut root = BTreeMap::new();
        root.insert("database".to_string(), Value::Object(fields));
        let bytes = encode(&Value::Object(root)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("[database]"));
        assert!(text.contains("host"));
    }
}
