//! XML body writer using `quick-xml`'s event writer. Array items get
//! an index-suffixed tag name (`item.0`, `item.1`, ...) the same way
//! the original's `UnknownMap.MarshalXML` flattened `[]interface{}`
//! into repeated named elements -- XML has no native array type.

use crate::value::Value;
use crate::GeneratorError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

pub fn encode(value: &Value) -> Result<Vec<u8>, GeneratorError> {
    let Value::Object(map) = value else {
        return Ok(Vec::new());
    };

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    for (key, field_value) in map {
        write_element(&mut writer, key, field_value)?;
    }
    Ok(writer.into_inner().into_inner())
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &Value) -> Result<(), GeneratorError> {
    let err = |e: quick_xml::Error| GeneratorError::Encode(e.to_string());

    match value {
        Value::Object(fields) => {
            writer.write_event(Event::Start(BytesStart::new(name))).map_err(err)?;
            for (key, nested) in fields {
                write_element(writer, key, nested)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name))).map_err(err)?;
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                write_element(writer, &format!("{name}.{index}"), item)?;
            }
        }
        leaf => {
            writer.write_event(Event::Start(BytesStart::new(name))).map_err(err)?;
            writer
                .write_event(Event::Text(BytesText::new(&leaf_text(leaf))))
                .map_err(err)?;
            writer.write_event(Event::End(BytesEnd::new(name))).map_err(err)?;
        }
    }
    Ok(())
}

fn leaf_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn leaf_becomes_a_tag_with_text() {
        let mut root = BTreeMap::new();
        root.insert("name".to_string(), Value::String("tarpit".to_string()));
        let bytes = encode(&Value::Object(root)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<name>"));
        assert!(text.contains("tarpit"));
    }

    #[test]
    fn array_items_get_index_suffixed_tags() {
        let mut root = BTreeMap::new();
        root.insert(
            "item".to_string(),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
        );
        let bytes = encode(&Value::Object(root)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("item.0"));
        assert!(text.contains("item.1"));
    }
}
