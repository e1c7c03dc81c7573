//! A small untyped document tree, the common currency every format
//! encoder marshals. Mirrors the `map[string]interface{}` shape the
//! original generator passed to its encoders, so the same random
//! document can be rendered as JSON, YAML, XML, TOML, HCL or INI
//! without the generator caring which one it ended up as.

use std::collections::BTreeMap;
use tarpit_rng::SeededRng;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

const FIELD_NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz_";
const STRING_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_.";

/// Grows a random, plausible-looking nested document: object keys read
/// like config field names, leaves are a mix of scalars. Depth is
/// capped so recursion terminates; width is small enough that output
/// stays cheap to generate per request.
pub fn random_document(rng: &mut SeededRng, max_depth: u32, max_fields: usize) -> Value {
    build_object(rng, max_depth, max_fields)
}

fn build_object(rng: &mut SeededRng, depth_remaining: u32, max_fields: usize) -> Value {
    let field_count = rng.int_range(2, max_fields as i64 + 1).max(1) as usize;
    let mut map = BTreeMap::new();
    for _ in 0..field_count {
        let key = field_name(rng);
        let value = build_value(rng, depth_remaining, max_fields);
        map.insert(key, value);
    }
    Value::Object(map)
}

fn build_value(rng: &mut SeededRng, depth_remaining: u32, max_fields: usize) -> Value {
    if depth_remaining == 0 {
        return build_leaf(rng);
    }

    let kinds: [(&str, f64); 4] = [("leaf", 0.55), ("object", 0.2), ("array", 0.15), ("null", 0.1)];
    match rng.weighted(&kinds).copied().unwrap_or(("leaf", 1.0)).0 {
        "object" => build_object(rng, depth_remaining - 1, max_fields),
        "array" => {
            let len = rng.int_range(1, 5).max(1) as usize;
            Value::Array(
                (0..len)
                    .map(|_| build_value(rng, depth_remaining - 1, max_fields))
                    .collect(),
            )
        }
        "null" => Value::Null,
        _ => build_leaf(rng),
    }
}

fn build_leaf(rng: &mut SeededRng) -> Value {
    let kinds: [(&str, f64); 4] = [("string", 0.4), ("int", 0.25), ("float", 0.15), ("bool", 0.2)];
    match rng.weighted(&kinds).copied().unwrap_or(("string", 1.0)).0 {
        "int" => Value::Int(rng.int_range(-1000, 100_000)),
        "float" => Value::Float(rng.float_range(-1000.0, 100_000.0)),
        "bool" => Value::Bool(rng.bool(0.5)),
        _ => Value::String(rng.string(rng_len(rng), STRING_CHARSET)),
    }
}

fn rng_len(rng: &mut SeededRng) -> usize {
    rng.int_range(4, 24).max(1) as usize
}

fn field_name(rng: &mut SeededRng) -> String {
    let len = rng.int_range(3, 12).max(3) as usize;
    rng.string(len, FIELD_NAME_CHARSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_generates_same_document() {
        let mut a = SeededRng::from_seed(99);
        let mut b = SeededRng::from_seed(99);
        assert_eq!(random_document(&mut a, 3, 5), random_document(&mut b, 3, 5));
    }

    #[test]
    fn depth_zero_never_nests() {
        let mut rng = SeededRng::from_seed(1);
        let doc = random_document(&mut rng, 0, 5);
        let obj = doc.as_object().unwrap();
        for v in obj.values() {
            assert!(!matches!(v, Value::Object(_) | Value::Array(_)));
        }
    }
}
