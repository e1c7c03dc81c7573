//! Secret-shaped bait, injected into generated documents so scanners
//! that grep checked-out config for credentials have something
//! plausible-looking to "find" (and waste time verifying).
//!
//! The original generator drove this from a table of regexes pulled
//! from gitleaks' public rule set and a general-purpose regex string
//! generator. We keep the same shape -- a weighted table of named
//! rules, each producing a key name and a secret value -- but render
//! both from fixed templates instead of compiling arbitrary regexes,
//! since pulling in a full regex-to-string generator crate for four
//! built-in shapes would be a bigger dependency than the feature
//! warrants.

use tarpit_rng::SeededRng;

use crate::value::Value;

const HEX_CHARSET: &[u8] = b"0123456789abcdef";
const ALNUM_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

struct SecretRule {
    name: &'static str,
    weight: f64,
    name_prefixes: &'static [&'static str],
    render: fn(&mut SeededRng) -> String,
}

fn render_aws_key(rng: &mut SeededRng) -> String {
    format!("AKIA{}", rng.string(16, ALNUM_CHARSET).to_uppercase())
}

fn render_github_token(rng: &mut SeededRng) -> String {
    format!("ghp_{}", rng.string(36, ALNUM_CHARSET))
}

fn render_generic_hex(rng: &mut SeededRng) -> String {
    rng.string(40, HEX_CHARSET)
}

fn render_bearer_jwt_like(rng: &mut SeededRng) -> String {
    format!(
        "eyJ{}.{}.{}",
        rng.string(20, ALNUM_CHARSET),
        rng.string(40, ALNUM_CHARSET),
        rng.string(24, ALNUM_CHARSET)
    )
}

const RULES: &[SecretRule] = &[
    SecretRule {
        name: "aws_access_key",
        weight: 1.0,
        name_prefixes: &["aws_access_key_id", "aws_key", "s3_access_key"],
        render: render_aws_key,
    },
    SecretRule {
        name: "github_token",
        weight: 1.0,
        name_prefixes: &["github_token", "gh_token", "vcs_token"],
        render: render_github_token,
    },
    SecretRule {
        name: "generic_api_secret",
        weight: 1.5,
        name_prefixes: &["api_secret", "api_key", "client_secret", "service_token"],
        render: render_generic_hex,
    },
    SecretRule {
        name: "bearer_token",
        weight: 1.0,
        name_prefixes: &["auth_token", "bearer_token", "session_token"],
        render: render_bearer_jwt_like,
    },
];

/// Injects `count` secret-shaped key/value pairs into `document` and,
/// recursively, into every nested object it contains -- matching the
/// original's `InjectSecrets`, which walks the whole tree rather than
/// injecting once at the root.
pub fn inject_secrets(rng: &mut SeededRng, document: &mut Value, count: usize) {
    if let Value::Object(map) = document {
        for _ in 0..count {
            let rule = pick_rule(rng);
            let prefix = rng.choice(rule.name_prefixes).copied().unwrap_or("secret");
            let key = format!("{prefix}_{}", rng.string(4, ALNUM_CHARSET).to_lowercase());
            map.insert(key, Value::String((rule.render)(rng)));
        }

        let nested: Vec<&mut Value> = map.values_mut().collect();
        for value in nested {
            inject_into_value(rng, value, count);
        }
    }
}

fn inject_into_value(rng: &mut SeededRng, value: &mut Value, count: usize) {
    match value {
        Value::Object(_) => inject_secrets(rng, value, count),
        Value::Array(items) => {
            for item in items {
                inject_into_value(rng, item, count);
            }
        }
        _ => {}
    }
}

fn pick_rule(rng: &mut SeededRng) -> &'static SecretRule {
    let weighted: Vec<(&SecretRule, f64)> = RULES.iter().map(|r| (r, r.weight)).collect();
    rng.weighted(&weighted).copied().unwrap_or(&RULES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn injects_requested_count_at_root() {
        let mut rng = SeededRng::from_seed(5);
        let mut doc = Value::Object(BTreeMap::new());
        inject_secrets(&mut rng, &mut doc, 5);
        assert_eq!(doc.as_object().unwrap().len(), 5);
    }

    #[test]
    fn recurses_into_nested_objects() {
        let mut rng = SeededRng::from_seed(5);
        let mut nested = BTreeMap::new();
        nested.insert("child".to_string(), Value::Object(BTreeMap::new()));
        let mut doc = Value::Object(nested);
        inject_secrets(&mut rng, &mut doc, 2);

        let child = doc.as_object().unwrap().get("child").unwrap();
        assert!(!child.as_object().unwrap().is_empty());
    }
}
