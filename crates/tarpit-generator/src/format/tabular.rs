//! Flat-record generation for the tabular formats (CSV, SQL), grounded
//! on the original generator's fixed fake-user-record schema: a row
//! always has the same ten named columns, only the values change.

use tarpit_rng::SeededRng;

pub const HEADER_FIELDS: [&str; 10] = [
    "Id", "FirstName", "LastName", "Email", "Phone", "Postcode", "City", "Country", "CcNumber",
    "CcType",
];

const FIRST_NAMES: &[&str] = &["Alex", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Sam", "Drew"];
const LAST_NAMES: &[&str] = &["Smith", "Johnson", "Brown", "Taylor", "Davies", "Evans", "Wilson"];
const CITIES: &[&str] = &["Springfield", "Fairview", "Riverside", "Georgetown", "Madison"];
const CC_TYPES: &[&str] = &["visa", "mastercard", "amex", "discover"];
const HEX_CHARSET: &[u8] = b"0123456789abcdef";
const DIGIT_CHARSET: &[u8] = b"0123456789";

pub fn generate_row(rng: &mut SeededRng) -> Vec<String> {
    let first = rng.choice(FIRST_NAMES).copied().unwrap_or("Alex");
    let last = rng.choice(LAST_NAMES).copied().unwrap_or("Smith");
    vec![
        fake_uuid(rng),
        first.to_string(),
        last.to_string(),
        format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        format!("+1{}", rng.string(10, DIGIT_CHARSET)),
        rng.string(5, DIGIT_CHARSET),
        rng.choice(CITIES).copied().unwrap_or("Springfield").to_string(),
        "USA".to_string(),
        rng.string(16, DIGIT_CHARSET),
        rng.choice(CC_TYPES).copied().unwrap_or("visa").to_string(),
    ]
}

fn fake_uuid(rng: &mut SeededRng) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        rng.string(8, HEX_CHARSET),
        rng.string(4, HEX_CHARSET),
        rng.string(4, HEX_CHARSET),
        rng.string(4, HEX_CHARSET),
        rng.string(12, HEX_CHARSET)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_has_one_value_per_header() {
        let mut rng = SeededRng::from_seed(1);
        let row = generate_row(&mut rng);
        assert_eq!(row.len(), HEADER_FIELDS.len());
    }
}
