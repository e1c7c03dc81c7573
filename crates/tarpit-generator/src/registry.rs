//! Path-to-format dispatch, mirroring the original's
//! `GetEncoderForPath`: the requested path's extension picks the
//! format a response is rendered in, falling back to JSON when
//! nothing matches.

use crate::format::Format;

const RULES: &[(&[&str], Format)] = &[
    (&[".yaml", ".yml"], Format::Yaml),
    (&[".json", ".json5"], Format::Json),
    (&[".xml"], Format::Xml),
    (&[".toml"], Format::Toml),
    (&[".hcl", ".tf", ".tfvars"], Format::Hcl),
    (&[".ini"], Format::Ini),
    (&[".csv"], Format::Csv),
    (&[".sql"], Format::Sql),
];

/// Picks a [`Format`] for `path` by matching its suffix against a
/// fixed extension table, defaulting to JSON.
pub fn for_path(path: &str) -> Format {
    let lower = path.to_lowercase();
    for (suffixes, format) in RULES {
        if suffixes.iter().any(|suffix| lower.ends_with(suffix)) {
            return *format;
        }
    }
    Format::Json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_extensions() {
        assert_eq!(for_path("config.yaml"), Format::Yaml);
        assert_eq!(for_path("main.tf"), Format::Hcl);
        assert_eq!(for_path("export.CSV"), Format::Csv);
    }

    #[test]
    fn defaults_to_json() {
        assert_eq!(for_path("/unknown/path"), Format::Json);
        assert_eq!(for_path(""), Format::Json);
    }
}
