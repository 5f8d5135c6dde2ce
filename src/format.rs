use std::path::Path;

use crate::error::QbError;

/// On-disk formats accepted for query and catalog files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    /// Detect format from a file extension.
    pub fn from_extension(path: &Path) -> Result<Self, QbError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or(QbError::NoExtension)?;

        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            "toml" => Ok(Format::Toml),
            other => Err(QbError::UnknownExtension(other.to_string())),
        }
    }

    /// Parse a format string from CLI flags.
    pub fn from_str_name(s: &str) -> Result<Self, QbError> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            "toml" => Ok(Format::Toml),
            other => Err(QbError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Guess from content when there is no file name to go by. Blank input
    /// counts as JSON.
    pub fn sniff(input: &str) -> Self {
        let trimmed = input.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('[') {
            Format::Json
        } else {
            Format::Yaml
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Json => write!(f, "json"),
            Format::Toml => write!(f, "toml"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_yaml() {
        assert_eq!(Format::from_extension(Path::new("query.yaml")).unwrap(), Format::Yaml);
        assert_eq!(Format::from_extension(Path::new("query.YML")).unwrap(), Format::Yaml);
    }

    #[test]
    fn detect_json_and_toml() {
        assert_eq!(Format::from_extension(Path::new("query.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_extension(Path::new("catalog.toml")).unwrap(), Format::Toml);
    }

    #[test]
    fn extension_errors() {
        assert!(matches!(Format::from_extension(Path::new("query")), Err(QbError::NoExtension)));
        assert!(matches!(
            Format::from_extension(Path::new("query.xml")),
            Err(QbError::UnknownExtension(_))
        ));
    }

    #[test]
    fn from_str_name() {
        assert_eq!(Format::from_str_name("yml").unwrap(), Format::Yaml);
        assert_eq!(Format::from_str_name("JSON").unwrap(), Format::Json);
        assert_eq!(Format::from_str_name("toml").unwrap(), Format::Toml);
        assert!(Format::from_str_name("csv").is_err());
    }

    #[test]
    fn sniff_content() {
        assert_eq!(Format::sniff("  {\"rules\": []}"), Format::Json);
        assert_eq!(Format::sniff("rules: []"), Format::Yaml);
        assert_eq!(Format::sniff(""), Format::Json);
    }
}
