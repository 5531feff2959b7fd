//! Column mapping and parser settings for the importer.
//!
//! Defaults match the German header row the address lists are exported
//! with (`Vorname`, `Name`, `Strasse`, `PLZ`, `Ort`). Other layouts can be
//! described in a small TOML file:
//!
//! ```toml
//! delimiter = ";"
//!
//! [columns]
//! first_name = "First Name"
//! postal_code = "ZIP"
//! ```

use serde::{Deserialize, Deserializer};

use crate::ImportError;

/// Header names of the required columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Header of the given-name column.
    pub first_name: String,
    /// Header of the family-name column.
    pub last_name: String,
    /// Header of the street column.
    pub street: String,
    /// Header of the postal-code column.
    pub postal_code: String,
    /// Header of the city column.
    pub city: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            first_name: "Vorname".to_owned(),
            last_name: "Name".to_owned(),
            street: "Strasse".to_owned(),
            postal_code: "PLZ".to_owned(),
            city: "Ort".to_owned(),
        }
    }
}

/// Importer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Required column headers.
    pub columns: ColumnNames,
    /// Field delimiter byte.
    #[serde(deserialize_with = "deserialize_delimiter")]
    pub delimiter: u8,
    /// Strip surrounding whitespace from every field.
    pub trim: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            delimiter: b',',
            trim: true,
        }
    }
}

impl ImportConfig {
    /// Parses a TOML document; missing keys fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Config`] if the document is not valid TOML or
    /// the delimiter is not a single ASCII character.
    pub fn from_toml_str(s: &str) -> Result<Self, ImportError> {
        Ok(toml::de::from_str(s)?)
    }

    /// Returns a copy with the given delimiter.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn deserialize_delimiter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let s = String::deserialize(deserializer)?;
    let unescaped = if s == "\\t" { "\t" } else { s.as_str() };
    match unescaped.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(serde::de::Error::custom(format!(
            "delimiter must be a single ASCII character, got '{s}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(ImportConfig::from_toml_str("").unwrap(), ImportConfig::default());
    }

    #[test]
    fn partial_columns_keep_other_defaults() {
        let config = ImportConfig::from_toml_str("[columns]\npostal_code = \"ZIP\"\n").unwrap();
        assert_eq!(config.columns.postal_code, "ZIP");
        assert_eq!(config.columns.city, "Ort");
        assert_eq!(config.delimiter, b',');
    }

    #[test]
    fn tab_delimiter_escape() {
        let config = ImportConfig::from_toml_str("delimiter = '\\t'\n").unwrap();
        assert_eq!(config.delimiter, b'\t');
    }

    #[test]
    fn rejects_multi_character_delimiter() {
        assert!(ImportConfig::from_toml_str("delimiter = \";;\"\n").is_err());
    }
}
