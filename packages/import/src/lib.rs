#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Delimited-file importer for address lists.
//!
//! Reads a UTF-8 file with a header row and maps the configured column
//! names onto [`AddressRecord`]s. The import is all-or-nothing: a single
//! row with a missing or empty required field fails the whole file, so a
//! caller never sees a partial record list.

pub mod config;

use std::io::Read;
use std::path::Path;

use csv_mapper_address_models::AddressRecord;

pub use config::{ColumnNames, ImportConfig};

/// Errors from importing an address file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file could not be opened or decoded.
    #[error("Unreadable input: {0}")]
    Unreadable(#[from] csv::Error),

    /// The header row lacks a required column.
    #[error("Missing required column '{column}' in header row")]
    MissingColumn {
        /// Configured header name that was not found.
        column: String,
    },

    /// A data row lacks a value for a required column.
    #[error("Row {row} is missing a value for '{column}'")]
    MalformedRow {
        /// 1-based data row number (the header row is not counted).
        row: usize,
        /// Header name of the missing field.
        column: String,
    },

    /// The import configuration could not be parsed.
    #[error("Invalid import configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Positions of the required columns within a row.
struct ColumnIndex {
    first_name: usize,
    last_name: usize,
    street: usize,
    postal_code: usize,
    city: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord, names: &ColumnNames) -> Result<Self, ImportError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ImportError::MissingColumn {
                    column: name.to_owned(),
                })
        };

        Ok(Self {
            first_name: find(&names.first_name)?,
            last_name: find(&names.last_name)?,
            street: find(&names.street)?,
            postal_code: find(&names.postal_code)?,
            city: find(&names.city)?,
        })
    }
}

/// Imports address records from any reader.
///
/// # Errors
///
/// * [`ImportError::Unreadable`] if the input is not valid CSV / UTF-8.
/// * [`ImportError::MissingColumn`] if a required header is absent.
/// * [`ImportError::MalformedRow`] if any row lacks a required value.
pub fn import_reader<R: Read>(
    reader: R,
    config: &ImportConfig,
) -> Result<Vec<AddressRecord>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::from_headers(&headers, &config.columns)?;

    let mut records = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row = result?;
        let row_number = i + 1;

        let field = |idx: usize, name: &str| -> Result<String, ImportError> {
            let raw = row.get(idx).unwrap_or("");
            let value = if config.trim { raw.trim() } else { raw };
            if value.trim().is_empty() {
                return Err(ImportError::MalformedRow {
                    row: row_number,
                    column: name.to_owned(),
                });
            }
            Ok(value.to_owned())
        };

        let names = &config.columns;
        records.push(AddressRecord::new(
            field(index.first_name, &names.first_name)?,
            field(index.last_name, &names.last_name)?,
            field(index.street, &names.street)?,
            field(index.postal_code, &names.postal_code)?,
            field(index.city, &names.city)?,
        ));
    }

    log::info!("Imported {} address records", records.len());

    Ok(records)
}

/// Imports address records from a file on disk.
///
/// # Errors
///
/// Same as [`import_reader`]; a file that cannot be opened is reported as
/// [`ImportError::Unreadable`].
pub fn import_path(path: &Path, config: &ImportConfig) -> Result<Vec<AddressRecord>, ImportError> {
    log::debug!("Importing addresses from {}", path.display());
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    import_reader(file, config)
}
