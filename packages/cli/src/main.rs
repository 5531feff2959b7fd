#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for importing and geocoding address lists.
//!
//! Uses `indicatif-log-bridge` (via [`csv_mapper_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the progress bar never fight for the terminal.

mod export;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use csv_mapper_address_models::{DEFAULT_MAP_CENTER, centroid};
use csv_mapper_batch::{BatchConfig, BatchCoordinator, LogProgress, ProgressCallback};
use csv_mapper_cli_utils::{IndicatifProgress, MultiProgress};
use csv_mapper_geocoder::service_registry::{self, GeocodingService};
use csv_mapper_import::ImportConfig;

#[derive(Parser)]
#[command(name = "csv_mapper", about = "Geocode address lists from CSV files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file without geocoding and report how many records it holds
    Check {
        /// Address file with a header row
        file: PathBuf,
        /// TOML file with column names and delimiter
        #[arg(long)]
        config: Option<PathBuf>,
        /// Field delimiter (overrides the config file)
        #[arg(long)]
        delimiter: Option<char>,
    },
    /// Import a CSV file and geocode every address
    Geocode {
        /// Address file with a header row
        file: PathBuf,
        /// Write resolved records as a GeoJSON `FeatureCollection` here
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Minimum spacing between provider requests in milliseconds
        /// (defaults to the service's configured rate limit)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// TOML file with column names and delimiter
        #[arg(long)]
        config: Option<PathBuf>,
        /// Field delimiter (overrides the config file)
        #[arg(long)]
        delimiter: Option<char>,
        /// Geocoding service ID (see `services`)
        #[arg(long, default_value = "nominatim")]
        service: String,
        /// Report progress as log lines instead of a terminal bar
        #[arg(long)]
        no_progress: bool,
    },
    /// List the built-in geocoding services
    Services,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = csv_mapper_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Services => {
            println!("{:<16} {:<8} {:>10}  NAME", "ID", "ENABLED", "INTERVAL");
            println!("{}", "-".repeat(60));
            for service in service_registry::all_services() {
                println!(
                    "{:<16} {:<8} {:>8}ms  {}",
                    service.id,
                    service.enabled,
                    service.rate_limit().as_millis(),
                    service.name
                );
            }
        }
        Commands::Check {
            file,
            config,
            delimiter,
        } => {
            let import_config = load_import_config(config.as_deref(), delimiter)?;
            let records = csv_mapper_import::import_path(&file, &import_config)?;
            println!("{}: {} records", file.display(), records.len());
        }
        Commands::Geocode {
            file,
            output,
            interval_ms,
            config,
            delimiter,
            service,
            no_progress,
        } => {
            let import_config = load_import_config(config.as_deref(), delimiter)?;
            let service = select_service(&service)?;

            let mut batch_config = BatchConfig::from_service(&service);
            if let Some(ms) = interval_ms {
                batch_config = batch_config.with_min_interval(Duration::from_millis(ms));
            }

            let geocoder = service.build()?;
            let sink = progress_sink(
                &multi,
                show_bar(no_progress, std::io::stderr().is_terminal()),
                &format!("Geocoding via {}", service.name),
                batch_config.min_interval,
            );
            let coordinator = BatchCoordinator::spawn(geocoder, batch_config, sink)?;

            let start = Instant::now();
            coordinator
                .import_path_and_geocode(&file, &import_config)
                .await?;
            let progress = coordinator.wait_until_done().await;
            let snapshot = coordinator.snapshot();
            coordinator.shutdown().await;

            let coordinates = snapshot.coordinates();
            let center = centroid(&coordinates).unwrap_or(DEFAULT_MAP_CENTER);
            println!(
                "Geocoded {} addresses in {:.1}s: {} resolved, {} unresolved",
                progress.total,
                start.elapsed().as_secs_f64(),
                coordinates.len(),
                snapshot.records.len() - coordinates.len(),
            );
            println!("Center: {:.5}, {:.5}", center.latitude, center.longitude);

            for (record, state) in snapshot.records.iter().zip(&snapshot.states) {
                if !record.is_resolved() {
                    log::info!("Unresolved ({state:?}): {}", record.full_address());
                }
            }

            if let Some(path) = output {
                let collection = export::feature_collection(&snapshot.records);
                std::fs::write(&path, serde_json::to_string_pretty(&collection)?)?;
                println!("Wrote {} features to {}", collection.features.len(), path.display());
            }
        }
    }

    Ok(())
}

/// The bar is only drawn on an interactive terminal; redirected output
/// gets periodic log lines instead.
const fn show_bar(no_progress: bool, stderr_is_terminal: bool) -> bool {
    !no_progress && stderr_is_terminal
}

fn progress_sink(
    multi: &MultiProgress,
    bar: bool,
    label: &str,
    min_interval: Duration,
) -> Arc<dyn ProgressCallback> {
    if bar {
        IndicatifProgress::geocoding_bar(multi, label, min_interval)
    } else {
        log::info!("{label}");
        Arc::new(LogProgress::new())
    }
}

fn load_import_config(
    path: Option<&Path>,
    delimiter: Option<char>,
) -> Result<ImportConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ImportConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => ImportConfig::default(),
    };

    let Some(delimiter) = delimiter else {
        return Ok(config);
    };
    let byte = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| format!("Delimiter must be a single ASCII character, got '{delimiter}'"))?;

    Ok(config.with_delimiter(byte))
}

fn select_service(id: &str) -> Result<GeocodingService, String> {
    let services = service_registry::all_services();
    let Some(service) = services.iter().find(|s| s.id == id).cloned() else {
        let known = services
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(format!("Unknown geocoding service: {id} (available: {known})"));
    };

    if !service.enabled {
        return Err(format!("Geocoding service {id} is disabled"));
    }

    Ok(service.with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_geocode_flags() {
        let cli = Cli::parse_from([
            "csv_mapper",
            "geocode",
            "adressen.csv",
            "--output",
            "out.geojson",
            "--interval-ms",
            "2000",
            "--delimiter",
            ";",
        ]);
        let Commands::Geocode {
            file,
            output,
            interval_ms,
            delimiter,
            service,
            ..
        } = cli.command
        else {
            panic!("expected geocode subcommand");
        };
        assert_eq!(file, PathBuf::from("adressen.csv"));
        assert_eq!(output, Some(PathBuf::from("out.geojson")));
        assert_eq!(interval_ms, Some(2000));
        assert_eq!(delimiter, Some(';'));
        assert_eq!(service, "nominatim");
    }

    #[test]
    fn no_progress_flag_selects_log_output() {
        let cli = Cli::parse_from(["csv_mapper", "geocode", "a.csv", "--no-progress"]);
        let Commands::Geocode { no_progress, .. } = cli.command else {
            panic!("expected geocode subcommand");
        };
        assert!(no_progress);
        assert!(!show_bar(no_progress, true));
    }

    #[test]
    fn bar_only_on_a_terminal() {
        assert!(show_bar(false, true));
        assert!(!show_bar(false, false));
    }

    #[test]
    fn delimiter_flag_overrides_default() {
        let config = load_import_config(None, Some(';')).unwrap();
        assert_eq!(config.delimiter, b';');
    }

    #[test]
    fn rejects_non_ascii_delimiter() {
        assert!(load_import_config(None, Some('§')).is_err());
    }

    #[test]
    fn unknown_service_lists_available_ones() {
        let err = select_service("does-not-exist").unwrap_err();
        assert!(err.contains("nominatim"), "{err}");
    }
}
