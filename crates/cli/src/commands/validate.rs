//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{MalformedPolicy, ProcessingConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    window_minutes: u32,
    channels: Vec<String>,
    calculate_hrv: bool,
    ppi_range_ms: (f64, f64),
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<String>,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    window_minutes: config.analysis.window_minutes,
                    channels: config
                        .analysis
                        .channels
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    calculate_hrv: config.analysis.calculate_hrv,
                    ppi_range_ms: (config.ppi.low_ms, config.ppi.high_ms),
                    time_range: config.time_range.as_ref().map(|r| r.label()),
                    sink_count: config.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ProcessingConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - default log/csv/json sinks will be used".to_string());
    }

    if !config.analysis.calculate_hrv {
        warnings.push("HRV calculation disabled - only PPI values will be exported".to_string());
    }

    if config.analysis.gap_minutes >= f64::from(config.analysis.window_minutes) {
        warnings.push(format!(
            "analysis.gap_minutes ({}) is not shorter than window_minutes ({}) - gaps will never split windows",
            config.analysis.gap_minutes, config.analysis.window_minutes
        ));
    }

    if !config.analysis.subtract_ambient {
        warnings.push("Ambient light subtraction disabled".to_string());
    }

    if config.reader.malformed == MalformedPolicy::Skip {
        warnings.push("Malformed records will be skipped instead of aborting".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Window: {} min", summary.window_minutes);
            println!("  Channels: {}", summary.channels.join(", "));
            println!("  HRV: {}", if summary.calculate_hrv { "on" } else { "off" });
            println!(
                "  PPI range: {}-{} ms",
                summary.ppi_range_ms.0, summary.ppi_range_ms.1
            );
            if let Some(ref range) = summary.time_range {
                println!("  Time range: {}", range);
            }
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: true,
        }
    }

    #[test]
    fn test_valid_config_has_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ppg.toml");
        std::fs::write(
            &path,
            "[analysis]\nchannels = [\"p0\"]\ncalculate_hrv = false\n\n[time_range]\nstart = \"22:00\"\nend = \"23:00\"\n",
        )
        .unwrap();

        let result = validate_config(&args(path));
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.channels, vec!["P0"]);
        assert_eq!(summary.time_range.as_deref(), Some("22:00-23:00"));

        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.starts_with("No sinks configured")));
        assert!(warnings.iter().any(|w| w.starts_with("HRV calculation disabled")));
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ppg.toml");
        std::fs::write(&path, "[ppi]\nlow_ms = 1500\nhigh_ms = 1200\n").unwrap();

        let result = validate_config(&args(path));
        assert!(!result.valid);
        assert!(result.error.is_some());
        assert!(run_validate(&ValidateArgs {
            config: dir.path().join("ppg.toml"),
            json: true,
        })
        .is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/ppg.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().starts_with("File not found"));
    }
}
