//! Config validation CLI tool
//!
//! Validates a proctord configuration file and prints the effective thresholds.

use proctor_config::{ConfigError, CURRENT_CONFIG_VERSION};
use proctor_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a proctord configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match proctor_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Effective settings:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Enrollment: {} stable frames", policy.enrollment.stable_frames);
            println!(
                "  Identity: tolerance {}, terminate after {} episodes",
                policy.identity.tolerance, policy.identity.max_violations
            );
            let labels: Vec<&str> = policy.objects.target_labels.iter().map(String::as_str).collect();
            println!(
                "  Objects: [{}] every {} frames",
                labels.join(", "),
                policy.objects.sample_every_n_frames
            );
            println!(
                "  Gaze: dwell {}s, per-direction limit {}, total limit {}",
                policy.gaze.dwell_seconds, policy.gaze.max_per_direction, policy.gaze.max_total
            );
            println!(
                "  Iris: on {} / release {}, dwell {}s, fault limit {} (divisor {})",
                policy.iris.horizontal_on,
                policy.iris.horizontal_release,
                policy.iris.dwell_seconds,
                policy.iris.fault_limit,
                policy.iris.fault_count_divisor
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
