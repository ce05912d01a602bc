//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// campusctl - administrative client for the campus platform services
///
/// Aggregates statistics from every service into one dashboard and drives
/// long-running server jobs such as the enrollment calculation.
///
/// Examples:
///   campusctl login --username admin
///   campusctl stats --format json --output stats.json
///   campusctl enroll --download --dest ./reports
///   campusctl download /uploads/enrollment/enrollment_20240701_120000.xlsx
///   campusctl --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .campusctl.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the deployment (scheme and host)
    ///
    /// Each service is reached on its own port below this host.
    #[arg(long, value_name = "URL", env = "CAMPUSCTL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token to use instead of the stored session
    #[arg(
        long,
        value_name = "TOKEN",
        env = "CAMPUSCTL_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .campusctl.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in and store the session token
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (prefer the environment variable over the flag)
        #[arg(short, long, env = "CAMPUSCTL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session token
    Logout,

    /// Fetch the statistics of every service and render a dashboard
    Stats {
        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Write the dashboard to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Exit with code 2 when any service failed to answer
        #[arg(long)]
        strict: bool,
    },

    /// Check the health endpoint of every service
    Health {
        /// Exit with code 2 when any service is unhealthy
        #[arg(long)]
        strict: bool,
    },

    /// Run the enrollment calculation and follow its progress
    ///
    /// Ctrl-C stops following the job; the calculation keeps running on the server.
    Enroll {
        /// Delay between status requests in milliseconds
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Download the resulting spreadsheet when the job completes
        #[arg(long)]
        download: bool,

        /// Directory for the downloaded spreadsheet
        #[arg(long, value_name = "DIR", default_value = ".")]
        dest: PathBuf,

        /// Print status lines instead of a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Download a produced artifact by its file path or name
    Download {
        /// `file_path` reported by a completed job, or the bare file name
        #[arg(value_name = "FILE_PATH_OR_NAME")]
        artifact: String,

        /// Destination directory
        #[arg(long, value_name = "DIR", default_value = ".")]
        dest: PathBuf,
    },
}

/// Output format for the dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("A command is required (see --help)".to_string());
        };

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match command {
            Command::Login { username, password } => {
                if username.trim().is_empty() {
                    return Err("Username must not be empty".to_string());
                }
                if password.is_empty() {
                    return Err("Password must not be empty".to_string());
                }
            }
            Command::Enroll {
                interval_ms: Some(0),
                ..
            } => {
                return Err("Polling interval must be at least 1 ms".to_string());
            }
            Command::Download { artifact, .. } if artifact.trim().is_empty() => {
                return Err("Artifact name must not be empty".to_string());
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            config: None,
            api_url: Some("http://localhost".to_string()),
            token: None,
            timeout: None,
            verbose: false,
            quiet: false,
            init_config: false,
            command: Some(Command::Stats {
                format: None,
                output: None,
                strict: false,
            }),
        }
    }

    #[test]
    fn test_parse_enroll() {
        let args = Args::parse_from([
            "campusctl",
            "enroll",
            "--download",
            "--dest",
            "out",
            "-v",
        ]);
        assert!(args.verbose);
        assert_eq!(
            args.command,
            Some(Command::Enroll {
                interval_ms: None,
                download: true,
                dest: PathBuf::from("out"),
                no_progress: false,
            })
        );
    }

    #[test]
    fn test_parse_stats_format() {
        let args = Args::parse_from(["campusctl", "stats", "--format", "json", "--strict"]);
        match args.command {
            Some(Command::Stats { format, strict, .. }) => {
                assert_eq!(format, Some(OutputFormat::Json));
                assert!(strict);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("localhost:8000".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_command() {
        let mut args = make_args();
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut args = make_args();
        args.command = Some(Command::Enroll {
            interval_ms: Some(0),
            download: false,
            dest: PathBuf::from("."),
            no_progress: true,
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
