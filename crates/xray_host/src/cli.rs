//! Command-line interface handling for the forensics host.

use crate::config::AppConfig;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "xray.toml";

/// Command line arguments that override the configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the recording storage directory
    pub storage_dir: Option<PathBuf>,
}

impl CliArgs {
    fn command() -> Command {
        Command::new("xray-host")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Suspicious mining detection, recording and replay host")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value(DEFAULT_CONFIG_PATH),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("storage-dir")
                    .short('s')
                    .long("storage-dir")
                    .value_name("DIR")
                    .help("Directory holding recording files"),
            )
    }

    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list, as used by embedders and tests.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&Self::command().try_get_matches_from(args)?))
    }

    /// Applies the command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(storage_dir) = &self.storage_dir {
            config.storage.directory = storage_dir.to_string_lossy().to_string();
        }
        if let Some(log_level) = &self.log_level {
            config.logging.level = log_level.clone();
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            storage_dir: matches.get_one::<String>("storage-dir").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["xray-host"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("xray.toml"));
        assert!(args.log_level.is_none());
        assert!(!args.json_logs);
        assert!(args.storage_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "xray-host",
            "-c",
            "prod.toml",
            "--log-level",
            "debug",
            "--json-logs",
            "--storage-dir",
            "/srv/recordings",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.storage_dir, Some(PathBuf::from("/srv/recordings")));
    }

    #[test]
    fn test_apply_to_overrides_only_given_values() {
        let mut config = AppConfig::default();
        let original_dir = config.storage.directory.clone();
        CliArgs::try_parse_from(["xray-host", "--log-level", "trace"])
            .unwrap()
            .apply_to(&mut config);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.storage.directory, original_dir);
        assert!(!config.logging.json_format);

        CliArgs::try_parse_from(["xray-host", "--json-logs", "-s", "/tmp/x"])
            .unwrap()
            .apply_to(&mut config);
        assert!(config.logging.json_format);
        assert_eq!(config.storage.directory, "/tmp/x");
        assert_eq!(config.logging.level, "trace");
    }
}
