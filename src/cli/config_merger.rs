//! Merges CLI overrides into the file and environment configuration

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Settings};

/// Applies CLI arguments on top of loaded settings. CLI values win.
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration selected by `--config` and `--env`
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new()?;
        if let Some(env) = cli.env {
            loader = loader.with_environment(env.into());
        }
        if let Some(path) = &cli.config {
            loader = loader.with_config_file(path);
        }
        Ok(Self::new(loader.load()?))
    }

    /// Apply CLI overrides and validate the result
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        if let Some(Commands::Run {
            poll_interval,
            log_level,
            demo: _,
        }) = &cli.command
        {
            if let Some(secs) = poll_interval {
                config.jobs.poll_interval_secs = *secs;
            }
            if let Some(level) = log_level {
                config.logger.level = (*level).into();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn merge(args: &[&str]) -> Settings {
        let cli = Cli::try_parse_from(args).unwrap();
        ConfigurationMerger::new(Settings::default())
            .merge_cli_args(&cli)
            .unwrap()
    }

    #[test]
    fn test_verbose_and_quiet_flags() {
        assert_eq!(merge(&["hourglass", "--verbose"]).logger.level, "debug");
        assert_eq!(merge(&["hourglass", "--quiet"]).logger.level, "error");
    }

    #[test]
    fn test_run_overrides() {
        let merged = merge(&["hourglass", "--verbose", "run", "--poll-interval", "5", "--log-level", "warn"]);
        assert_eq!(merged.jobs.poll_interval_secs, 5);
        assert_eq!(merged.logger.level, "warn");
    }

    #[test]
    fn test_base_config_is_untouched() {
        let merger = ConfigurationMerger::new(Settings::default());
        let cli = Cli::try_parse_from(["hourglass", "--quiet"]).unwrap();
        merger.merge_cli_args(&cli).unwrap();
        assert_eq!(merger.config(), &Settings::default());
    }
}
