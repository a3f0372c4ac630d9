//! Dispatches parsed CLI commands to their handlers

use super::handlers::{CheckCommandHandler, RunCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Settings;

/// Execute the parsed command; no subcommand means `run`
pub async fn execute_command(cli: &Cli, settings: Settings) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Check) => {
            CheckCommandHandler::new(settings).execute()?;
            Ok(())
        }
        Some(Commands::Run { demo, .. }) => RunCommandHandler::new(settings).execute(*demo).await,
        None => RunCommandHandler::new(settings).execute(false).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_execute_check() {
        let cli = Cli::try_parse_from(["hourglass", "check"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_check_rejects_invalid_settings() {
        let cli = Cli::try_parse_from(["hourglass", "check"]).unwrap();
        let mut settings = Settings::default();
        settings.jobs.poll_interval_secs = 0;
        assert!(execute_command(&cli, settings).await.is_err());
    }
}
