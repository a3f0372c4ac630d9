use clap::Parser;

use hourglass::cli::{Cli, ConfigurationMerger, execute_command};
use hourglass::logger::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = ConfigurationMerger::from_cli(&cli)?.merge_cli_args(&cli)?;
    init_logger(settings.logger.clone().into_logger_config()?)?;

    execute_command(&cli, settings).await
}
