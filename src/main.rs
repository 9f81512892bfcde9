use clap::Parser;

use shipwright::cli::Cli;
use shipwright::logs::{self, LogOptions};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logs::init_logging(LogOptions {
        log_level: cli.log_level,
        json_format: cli.json_logs,
    })?;
    cli.run()?;
    Ok(())
}
