use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use stone_indexer::{setup_tracing, AppResult, IndexerConfig, Supervisor};
use tokio::runtime;
use tracing::{error, info};

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// log level when RUST_LOG is unset (none: info, v: debug, vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser)]
pub enum Command {
    /// Print the effective configuration as JSON and exit
    PrintConfig,
}

fn main() -> AppResult<()> {
    dotenv().ok();

    let commandline: CommandLine = CommandLine::parse();
    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let config = IndexerConfig::set_up_config(&config_path)?;

    if let Some(Command::PrintConfig) = commandline.command {
        let printed = serde_json::to_string_pretty(&config)
            .map_err(|e| stone_indexer::AppError::InvalidValue(e.to_string()))?;
        println!("{}", printed);
        return Ok(());
    }

    // startup tokio runtime
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let _log_guard = rt.block_on(setup_tracing(&config.log, commandline.verbose))?;
    info!(
        "stone-indexer {} using {}",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    let supervisor = Supervisor::new(Arc::new(config));
    let result = rt.block_on(supervisor.run());
    if let Err(err) = &result {
        error!("stone-indexer stopped: {}", err);
    }
    result
}
