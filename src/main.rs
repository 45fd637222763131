mod cli;
mod logging;
mod model;
mod orchestrator;
mod routine;
mod settings;
#[cfg(feature = "tui")]
mod tui;
mod view;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = cli::Cli::parse();
    let is_text = args.text;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for text mode
            if is_text {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
