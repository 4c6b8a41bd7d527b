//! Main application entry point.

use clap::Parser;
use jumbotron_app::{App, DisplayConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = DisplayConfig::parse();
    log::info!("Starting Jumbotron display, server {}", config.server);

    App::new(config)?.run()?;
    Ok(())
}
