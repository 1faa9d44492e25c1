mod cli;
mod config;
mod engine;
mod identity;
mod logging;
mod model;
mod source;
mod storage;

use std::process;

use clap::Parser;

use cli::Cli;
use config::Config;
use storage::Storage;

fn main() {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    logging::init(config.log_filter());

    let path = config
        .database
        .clone()
        .or_else(Storage::default_path)
        .unwrap_or_else(|| {
            eprintln!("Could not determine home directory.");
            process::exit(1);
        });

    let storage = match Storage::open(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open {}: {e}", path.display());
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(cli, &config, &storage) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
