use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use tokio::io::BufReader;

use wayfinder::LogLevel;
use wayfinder::core::config::{load_config, resolve};
use wayfinder::host::Host;

#[derive(Parser)]
#[command(name = "wayfinder", about = "Declarative navigation engine with a command-line host")]
struct Args {
    /// Config file (defaults to ~/.wayfinder/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Log file path
    #[arg(long)]
    log_file: Option<String>,

    /// Read commands from a file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wayfinder: {e}");
            return Err(std::io::Error::other(e.to_string()));
        }
    };
    let resolved = resolve(&config, args.log_level, args.log_file.as_deref());

    // Initialize file logger - terminal output is reserved for the host loop
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(LevelFilter::from(resolved.log_level), log_config, log_file);
    }

    log::info!(
        "Wayfinder starting up with {} routes, default address {}",
        resolved.routes.len(),
        resolved.default_address
    );

    let host = Host::new(&resolved);
    let _watcher = host.watch_changes();

    match args.script {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            host.run(BufReader::new(file), tokio::io::stdout()).await
        }
        None => {
            host.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await
        }
    }
}
