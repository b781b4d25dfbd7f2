use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use rfield_lib::{configs::Config, logging, settings, Analyzer};

/// Measures the empirical receptive field of the center feature of a
/// convolutional network by probing it with single pixel impulses
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// RON config files, merged in order over the built-in defaults
    #[arg(short, long = "config", num_args = 1.., default_value = "config.ron")]
    configs: Vec<PathBuf>,

    /// Overrides of the form path=value, e.g. image/height=32
    #[arg(short, long = "modify", num_args = 1..)]
    modify: Vec<String>,

    #[arg(short, long, default_value_t = settings::DEFAULT_BATCH_SIZE, value_parser = batch_size)]
    batch_size: usize,

    /// Output image name, written into the model dir
    #[arg(short = 'n', long, default_value = settings::DEFAULT_FILENAME)]
    filename: PathBuf,

    /// tracing filter directive, falls back to RUST_LOG then info
    #[arg(long)]
    logging: Option<String>,
}

fn batch_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("batch size must be positive".into()),
        Ok(b) => Ok(b),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.logging.as_deref())?;

    let mut config = settings::default_config();
    for path in &args.configs {
        // the default config file is optional
        if !path.exists() && args.configs.len() == 1 && path == &PathBuf::from("config.ron") {
            debug!("no {} found, using defaults", path.display());
            continue;
        }
        config.update(&Config::load(path)?).with_context(|| format!("merging {}", path.display()))?;
    }
    for cmd in &args.modify {
        config.modify(cmd)?;
    }
    info!("configuration\n{config}");

    let mut settings = settings::Settings::from_config(&config)?;
    settings.batch_size = args.batch_size;
    let analyzer = Analyzer::new(settings)?;
    analyzer.run(&args.filename)?;
    Ok(())
}
