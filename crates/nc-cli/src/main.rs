//! `netcover`: compute per-region coverage ratios from a TOML run file.
//!
//! ```text
//! netcover --config config/bendigo.toml [--output P] [--layer L]
//!          [--overwrite] [--append] [-j N] [-v...]
//! ```

mod cli;
mod logging;


use anyhow::{Context, Result};
use clap::Parser;

use nc_pipeline::LogObserver;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli.load_config()?;
    if let Some(threads) = config.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configure worker threads")?;
    }

    let mut observer = LogObserver::new();
    let summary = nc_pipeline::run(&config, &mut observer)
        .with_context(|| format!("coverage run from {}", cli.config.display()))?;

    println!(
        "{} regions written to {} (layer {:?}, {:?}); {} without network, {} outside the display extent",
        summary.rows,
        summary.output.display(),
        summary.layer,
        summary.mode,
        summary.dropped_empty,
        summary.dropped_outside,
    );
    Ok(())
}
