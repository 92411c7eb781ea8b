use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use nc_pipeline::RunConfig;

/// Per-region coverage ratios of a linear network.
#[derive(clap::Parser, Debug)]
#[command(name = "netcover", version, about)]
pub struct Cli {
    /// TOML run file.  Relative paths inside it resolve against its directory.
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Output file, replacing `output.path`.
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Output layer, replacing `output.layer`.
    #[arg(short, long)]
    pub layer: Option<String>,

    /// Replace an existing output layer.
    #[arg(long)]
    pub overwrite: bool,

    /// Add the layer to an existing multi-layer output file.
    #[arg(long)]
    pub append: bool,

    /// Worker threads, replacing `num_threads`.
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Read the run file, resolve its paths and apply command-line overrides.
    pub fn load_config(&self) -> Result<RunConfig> {
        let text = std::fs::read_to_string(&self.config)
            .with_context(|| format!("read run file {}", self.config.display()))?;
        let mut config = parse_config(&text, self.config.parent().unwrap_or(Path::new("")))
            .with_context(|| format!("parse run file {}", self.config.display()))?;
        self.apply(&mut config);
        config.validate().context("invalid run configuration")?;
        debug!("run configuration: {config:#?}");
        Ok(config)
    }

    /// Command-line values win over the run file.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(path) = &self.output {
            config.output.path = path.clone();
        }
        if let Some(layer) = &self.layer {
            config.output.layer = Some(layer.clone());
        }
        config.output.overwrite |= self.overwrite;
        config.output.append |= self.append;
        if self.threads.is_some() {
            config.num_threads = self.threads;
        }
    }
}

/// Parse a TOML run file whose relative paths are relative to `base`.
pub fn parse_config(text: &str, base: &Path) -> Result<RunConfig> {
    let mut config: RunConfig = toml::from_str(text)?;
    config.resolve_paths(base);
    Ok(config)
}
