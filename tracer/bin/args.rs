use std::{f32::consts::FRAC_PI_2, path::PathBuf};

use clap::Parser;
use common::config::{Algorithm, IndexConfig};

#[derive(Debug, Parser)]
/// Traces reflecting rays through a swept tunnel and times the chosen
/// acceleration index.
pub struct Args {
    #[arg(long)]
    /// Index to build: linear, rgrid, fgrid, kdtree, sah, convex or
    /// convex-simple. Overrides the config file.
    pub algorithm: Option<Algorithm>,
    #[arg(long)]
    /// TOML file with index tuning. Unreadable files fall back to defaults.
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 1000.0)]
    /// Radius of the tunnel's bend.
    pub radius: f32,
    #[arg(long, default_value_t = FRAC_PI_2)]
    /// Total turn of the tunnel in radians.
    pub angle: f32,
    #[arg(long, default_value_t = 150)]
    /// Segments used to approximate the arched ceiling.
    pub arch_segments: u32,
    #[arg(long, default_value_t = 150)]
    /// Segments along the tunnel path.
    pub path_segments: u32,

    #[arg(long, default_value_t = 1000)]
    /// Number of primary rays to trace.
    pub rays: usize,
    #[arg(long, default_value_t = 200)]
    /// Reflections after which a ray is abandoned.
    pub max_depth: u32,
    #[arg(long, default_value_t = 0)]
    /// Seed for the primary ray directions.
    pub seed: u64,
    #[arg(long, default_value_t = 0)]
    /// Also replay this many primary rays against a linear search and report
    /// any query where the two disagree.
    pub check: usize,

    #[arg(short, long)]
    /// Log index internals.
    pub verbose: bool,
}

impl Args {
    pub fn index_config(&self) -> IndexConfig {
        let mut config = match &self.config {
            Some(path) => IndexConfig::load_or_default(path),
            None => IndexConfig::default(),
        };

        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }

        config
    }
}
