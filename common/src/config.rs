use std::{fmt, fs, path::Path, str::FromStr};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which spatial index answers ray queries for a scene.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Linear,
    RegularGrid,
    FlatGrid,
    KdTreeStandard,
    KdTreeSah,
    Convex,
    ConvexSimple,
}

/// How the grid decides which cells a primitive belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GridInsertion {
    /// Every cell covered by the primitive's bounding box.
    #[default]
    Overlap,
    /// Only cells the primitive actually touches.
    Clipped,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub algorithm: Algorithm,

    // Grid
    pub grid_resolution: u32,
    pub grid_insertion: GridInsertion,

    // Kd tree
    pub kd_leaf_size: usize,
    pub kd_max_depth: u32,
    pub sah_traversal_cost: f32,
    pub sah_intersection_cost: f32,
    pub sah_leaf_factor: f32,

    // Convex tunnel index
    pub convex_table_size: usize,
    pub height_buckets: usize,
    pub angle_buckets: usize,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Linear,
        Algorithm::RegularGrid,
        Algorithm::FlatGrid,
        Algorithm::KdTreeStandard,
        Algorithm::KdTreeSah,
        Algorithm::Convex,
        Algorithm::ConvexSimple,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Linear => "linear",
            Algorithm::RegularGrid => "rgrid",
            Algorithm::FlatGrid => "fgrid",
            Algorithm::KdTreeStandard => "kdtree",
            Algorithm::KdTreeSah => "sah",
            Algorithm::Convex => "convex",
            Algorithm::ConvexSimple => "convex-simple",
        }
    }

    /// The convex algorithms only work on tunnel geometry.
    pub fn needs_tunnel(&self) -> bool {
        matches!(self, Algorithm::Convex | Algorithm::ConvexSimple)
    }
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        match Algorithm::ALL.iter().find(|x| x.name() == lower) {
            Some(algorithm) => Ok(*algorithm),
            None => bail!(
                "Unknown algorithm `{s}`, expected one of: {}",
                Algorithm::ALL.map(|x| x.name()).join(", ")
            ),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl IndexConfig {
    pub fn with_algorithm(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Default::default()
        }
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Failed to load index config, using defaults: {err:#}");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(if path.exists() {
            let file = fs::read_to_string(path)
                .with_context(|| format!("Reading {}", path.display()))?;
            let config = Self::from_toml(&file)?;
            info!("Loaded index config from {}", path.display());
            config
        } else {
            info!("No index config at {}, using defaults", path.display());
            Self::default()
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(raw).context("Parsing index config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_resolution < 2 {
            bail!("grid_resolution must be at least 2");
        }
        if self.kd_leaf_size == 0 {
            bail!("kd_leaf_size must be positive");
        }
        if self.convex_table_size < 2 {
            bail!("convex_table_size must be at least 2");
        }
        if self.height_buckets == 0 || self.angle_buckets == 0 {
            bail!("bucket counts must be positive");
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::KdTreeSah,

            grid_resolution: 400,
            grid_insertion: GridInsertion::Overlap,

            kd_leaf_size: 8,
            kd_max_depth: 18,
            sah_traversal_cost: 1.0,
            sah_intersection_cost: 1.5,
            sah_leaf_factor: 1.5,

            convex_table_size: 100,
            height_buckets: 100,
            angle_buckets: 360,
        }
    }
}
