use std::time::Instant;

use anyhow::{bail, Result};
use common::{
    config::{Algorithm, IndexConfig},
    misc::human_duration,
    progress::Progress,
};
use tracing::info;

use crate::{
    geometry::{Hit, Ray},
    scene::Scene,
    tunnel::Tunnel,
};

pub mod convex;
pub mod grid;
pub mod kd_tree;

pub use convex::{ConvexIndex, ConvexVariant};
pub use grid::{Grid, GridPolicy};
pub use kd_tree::{KdTree, SplitPolicy};

/// A scene together with whichever index was chosen to answer queries on it.
pub enum Accelerator {
    Linear(Scene),
    Grid(Grid),
    KdTree(KdTree),
    Convex(ConvexIndex),
}

impl Accelerator {
    /// Builds the configured index over a tunnel's walls. Every algorithm
    /// works here, the general ones simply ignore the tunnel structure.
    pub fn build(tunnel: &Tunnel, config: &IndexConfig, progress: &Progress) -> Result<Self> {
        if !config.algorithm.needs_tunnel() {
            return Self::build_scene(tunnel.scene().clone(), config, progress);
        }

        let start = Instant::now();
        let variant = match config.algorithm {
            Algorithm::ConvexSimple => ConvexVariant::Simple,
            _ => ConvexVariant::Full,
        };
        let index = Self::Convex(ConvexIndex::build(tunnel, variant, config, progress));

        index.log_built(config.algorithm, start);
        Ok(index)
    }

    /// Builds the configured index over an arbitrary scene.
    pub fn build_scene(scene: Scene, config: &IndexConfig, progress: &Progress) -> Result<Self> {
        let start = Instant::now();
        let index = match config.algorithm {
            Algorithm::Linear => Self::Linear(scene),
            Algorithm::RegularGrid => {
                Self::Grid(Grid::build(scene, GridPolicy::Cubical, config, progress)?)
            }
            Algorithm::FlatGrid => {
                Self::Grid(Grid::build(scene, GridPolicy::PerAxis, config, progress)?)
            }
            Algorithm::KdTreeStandard => {
                Self::KdTree(KdTree::build(scene, SplitPolicy::Median, config, progress))
            }
            Algorithm::KdTreeSah => {
                Self::KdTree(KdTree::build(scene, SplitPolicy::Sah, config, progress))
            }
            algorithm @ (Algorithm::Convex | Algorithm::ConvexSimple) => {
                bail!("The {algorithm} index can only be built over a tunnel")
            }
        };

        index.log_built(config.algorithm, start);
        Ok(index)
    }

    /// Closest hit along the ray. Only the tunnel index reads or updates the
    /// ray's context.
    pub fn intersect(&self, ray: &mut Ray) -> Option<Hit<'_>> {
        match self {
            Self::Linear(scene) => scene.intersect(ray),
            Self::Grid(grid) => grid.intersect(ray),
            Self::KdTree(tree) => tree.intersect(ray),
            Self::Convex(index) => index.intersect(ray),
        }
    }

    fn log_built(&self, algorithm: Algorithm, start: Instant) {
        let elapsed = human_duration(start.elapsed());
        match self {
            Self::Linear(scene) => {
                info!("Using linear search over {} primitives", scene.len())
            }
            Self::Grid(grid) => {
                let stats = grid.stats();
                info!(
                    "Built {algorithm} grid in {elapsed}: {:?} cells, {} occupied, {} references",
                    stats.dimensions, stats.occupied, stats.references
                );
            }
            Self::KdTree(tree) => {
                let stats = tree.stats();
                info!(
                    "Built {algorithm} kd tree in {elapsed}: {} nodes, {} leaves ({} empty), depth {}, {} references",
                    stats.nodes, stats.leaves, stats.empty_leaves, stats.depth, stats.references
                );
            }
            Self::Convex(index) => {
                let stats = index.stats();
                info!(
                    "Built {algorithm} tunnel index in {elapsed}: {} segments, {} partial table cells",
                    stats.segments, stats.partial_cells
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use common::{
        config::{Algorithm, IndexConfig},
        progress::Progress,
    };
    use nalgebra::Point2;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rayon::prelude::*;

    use super::Accelerator;
    use crate::{
        geometry::{Point, Ray, RayContext, Vector},
        scene::Scene,
        test_util::same_hit,
        tunnel::{arc_path, arch_cross_section, Tunnel, TunnelBuilder},
    };

    fn config(algorithm: Algorithm) -> IndexConfig {
        IndexConfig {
            algorithm,
            grid_resolution: 32,
            convex_table_size: 50,
            height_buckets: 20,
            angle_buckets: 90,
            ..Default::default()
        }
    }

    fn tunnel() -> Tunnel {
        TunnelBuilder::new(
            arch_cross_section(20.0, 10.0, 10.0, 12),
            arc_path(200.0, FRAC_PI_2, 24),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn convex_needs_a_tunnel() {
        let scene = Scene::new(Vec::new());
        for algorithm in [Algorithm::Convex, Algorithm::ConvexSimple] {
            let result = Accelerator::build_scene(scene.clone(), &config(algorithm), &Progress::new());
            assert!(result.is_err());
        }
    }

    /// Every index answers the same as a linear search for rays that start
    /// in random places inside the tunnel, then for their reflections.
    #[test]
    fn indices_agree() {
        let tunnel = tunnel();
        let indices = Algorithm::ALL.map(|x| {
            Accelerator::build(&tunnel, &config(x), &Progress::new()).unwrap()
        });

        let mut rng = StdRng::seed_from_u64(7);
        let mut checked = 0;
        for _ in 0..2_000 {
            let segment = rng.gen_range(0..tunnel.segments());
            let point = Point2::new(rng.gen_range(-7.0..7.0), rng.gen_range(1.0..16.0));
            let (front, back) = (
                tunnel.frame(segment).to_world(&point),
                tunnel.frame(segment + 1).to_world(&point),
            );
            let origin = front + (back - front) * rng.gen_range(0.05..0.95_f32);
            let direction = Vector::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if direction.norm() < 0.1 {
                continue;
            }

            let mut ray = Ray::new(origin, direction);
            ray.context = RayContext {
                inside_tunnel: true,
                segment,
            };

            for _ in 0..3 {
                let expected = tunnel.scene().intersect(&ray);
                let mut next = None;
                for (algorithm, index) in Algorithm::ALL.iter().zip(&indices) {
                    let mut query = ray;
                    let hit = index.intersect(&mut query);
                    assert!(same_hit(hit, expected), "{algorithm}: {ray:?}");
                    checked += 1;

                    if matches!(index, Accelerator::Convex(_)) {
                        next = hit.map(|hit| hit.reflect(&query));
                    }
                }

                match next {
                    Some(bounce) => ray = bounce,
                    None => break,
                }
            }
        }

        assert!(checked >= 10_000, "only checked {checked} rays");
    }

    #[test]
    fn outside_rays_agree() {
        let tunnel = tunnel();
        let indices = Algorithm::ALL.map(|x| {
            Accelerator::build(&tunnel, &config(x), &Progress::new()).unwrap()
        });

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let origin = Point::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-5.0..25.0),
                rng.gen_range(5.0..40.0),
            );
            let direction = Vector::new(rng.gen_range(-0.4..0.4), rng.gen_range(-0.4..0.4), -1.0);
            let ray = Ray::new(origin, direction);

            let expected = tunnel.scene().intersect(&ray);
            for (algorithm, index) in Algorithm::ALL.iter().zip(&indices) {
                let mut query = ray;
                assert!(same_hit(index.intersect(&mut query), expected), "{algorithm}: {ray:?}");
            }
        }
    }

    /// The benchmark tunnel with default tuning, traced from the benchmark
    /// camera. Reflected rays start on a wall with its neighboring triangles
    /// within a hair of the origin, which small tunnels rarely exercise.
    #[test]
    fn convex_agrees_at_benchmark_scale() {
        let tunnel = TunnelBuilder::new(
            arch_cross_section(50.0, 25.0, 25.0, 150),
            arc_path(1000.0, FRAC_PI_2, 150),
        )
        .build()
        .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let eye = Point::new(0.0, 25.0, 5.0);
        let rays = (0..128)
            .map(|_| {
                let (x, y) = (rng.gen::<f32>(), rng.gen::<f32>());
                Ray::new(eye, Vector::new((x - 0.5) * 1.274, y - 0.5, -1.0))
            })
            .collect::<Vec<_>>();

        for algorithm in [Algorithm::Convex, Algorithm::ConvexSimple] {
            let config = IndexConfig::with_algorithm(algorithm);
            let index = Accelerator::build(&tunnel, &config, &Progress::new()).unwrap();

            let mismatches = rays
                .par_iter()
                .flat_map_iter(|&primary| {
                    let mut ray = primary;
                    let mut out = Vec::new();
                    for depth in 0..32 {
                        let expected = tunnel.scene().intersect(&ray);
                        let mut query = ray;
                        let hit = index.intersect(&mut query);
                        if !same_hit(hit, expected) {
                            out.push(format!("depth {depth}: {ray:?}"));
                        }

                        match hit {
                            Some(hit) => ray = hit.reflect(&query),
                            None => break,
                        }
                    }
                    out
                })
                .collect::<Vec<_>>();

            assert!(mismatches.is_empty(), "{algorithm}: {mismatches:#?}");
        }
    }
}
