use std::{
    io::{stdout, Write},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use clap::Parser;
use common::{
    config::{Algorithm, IndexConfig},
    misc::{human_duration, human_rate},
    progress::Progress,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use args::Args;
use tracer::{
    accel::Accelerator,
    geometry::{Point, Primitive, Ray, Vector},
    scene::GeometrySet,
    tunnel::{arc_path, arch_cross_section, Tunnel, TunnelBuilder},
};

mod args;

// Benchmark cross-section, in the same units as the path radius.
const RECT_WIDTH: f32 = 50.0;
const RECT_HEIGHT: f32 = 25.0;
const ARCH_HEIGHT: f32 = 25.0;

enum Outcome {
    /// Reached the plane behind the tunnel exit.
    Exited { bounces: u32 },
    /// Left the scene without reaching the exit.
    Missed,
    DepthLimit,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target("tracer", level)
        .with_target("common", level)
        .with_target("tunnel_bench", level);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.index_config();

    let now = Instant::now();
    let tunnel = TunnelBuilder::new(
        arch_cross_section(RECT_WIDTH, RECT_HEIGHT, ARCH_HEIGHT, args.arch_segments),
        arc_path(args.radius, args.angle, args.path_segments),
    )
    .build()?;
    println!(
        "Created tunnel with {} triangles in {}",
        tunnel.scene().len(),
        human_duration(now.elapsed())
    );

    let now = Instant::now();
    let index = build_index(&tunnel, &config)?;
    let build_time = now.elapsed();
    let scene = GeometrySet::new()
        .with(index)
        .with(Primitive::from(tunnel.exit_plane()));

    let primary = primary_rays(args.seed, args.rays);

    let now = Instant::now();
    let outcomes = primary
        .par_iter()
        .map(|ray| trace(&scene, *ray, args.max_depth))
        .collect::<Vec<_>>();
    let trace_time = now.elapsed();

    let (mut exited, mut missed, mut limited, mut queries) = (0, 0, 0, 0_u64);
    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            Outcome::Exited { bounces } => {
                exited += 1;
                queries += *bounces as u64 + 1;
            }
            Outcome::Missed => {
                warn!("Ray {} / {} missed", i + 1, outcomes.len());
                missed += 1;
            }
            Outcome::DepthLimit => limited += 1,
        }
    }

    println!(
        "{}: build {}, trace {} ({} queries, {})",
        config.algorithm,
        human_duration(build_time),
        human_duration(trace_time),
        queries,
        human_rate(queries, trace_time)
    );
    println!("{exited} rays reached the exit, {missed} missed, {limited} hit the depth limit");

    if args.check > 0 {
        check_agreement(&tunnel, &scene, &primary[..args.check.min(primary.len())], args.max_depth)?;
    }

    Ok(())
}

/// Builds on a worker thread so progress can be shown while it runs.
fn build_index(tunnel: &Tunnel, config: &IndexConfig) -> Result<Accelerator> {
    let progress = Progress::new();
    let handle = {
        let (tunnel, config, progress) = (tunnel.clone(), config.clone(), progress.clone());
        thread::spawn(move || Accelerator::build(&tunnel, &config, &progress))
    };

    while !handle.is_finished() {
        print!(
            "\r{}: {:.1}%",
            progress.stage(),
            progress.progress() * 100.0
        );
        stdout().flush()?;
        thread::sleep(Duration::from_millis(50));
    }
    println!();

    handle
        .join()
        .map_err(|_| anyhow!("Index build panicked"))?
}

/// Primary rays leave from just in front of the entrance, looking down the
/// tunnel.
fn primary_rays(seed: u64, count: usize) -> Vec<Ray> {
    let eye = Point::new(0.0, 25.0, 5.0);
    let front = -Vector::z();
    let right = front.cross(&Vector::y()).normalize();
    let up = right.cross(&front).normalize();

    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let (x, y) = (rng.gen::<f32>(), rng.gen::<f32>());
            let direction = front + right * ((x - 0.5) * 1.274) + up * (y - 0.5);
            Ray::new(eye, direction)
        })
        .collect()
}

fn trace(scene: &GeometrySet, mut ray: Ray, max_depth: u32) -> Outcome {
    let mut bounces = 0;
    loop {
        let Some(hit) = scene.intersect(&mut ray) else {
            return Outcome::Missed;
        };

        if bounces >= max_depth {
            return Outcome::DepthLimit;
        }

        if matches!(hit.primitive, Primitive::Plane(_)) {
            return Outcome::Exited { bounces };
        }

        ray = hit.reflect(&ray);
        bounces += 1;
    }
}

/// Follows each ray with the chosen index and compares every query against
/// a linear search of the same walls.
fn check_agreement(
    tunnel: &Tunnel,
    scene: &GeometrySet,
    rays: &[Ray],
    max_depth: u32,
) -> Result<()> {
    let linear = Accelerator::build(
        tunnel,
        &IndexConfig::with_algorithm(Algorithm::Linear),
        &Progress::new(),
    )?;
    let exit = Primitive::from(tunnel.exit_plane());

    let (mut queries, mut mismatches) = (0_u64, 0_u64);
    for (i, primary) in rays.iter().enumerate() {
        let mut ray = *primary;
        for _ in 0..=max_depth {
            let mut reference = ray;
            let expected = linear
                .intersect(&mut reference)
                .map(|x| x.distance)
                .into_iter()
                .chain(exit.intersect(&reference).map(|x| x.distance))
                .reduce(f32::min);

            let Some(hit) = scene.intersect(&mut ray) else {
                if expected.is_some() {
                    warn!("Ray {i} missed but a linear search hit at {expected:?}");
                    mismatches += 1;
                }
                break;
            };
            queries += 1;

            if expected.map_or(true, |x| (x - hit.distance).abs() > 1e-3) {
                warn!(
                    "Ray {i} hit at {} but a linear search hit at {expected:?}",
                    hit.distance
                );
                mismatches += 1;
            }

            if matches!(hit.primitive, Primitive::Plane(_)) {
                break;
            }
            ray = hit.reflect(&ray);
        }
    }

    println!(
        "Agreement check: {queries} queries over {} rays, {mismatches} mismatches",
        rays.len()
    );
    Ok(())
}
