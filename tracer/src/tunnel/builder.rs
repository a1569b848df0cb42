use std::{f32::consts::PI, ops::Range};

use anyhow::{bail, Result};
use nalgebra::Point2;
use tracing::{debug, warn};

use super::{PlaneFrame, Tunnel};
use crate::{
    geometry::{Point, Primitive, Triangle, Vector},
    scene::Scene,
};

/// Max dot product between a wall triangle's normal and the direction to any
/// other ring vertex before the ring counts as non-convex. About 0.06°.
const DOT_TOLERANCE: f32 = 1e-3;

pub struct TunnelBuilder {
    cross_section: Vec<Point2<f32>>,
    path: Vec<Point>,
}

/// How one quad of a ring is split into two triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Diagonal {
    BC,
    AD,
}

impl TunnelBuilder {
    pub fn new(cross_section: Vec<Point2<f32>>, path: Vec<Point>) -> Self {
        Self {
            cross_section,
            path,
        }
    }

    pub fn build(self) -> Result<Tunnel> {
        validate_cross_section(&self.cross_section)?;
        validate_path(&self.path)?;

        let normals = path_normals(&self.path);
        let frames = (self.path.iter().zip(&normals))
            .map(|(origin, normal)| PlaneFrame::new(*origin, normal))
            .collect::<Vec<_>>();

        let outlines = frames
            .iter()
            .map(|frame| {
                (self.cross_section.iter())
                    .map(|x| frame.to_world(x))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut triangles = Vec::<Primitive>::new();
        let mut rings = Vec::with_capacity(self.path.len() - 1);
        let mut skipped = 0;

        for (segment, pair) in outlines.windows(2).enumerate() {
            let start = triangles.len() as u32;
            match ring_diagonals(&pair[0], &pair[1]) {
                Some(diagonals) => push_ring(&mut triangles, &pair[0], &pair[1], &diagonals),
                None => {
                    warn!("Tunnel segment {segment} is not convex, skipping its walls");
                    skipped += 1;
                }
            }
            rings.push(Range {
                start,
                end: triangles.len() as u32,
            });
        }

        debug!(
            "Built tunnel with {} segments, {} triangles, {skipped} skipped",
            rings.len(),
            triangles.len()
        );

        Ok(Tunnel {
            cross_section: self.cross_section,
            path: self.path,
            normals,
            frames,
            rings,
            scene: Scene::new(triangles),
        })
    }
}

fn validate_cross_section(polygon: &[Point2<f32>]) -> Result<()> {
    if polygon.len() < 3 {
        bail!("Cross-section needs at least 3 vertices, got {}", polygon.len());
    }

    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let (a, b, c) = (polygon[i], polygon[(i + 1) % n], polygon[(i + 2) % n]);
        area += a.x * b.y - b.x * a.y;

        if (b - a).norm() < 1e-6 {
            bail!("Cross-section vertices {i} and {} coincide", (i + 1) % n);
        }

        if (b - a).perp(&(c - b)) < -1e-6 {
            bail!("Cross-section is not convex at vertex {}", (i + 1) % n);
        }
    }

    if area <= 0.0 {
        bail!("Cross-section must be counterclockwise");
    }

    Ok(())
}

fn validate_path(path: &[Point]) -> Result<()> {
    if path.len() < 2 {
        bail!("Tunnel path needs at least 2 nodes, got {}", path.len());
    }

    let level = path[0].y;
    if path.iter().any(|x| (x.y - level).abs() > 1e-4) {
        bail!("Tunnel path must stay level (constant y)");
    }

    if path.windows(2).any(|x| (x[1] - x[0]).norm() < 1e-6) {
        bail!("Tunnel path has repeated nodes");
    }

    Ok(())
}

/// Each node's normal bisects the directions of the segments meeting there.
/// End nodes use the direction of their only segment.
fn path_normals(path: &[Point]) -> Vec<Vector> {
    let directions = path
        .windows(2)
        .map(|x| (x[1] - x[0]).normalize())
        .collect::<Vec<_>>();

    (0..path.len())
        .map(|i| {
            let before = i.checked_sub(1).map(|x| directions[x]);
            let after = directions.get(i).copied();
            match (before, after) {
                (Some(a), Some(b)) => (a + b).try_normalize(1e-6).unwrap_or(b),
                (Some(x), None) | (None, Some(x)) => x,
                (None, None) => -Vector::z(),
            }
        })
        .collect()
}

/// Picks a diagonal for every quad of the ring between the `front` and
/// `rear` outlines, or `None` if some quad can't be split without a concave
/// fold.
fn ring_diagonals(front: &[Point], rear: &[Point]) -> Option<Vec<Diagonal>> {
    let n = front.len();
    (0..n)
        .map(|j| {
            let k = (j + 1) % n;
            let (a, b, c, d) = (front[j], front[k], rear[j], rear[k]);
            let others = (0..n)
                .filter(|&m| m != j && m != k)
                .flat_map(|m| [front[m], rear[m]])
                .collect::<Vec<_>>();

            let bc = wall_is_convex([c, b, a], &d, &others) && wall_is_convex([c, d, b], &a, &others);
            let ad = wall_is_convex([a, d, b], &c, &others) && wall_is_convex([a, c, d], &b, &others);

            match (bc, ad) {
                (true, _) => Some(Diagonal::BC),
                (false, true) => Some(Diagonal::AD),
                (false, false) => None,
            }
        })
        .collect()
}

/// True if no other ring vertex lies outside the triangle's plane.
fn wall_is_convex(triangle: [Point; 3], opposite: &Point, others: &[Point]) -> bool {
    let [a, b, c] = triangle;
    let Some(normal) = (b - a).cross(&(c - b)).try_normalize(1e-12) else {
        return true;
    };

    std::iter::once(opposite).chain(others).all(|point| {
        (point - a)
            .try_normalize(1e-12)
            .map_or(true, |x| normal.dot(&x) <= DOT_TOLERANCE)
    })
}

fn push_ring(out: &mut Vec<Primitive>, front: &[Point], rear: &[Point], diagonals: &[Diagonal]) {
    let n = front.len();
    for (j, diagonal) in diagonals.iter().enumerate() {
        let k = (j + 1) % n;
        let (a, b, c, d) = (front[j], front[k], rear[j], rear[k]);
        let pair = match diagonal {
            Diagonal::BC => [Triangle::new(c, d, b), Triangle::new(c, b, a)],
            Diagonal::AD => [Triangle::new(a, c, d), Triangle::new(a, d, b)],
        };
        out.extend(pair.map(Primitive::Triangle));
    }
}

/// A rectangle topped with a half ellipse, counterclockwise starting at the
/// bottom right corner. The bottom edge sits on y = 0.
pub fn arch_cross_section(
    rect_width: f32,
    rect_height: f32,
    arch_height: f32,
    arch_segments: u32,
) -> Vec<Point2<f32>> {
    let half = rect_width / 2.0;
    let mut out = vec![Point2::new(half, 0.0)];

    for i in 0..=arch_segments {
        let angle = PI * i as f32 / arch_segments.max(1) as f32;
        let point = Point2::new(angle.cos() * half, angle.sin() * arch_height + rect_height);
        if out.last().map_or(true, |last| (last - point).norm() > 1e-6) {
            out.push(point);
        }
    }

    let corner = Point2::new(-half, 0.0);
    if out.last().map_or(true, |last| (last - corner).norm() > 1e-6) {
        out.push(corner);
    }

    out
}

/// Quarter-circle style path bending toward +X, starting at the origin and
/// heading along -Z.
pub fn arc_path(radius: f32, angle: f32, segments: u32) -> Vec<Point> {
    (0..=segments)
        .map(|i| {
            let theta = angle * i as f32 / segments.max(1) as f32;
            Point::new(radius * (1.0 - theta.cos()), 0.0, -radius * theta.sin())
        })
        .collect()
}
