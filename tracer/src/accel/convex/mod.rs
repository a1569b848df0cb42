//! Ray queries against a tunnel that follow the ray from segment to segment
//! instead of searching the whole scene. A ray that stays inside the tunnel
//! only tests the walls of the segment it starts in and the one it leaves
//! through.

use common::{config::IndexConfig, progress::Progress};
use tracing::debug;

use crate::{
    geometry::{Hit, Point, Ray, RayContext, Vector},
    tunnel::Tunnel,
};
use buckets::BucketTable;
use edges::{half_planes, HalfPlane};
use table::{CellStatus, ClassificationTable};

mod buckets;
mod edges;
mod table;

/// How far past the first plane crossing a hit on the starting ring's walls
/// is still accepted.
const RESUME_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvexVariant {
    /// Walls are tested in the order a precomputed direction table suggests
    /// and the first hit wins.
    Full,
    /// Every wall of the segment is tested.
    Simple,
}

pub struct ConvexIndex {
    tunnel: Tunnel,
    edges: Box<[HalfPlane]>,
    table: ClassificationTable,
    buckets: Option<BucketTable>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvexStats {
    pub segments: usize,
    pub hit_cells: usize,
    pub miss_cells: usize,
    pub partial_cells: usize,
}

#[derive(Clone, Copy)]
enum Crossing {
    /// Crossed the plane inside the cross-section, this far along the ray.
    Inside(f32),
    /// Crossed outside the cross-section, or never reached the plane.
    Outside(Option<f32>),
}

impl ConvexIndex {
    pub fn build(
        tunnel: &Tunnel,
        variant: ConvexVariant,
        config: &IndexConfig,
        progress: &Progress,
    ) -> Self {
        let polygon = tunnel.cross_section();
        let edges = half_planes(polygon);

        progress.start_stage("classification table", 1);
        let table = ClassificationTable::build(polygon, &edges, config.convex_table_size);
        progress.add_complete(1);

        let buckets = (variant == ConvexVariant::Full).then(|| {
            progress.start_stage("angle buckets", 1);
            let out = BucketTable::build(polygon, config.height_buckets, config.angle_buckets);
            progress.add_complete(1);
            out
        });
        progress.set_finished();

        let index = Self {
            tunnel: tunnel.clone(),
            edges: edges.into_boxed_slice(),
            table,
            buckets,
        };

        let stats = index.stats();
        debug!(
            "Classification table has {} hit, {} miss and {} partial cells",
            stats.hit_cells, stats.miss_cells, stats.partial_cells
        );

        index
    }

    pub fn stats(&self) -> ConvexStats {
        let size = self.table.size();
        let mut stats = ConvexStats {
            segments: self.tunnel.segments(),
            ..Default::default()
        };

        for x in 0..size {
            for y in 0..size {
                match self.table.status(x, y) {
                    CellStatus::Hit => stats.hit_cells += 1,
                    CellStatus::Miss => stats.miss_cells += 1,
                    CellStatus::Partial { .. } => stats.partial_cells += 1,
                }
            }
        }

        stats
    }

    /// Finds the closest wall hit. Rays already inside the tunnel must carry
    /// the segment they are in, and on return the context names the segment
    /// the ray stopped in. Rays leaving the tunnel come back with an outside
    /// context.
    pub fn intersect(&self, ray: &mut Ray) -> Option<Hit<'_>> {
        let last = self.tunnel.segments();
        if last == 0 {
            return self.tunnel.scene().intersect(ray);
        }

        let normals = self.tunnel.normals();
        let resumed = ray.context.inside_tunnel;
        let mut start = 0.0;
        let forward = if resumed {
            // Planes of a bend are not parallel, so a ray heading back past
            // one plane can still leave through the next one.
            let segment = ray.context.segment.min(last - 1);
            ray.direction.dot(&normals[segment]) > 0.0
                || !matches!(
                    self.crossing(segment, &ray.origin, &ray.direction),
                    Crossing::Inside(_)
                )
        } else {
            let entrance = match self.crossing(0, &ray.origin, &ray.direction) {
                Crossing::Inside(distance) if ray.direction.dot(&normals[0]) > 0.0 => {
                    Some((0, distance, true))
                }
                _ => match self.crossing(last, &ray.origin, &ray.direction) {
                    Crossing::Inside(distance) if ray.direction.dot(&normals[last]) < 0.0 => {
                        Some((last - 1, distance, false))
                    }
                    _ => None,
                },
            };

            let Some((segment, distance, forward)) = entrance else {
                return self.tunnel.scene().intersect(ray);
            };
            ray.context = RayContext {
                inside_tunnel: true,
                segment,
            };
            start = distance;
            forward
        };

        let segment = ray.context.segment.min(last - 1);
        let hit = if forward {
            self.walk(ray, start, segment + 1..=last, true, resumed)
        } else {
            self.walk(ray, start, (0..=segment).rev(), false, resumed)
        };

        match hit {
            Some((hit, ring)) => {
                ray.context.segment = ring;
                Some(hit)
            }
            None => {
                ray.context.inside_tunnel = false;
                None
            }
        }
    }

    /// Follows the ray through the cross-section `planes` in order, starting
    /// `travelled` along the ray. Each plane crossed outside the
    /// polygon means the ray left through the walls of the ring before it.
    ///
    /// A resumed ray usually starts on a wall of its own ring, where the
    /// neighboring triangles can still be hit a hair's breadth away, so that
    /// ring is searched exhaustively. If the origin already lies past the
    /// ring's far plane the next ring is searched the same way.
    fn walk(
        &self,
        ray: &Ray,
        mut travelled: f32,
        planes: impl Iterator<Item = usize>,
        forward: bool,
        resumed: bool,
    ) -> Option<(Hit<'_>, usize)> {
        let mut exhaustive = resumed;
        for plane in planes {
            let ring = if forward { plane - 1 } else { plane };
            let origin = ray.at(travelled);
            let crossing = self.crossing(plane, &origin, &ray.direction);

            let hit = match crossing {
                Crossing::Inside(distance) if exhaustive => {
                    self.nearest_wall(ray, ring, Some(travelled + distance))
                }
                Crossing::Inside(_) => None,
                Crossing::Outside(_) if exhaustive => self.nearest_wall(ray, ring, None),
                Crossing::Outside(_) => self.wall_hit(ray, ring, plane, &origin),
            };
            if let Some(hit) = hit {
                return Some((hit, ring));
            }

            exhaustive &= matches!(crossing, Crossing::Outside(None));
            if let Crossing::Inside(distance) | Crossing::Outside(Some(distance)) = crossing {
                travelled += distance;
            }
        }

        None
    }

    /// Closest hit among all walls of a ring, ignoring hits more than
    /// [`RESUME_EPSILON`] past `limit`.
    fn nearest_wall(&self, ray: &Ray, ring: usize, limit: Option<f32>) -> Option<Hit<'_>> {
        let hit = self.tunnel.scene().intersect_range(self.tunnel.ring(ring), ray)?;
        limit
            .map_or(true, |x| hit.distance <= x + RESUME_EPSILON)
            .then_some(hit)
    }

    fn crossing(&self, plane: usize, origin: &Point, direction: &Vector) -> Crossing {
        match self.tunnel.frame(plane).crossing(origin, direction) {
            Some(crossing) if self.table.contains(&self.edges, &crossing.point) => {
                Crossing::Inside(crossing.distance)
            }
            crossing => Crossing::Outside(crossing.map(|x| x.distance)),
        }
    }

    /// Tests the walls of one ring against the full ray. `origin` is where
    /// the walk has got to, which picks the direction bucket.
    fn wall_hit(&self, ray: &Ray, ring: usize, plane: usize, origin: &Point) -> Option<Hit<'_>> {
        let range = self.tunnel.ring(ring);
        let scene = self.tunnel.scene();

        let Some(buckets) = &self.buckets else {
            return scene.intersect_range(range, ray);
        };
        let Some((point, direction)) = self.tunnel.frame(plane).project(origin, &ray.direction)
        else {
            return scene.intersect_range(range, ray);
        };

        for &edge in buckets.candidates(&point, &direction) {
            for triangle in [2 * edge, 2 * edge + 1] {
                let idx = range.start + triangle;
                if idx >= range.end {
                    continue;
                }
                if let Some(hit) = scene.get(idx).intersect(ray) {
                    return Some(hit);
                }
            }
        }

        None
    }
}
