use std::f32::consts::{PI, TAU};

use nalgebra::{Point2, Vector2};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

/// For every (height, direction) bucket of a ray projected onto the
/// cross-section plane, the edges in the order a ray from the cross-section's
/// center line would most likely hit them.
pub struct BucketTable {
    center_x: f32,
    min_y: f32,
    height: f32,
    heights: usize,
    angles: usize,
    edges: usize,
    order: Box<[u32]>,
}

impl BucketTable {
    pub fn build(polygon: &[Point2<f32>], heights: usize, angles: usize) -> Self {
        let (heights, angles, edges) = (heights.max(1), angles.max(1), polygon.len());

        let (mut min, mut max) = (polygon[0], polygon[0]);
        for point in polygon {
            min = min.inf(point);
            max = max.sup(point);
        }

        let mut table = Self {
            center_x: (min.x + max.x) / 2.0,
            min_y: min.y,
            height: max.y - min.y,
            heights,
            angles,
            edges,
            order: Box::new([]),
        };

        let mut order = vec![0; heights * angles * edges];
        order
            .par_chunks_mut(edges)
            .enumerate()
            .for_each(|(bucket, chunk)| {
                table.fill(polygon, bucket / angles, bucket % angles, chunk)
            });
        table.order = order.into_boxed_slice();
        table
    }

    /// Candidate edges for a ray through `point` heading along `direction`,
    /// both in cross-section coordinates.
    pub fn candidates(&self, point: &Point2<f32>, direction: &Vector2<f32>) -> &[u32] {
        let t = (self.center_x - point.x) / direction.x;
        let y = point.y + t * direction.y;
        let height = if y.is_finite() && self.height > 0.0 {
            let idx = ((y - self.min_y) / self.height * self.heights as f32).floor();
            (idx.max(0.0) as usize).min(self.heights - 1)
        } else {
            0
        };

        let angle = direction.y.atan2(direction.x).rem_euclid(TAU);
        let angle = ((angle / TAU * self.angles as f32) as usize).min(self.angles - 1);

        let start = (height * self.angles + angle) * self.edges;
        &self.order[start..start + self.edges]
    }

    fn fill(&self, polygon: &[Point2<f32>], height: usize, angle: usize, out: &mut [u32]) {
        let origin = Point2::new(
            self.center_x,
            self.min_y + self.height * (height as f32 + 0.5) / self.heights as f32,
        );
        let theta = TAU * (angle as f32 + 0.5) / self.angles as f32;
        let direction = Vector2::new(theta.cos(), theta.sin());

        let n = polygon.len();
        let closeness = |edge: usize| {
            let (a, b) = (polygon[edge], polygon[(edge + 1) % n]);
            let (to_a, to_b) = (a - origin, b - origin);
            if cross(&to_a, &direction) > 0.0 && cross(&direction, &to_b) > 0.0 {
                return 0.0;
            }

            let mid = nalgebra::center(&a, &b) - origin;
            let delta = (mid.y.atan2(mid.x) - theta).rem_euclid(TAU);
            if delta > PI {
                TAU - delta
            } else {
                delta
            }
        };

        for (slot, edge) in out.iter_mut().zip(0..) {
            *slot = edge;
        }
        out.sort_by_cached_key(|&edge| OrderedFloat(closeness(edge as usize)));
    }
}

fn cross(a: &Vector2<f32>, b: &Vector2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}
