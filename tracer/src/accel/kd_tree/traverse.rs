//! Stack based traversal, after Havran's recursive ray traversal algorithm
//! (TA_rec_B, "Heuristic Ray Shooting Algorithms", appendix C).

use super::{kd_node::KdNode, KdTree, STACK_SIZE};
use crate::geometry::{Hit, Point, Ray};

/// Leaf hits may lie this far outside the leaf's interval along the ray.
const INTERVAL_EPSILON: f32 = 1e-3;

#[derive(Clone, Copy)]
struct StackEntry {
    /// Subtree still to visit. `None` marks the end of the ray's interval.
    node: Option<usize>,
    distance: f32,
    point: Point,
    prev: usize,
}

impl KdTree {
    pub(super) fn traverse(&self, ray: &Ray) -> Option<Hit<'_>> {
        let root = self.root()?;
        let (entry, exit) = self.bounds.intersect_ray(ray)?;

        let mut stack = [StackEntry::default(); STACK_SIZE];
        let mut enter = 0;
        stack[enter].distance = entry;
        stack[enter].point = if entry >= 0.0 { ray.at(entry) } else { ray.origin };

        let mut leave = 1;
        stack[leave].distance = exit;
        stack[leave].point = ray.at(exit);
        stack[leave].node = None;

        let mut current = Some(root);
        while let Some(mut node) = current {
            let primitives = loop {
                let (axis, split, left, right) = match &self.nodes[node] {
                    KdNode::Leaf { primitives, .. } => break primitives,
                    KdNode::Split {
                        axis,
                        position,
                        left,
                        right,
                        ..
                    } => (*axis, *position, *left, *right),
                };

                // Either the whole interval is on one side of the split, or
                // the near child is visited now and the far child pushed.
                let (near, far) = if stack[enter].point[axis] <= split {
                    if stack[leave].point[axis] <= split {
                        node = left;
                        continue;
                    }
                    (left, right)
                } else {
                    if split < stack[leave].point[axis] {
                        node = right;
                        continue;
                    }
                    (right, left)
                };

                let distance = (split - ray.origin[axis]) / ray.direction[axis];
                let prev = leave;
                leave += 1;
                if leave == enter {
                    leave += 1;
                }

                let mut point = ray.at(distance);
                point[axis] = split;
                stack[leave] = StackEntry {
                    node: Some(far),
                    distance,
                    point,
                    prev,
                };
                node = near;
            };

            let (lo, hi) = (
                stack[enter].distance - INTERVAL_EPSILON,
                stack[leave].distance + INTERVAL_EPSILON,
            );
            let hit = (primitives.iter())
                .filter_map(|&x| self.scene.get(x).intersect(ray))
                .filter(|x| (lo..=hi).contains(&x.distance))
                .fold(None, |best, x| Hit::closest(best, Some(x)));
            if hit.is_some() {
                return hit;
            }

            enter = leave;
            current = stack[leave].node;
            leave = stack[enter].prev;
        }

        None
    }
}

impl Default for StackEntry {
    fn default() -> Self {
        Self {
            node: None,
            distance: 0.0,
            point: Point::origin(),
            prev: 0,
        }
    }
}
