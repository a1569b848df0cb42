use common::{config::IndexConfig, progress::Progress};

use crate::{
    geometry::{BoundingBox, Hit, Ray},
    scene::Scene,
};
use kd_node::{build_kd_node, KdNode};

mod kd_node;
mod sah;
mod traverse;

/// Traversal keeps its pending far children in a fixed size stack. Trees are
/// never built deeper than this allows.
const STACK_SIZE: usize = 50;
const MAX_DEPTH_LIMIT: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Axes in turn, split at the median primitive centroid.
    Median,
    /// Cheapest plane by the surface area heuristic, or no split at all if a
    /// leaf is cheaper.
    Sah,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BuildParams {
    policy: SplitPolicy,
    leaf_size: usize,
    max_depth: u32,
    traversal_cost: f32,
    intersection_cost: f32,
    leaf_factor: f32,
}

pub struct KdTree {
    scene: Scene,
    bounds: BoundingBox,
    /// Children are pushed before their parents, so the root is last.
    nodes: Box<[KdNode]>,
    unbounded: Box<[u32]>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KdStats {
    pub nodes: usize,
    pub leaves: usize,
    pub empty_leaves: usize,
    pub references: usize,
    pub depth: usize,
}

impl KdTree {
    pub fn build(
        scene: Scene,
        policy: SplitPolicy,
        config: &IndexConfig,
        progress: &Progress,
    ) -> Self {
        let params = BuildParams::new(policy, config);
        let bounded = scene.bounded();
        let bounds = scene.bounds();
        progress.start_stage("kd tree build", bounded.len() as u64);

        let mut arena = Vec::new();
        if !bounded.is_empty() {
            let root = build_kd_node(&mut arena, &scene, &params, progress, bounded, bounds, 0);
            arena.push(root);
        }

        progress.set_finished();
        Self {
            unbounded: scene.unbounded().into(),
            scene,
            bounds,
            nodes: arena.into_boxed_slice(),
        }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<Hit<'_>> {
        let indexed = self.traverse(ray);
        Hit::closest(indexed, self.scene.intersect_subset(&self.unbounded, ray))
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    pub fn stats(&self) -> KdStats {
        let mut stats = KdStats {
            nodes: self.nodes.len(),
            ..Default::default()
        };

        let mut stack = self.root().map(|x| (x, 1)).into_iter().collect::<Vec<_>>();
        while let Some((node, depth)) = stack.pop() {
            stats.depth = stats.depth.max(depth);
            match &self.nodes[node] {
                KdNode::Leaf { primitives, .. } => {
                    stats.leaves += 1;
                    stats.references += primitives.len();
                    stats.empty_leaves += primitives.is_empty() as usize;
                }
                KdNode::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }

        stats
    }
}

impl BuildParams {
    fn new(policy: SplitPolicy, config: &IndexConfig) -> Self {
        Self {
            policy,
            leaf_size: config.kd_leaf_size.max(1),
            max_depth: config.kd_max_depth.min(MAX_DEPTH_LIMIT),
            traversal_cost: config.sah_traversal_cost,
            intersection_cost: config.sah_intersection_cost,
            leaf_factor: config.sah_leaf_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use common::{config::IndexConfig, progress::Progress};
    use proptest::prelude::*;

    use super::{KdNode, KdTree, SplitPolicy};
    use crate::{
        geometry::{Plane, Point, Primitive, Ray, Triangle, Vector},
        scene::Scene,
        test_util::{random_scene, ray_strategy, same_hit},
    };

    fn build(scene: &Scene, policy: SplitPolicy) -> KdTree {
        KdTree::build(scene.clone(), policy, &IndexConfig::default(), &Progress::new())
    }

    /// Checks every leaf against each split above it. Primitives on the left
    /// of a split must start below it and those on the right must end at or
    /// above it.
    fn check_partition(tree: &KdTree, scene: &Scene) {
        let all = (0..scene.len() as u32).collect::<HashSet<_>>();
        let mut stack = vec![(tree.root().unwrap(), Vec::<(usize, f32, bool)>::new())];

        while let Some((node, splits)) = stack.pop() {
            match &tree.nodes()[node] {
                KdNode::Leaf { primitives, .. } => {
                    for &primitive in primitives.iter() {
                        assert!(all.contains(&primitive));
                        let bounds = scene.get(primitive).bounds().unwrap();
                        for &(axis, position, left) in &splits {
                            if left {
                                assert!(bounds.min[axis] < position);
                            } else {
                                assert!(bounds.max[axis] >= position);
                            }
                        }
                    }
                }
                KdNode::Split {
                    axis,
                    position,
                    left,
                    right,
                    ..
                } => {
                    let mut on_left = splits.clone();
                    on_left.push((*axis, *position, true));
                    let mut on_right = splits;
                    on_right.push((*axis, *position, false));
                    stack.push((*left, on_left));
                    stack.push((*right, on_right));
                }
            }
        }
    }

    #[test]
    fn small_scenes_are_one_leaf() {
        let scene = Scene::new(vec![Primitive::from(Triangle::new(
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 1.0, 0.0),
        ))]);
        let tree = build(&scene, SplitPolicy::Median);
        assert_eq!(tree.stats().nodes, 1);
        assert_eq!(tree.stats().leaves, 1);
    }

    #[test]
    fn coplanar_primitives_become_a_leaf() {
        // Twenty copies of one flat triangle. No split can beat a leaf.
        let triangle = Primitive::from(Triangle::new(
            Point::new(0.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(0.0, 2.0, 0.0),
        ));
        let scene = Scene::new(vec![triangle; 20]);
        let tree = build(&scene, SplitPolicy::Sah);

        let stats = tree.stats();
        assert_eq!(stats.leaves, 1);
        assert_eq!(stats.references, 20);

        let ray = Ray::new(Point::new(0.5, 0.5, 1.0), -Vector::z());
        assert!((tree.intersect(&ray).unwrap().distance - 1.0).abs() < 1e-5);
    }

    #[test]
    fn depth_is_capped() {
        // Many identical spheres can never be separated.
        let sphere = Primitive::from(crate::geometry::Sphere::new(Point::origin(), 1.0));
        let scene = Scene::new(vec![sphere; 64]);
        let config = IndexConfig {
            kd_max_depth: 5,
            ..Default::default()
        };
        let tree = KdTree::build(scene, SplitPolicy::Median, &config, &Progress::new());
        assert!(tree.stats().depth <= 7);
    }

    #[test]
    fn planes_are_checked_separately() {
        let mut primitives = vec![Primitive::from(Plane::new(Vector::y(), -2.0))];
        primitives.extend((0..20).map(|i| {
            let x = i as f32;
            Primitive::from(Triangle::new(
                Point::new(x, 0.0, 0.0),
                Point::new(x + 1.0, 0.0, 0.0),
                Point::new(x, 1.0, 0.0),
            ))
        }));
        let scene = Scene::new(primitives);
        let tree = build(&scene, SplitPolicy::Sah);

        let hit = tree
            .intersect(&Ray::new(Point::new(0.0, 10.0, 5.0), -Vector::y()))
            .unwrap();
        assert!((hit.distance - 12.0).abs() < 1e-4);
        check_partition(&tree, &scene);
    }

    #[test]
    fn empty_scene() {
        let tree = build(&Scene::new(Vec::new()), SplitPolicy::Sah);
        assert!(tree.root().is_none());
        assert!(tree.intersect(&Ray::new(Point::origin(), Vector::x())).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn agrees_with_linear(
            scene in random_scene(60),
            rays in proptest::collection::vec(ray_strategy(), 64),
            sah in any::<bool>(),
        ) {
            let policy = if sah { SplitPolicy::Sah } else { SplitPolicy::Median };
            let tree = build(&scene, policy);
            for ray in rays {
                prop_assert!(same_hit(tree.intersect(&ray), scene.intersect(&ray)), "{ray:?}");
            }
        }

        #[test]
        fn partition_invariant(scene in random_scene(80), sah in any::<bool>()) {
            let policy = if sah { SplitPolicy::Sah } else { SplitPolicy::Median };
            let tree = build(&scene, policy);
            check_partition(&tree, &scene);
        }
    }
}
