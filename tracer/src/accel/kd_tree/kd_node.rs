use common::progress::Progress;
use ordered_float::OrderedFloat;

use super::{sah::best_split, BuildParams, SplitPolicy};
use crate::{geometry::BoundingBox, scene::Scene};

#[derive(Debug)]
pub enum KdNode {
    Leaf {
        primitives: Box<[u32]>,
        bounds: BoundingBox,
    },
    Split {
        axis: usize,
        position: f32,
        left: usize,
        right: usize,
        bounds: BoundingBox,
    },
}

impl KdNode {
    pub fn bounds(&self) -> &BoundingBox {
        match self {
            KdNode::Leaf { bounds, .. } | KdNode::Split { bounds, .. } => bounds,
        }
    }
}

/// Builds the subtree for `primitives` inside `bounds`, pushing every
/// descendant into the arena and returning the subtree root.
///
/// Primitives are sent to each side they have any part on, so ones that
/// straddle the split end up in both children.
pub fn build_kd_node(
    arena: &mut Vec<KdNode>,
    scene: &Scene,
    params: &BuildParams,
    progress: &Progress,
    mut primitives: Vec<u32>,
    bounds: BoundingBox,
    depth: u32,
) -> KdNode {
    let leaf = |primitives: Vec<u32>| {
        progress.add_complete(primitives.len() as u64);
        KdNode::Leaf {
            primitives: primitives.into_boxed_slice(),
            bounds,
        }
    };

    if primitives.len() <= params.leaf_size || depth > params.max_depth {
        return leaf(primitives);
    }

    let split = match params.policy {
        SplitPolicy::Median => {
            let axis = depth as usize % 3;
            primitives.sort_by_cached_key(|&x| OrderedFloat(scene.get(x).centroid()[axis]));
            let median = primitives[primitives.len() / 2];
            Some((axis, scene.get(median).centroid()[axis]))
        }
        SplitPolicy::Sah => best_split(scene, &primitives, &bounds, params),
    };

    let Some((axis, position)) = split else {
        return leaf(primitives);
    };

    let (mut left_primitives, mut right_primitives) = (Vec::new(), Vec::new());
    for &primitive in primitives.iter() {
        let Some(primitive_bounds) = scene.get(primitive).bounds() else {
            continue;
        };
        if primitive_bounds.min[axis] < position {
            left_primitives.push(primitive);
        }
        if primitive_bounds.max[axis] >= position {
            right_primitives.push(primitive);
        }
    }

    let push_idx = |arena: &mut Vec<KdNode>, val| {
        arena.push(val);
        arena.len() - 1
    };

    let (left_bounds, right_bounds) = bounds.split(axis, position);
    let left = build_kd_node(
        arena,
        scene,
        params,
        progress,
        left_primitives,
        left_bounds,
        depth + 1,
    );
    let left = push_idx(arena, left);

    let right = build_kd_node(
        arena,
        scene,
        params,
        progress,
        right_primitives,
        right_bounds,
        depth + 1,
    );
    let right = push_idx(arena, right);

    KdNode::Split {
        axis,
        position,
        left,
        right,
        bounds,
    }
}
