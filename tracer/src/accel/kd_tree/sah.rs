//! Surface area heuristic split selection by plane sweep. Based on Wald and
//! Havran, "On building fast kd-Trees for Ray Tracing, and on doing that in
//! O(N log^2 N)".

use ordered_float::OrderedFloat;
use rayon::prelude::*;

use super::BuildParams;
use crate::{geometry::BoundingBox, scene::Scene};

/// Ordering matters: at equal positions primitives ending there are counted
/// before planar ones, and those before primitives starting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    End,
    Planar,
    Start,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    position: f32,
    kind: EventKind,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    axis: usize,
    position: f32,
    cost: f32,
}

/// Finds the cheapest split plane over all three axes. Returns `None` when
/// making a leaf is estimated to be cheaper than any split.
pub fn best_split(
    scene: &Scene,
    primitives: &[u32],
    bounds: &BoundingBox,
    params: &BuildParams,
) -> Option<(usize, f32)> {
    let best = (0..3)
        .into_par_iter()
        .filter_map(|axis| sweep_axis(scene, primitives, bounds, axis, params))
        .min_by_key(|x| OrderedFloat(x.cost))?;

    let leaf_cost = params.leaf_factor * primitives.len() as f32;
    (best.cost.is_finite() && best.cost <= leaf_cost).then_some((best.axis, best.position))
}

fn sweep_axis(
    scene: &Scene,
    primitives: &[u32],
    bounds: &BoundingBox,
    axis: usize,
    params: &BuildParams,
) -> Option<Candidate> {
    let total_area = bounds.half_area();
    if !(total_area > 0.0) {
        return None;
    }

    // Primitives are clipped to the node so events never fall outside it.
    let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
    let mut events = Vec::with_capacity(primitives.len() * 2);
    for &primitive in primitives {
        let Some(primitive_bounds) = scene.get(primitive).bounds() else {
            continue;
        };
        let start = primitive_bounds.min[axis].clamp(lo, hi);
        let end = primitive_bounds.max[axis].clamp(lo, hi);

        if start == end {
            events.push(Event::new(start, EventKind::Planar));
        } else {
            events.push(Event::new(start, EventKind::Start));
            events.push(Event::new(end, EventKind::End));
        }
    }
    events.sort_unstable_by_key(|x| (OrderedFloat(x.position), x.kind));

    let (mut left, mut right) = (0, primitives.len());
    let mut best: Option<Candidate> = None;
    let mut i = 0;
    while i < events.len() {
        let position = events[i].position;
        let mut count = |kind| {
            let start = i;
            while i < events.len() && events[i].position == position && events[i].kind == kind {
                i += 1;
            }
            i - start
        };
        let (ending, planar, starting) = (
            count(EventKind::End),
            count(EventKind::Planar),
            count(EventKind::Start),
        );

        right -= planar + ending;

        let (left_bounds, right_bounds) = bounds.split(axis, position);
        let cost = params.traversal_cost
            + params.intersection_cost
                * (left_bounds.half_area() / total_area * (left + planar) as f32
                    + right_bounds.half_area() / total_area * right as f32);

        if best.map_or(true, |x| cost < x.cost) {
            best = Some(Candidate {
                axis,
                position,
                cost,
            });
        }

        left += starting + planar;
    }

    best
}

impl Event {
    fn new(position: f32, kind: EventKind) -> Self {
        Self { position, kind }
    }
}
