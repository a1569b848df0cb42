//! Tunnels are a convex cross-section swept along a level path. Each path
//! segment produces one ring of wall triangles. The convex index walks these
//! rings in order instead of searching the whole scene.

use std::ops::Range;

use nalgebra::Point2;

use crate::{
    geometry::{Plane, Point, Vector},
    scene::Scene,
};

mod builder;
mod frame;

pub use builder::{arc_path, arch_cross_section, TunnelBuilder};
pub use frame::{PlaneCrossing, PlaneFrame};

#[derive(Debug, Clone)]
pub struct Tunnel {
    cross_section: Vec<Point2<f32>>,
    path: Vec<Point>,
    normals: Vec<Vector>,
    frames: Vec<PlaneFrame>,
    rings: Vec<Range<u32>>,
    scene: Scene,
}

impl Tunnel {
    /// Counterclockwise cross-section polygon, in plane coordinates.
    pub fn cross_section(&self) -> &[Point2<f32>] {
        &self.cross_section
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    /// Normal of the cross-section plane at each path node, pointing along
    /// the path.
    pub fn normals(&self) -> &[Vector] {
        &self.normals
    }

    pub fn frame(&self, node: usize) -> &PlaneFrame {
        &self.frames[node]
    }

    /// Number of path segments, which is also the number of rings.
    pub fn segments(&self) -> usize {
        self.rings.len()
    }

    /// Scene indices of the wall triangles between path nodes `segment` and
    /// `segment + 1`. Edge `e` of the cross-section owns triangles `2e` and
    /// `2e + 1` of the ring. Rings that failed the convexity check are empty.
    pub fn ring(&self, segment: usize) -> Range<u32> {
        self.rings.get(segment).cloned().unwrap_or(0..0)
    }

    /// All wall triangles.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Plane capping the far end of the tunnel.
    pub fn exit_plane(&self) -> Plane {
        let last = self.path.len() - 1;
        Plane::from_point(&self.path[last], self.normals[last])
    }
}
