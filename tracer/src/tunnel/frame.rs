use nalgebra::{Matrix3, Point2, Rotation3, Vector2};

use crate::geometry::{Point, Vector};

/// Unit directions whose component along the plane normal is smaller than
/// this run along the plane.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Local coordinates of a cross-section plane. The plane normal maps to -Z
/// and the cross-section polygon lies in the XY plane, so a world space ray
/// crosses the plane where its local z reaches zero.
///
/// Only rotations about +Y are supported, so tunnel paths stay level.
#[derive(Clone, Copy, Debug)]
pub struct PlaneFrame {
    origin: Point,
    rotation: Rotation3<f32>,
}

/// Where a ray meets a cross-section plane, in plane coordinates.
#[derive(Clone, Copy, Debug)]
pub struct PlaneCrossing {
    pub distance: f32,
    pub point: Point2<f32>,
}

impl PlaneFrame {
    /// The rotation is built straight from the normal's horizontal part, so
    /// an axis aligned normal gives an exact rotation.
    pub fn new(origin: Point, normal: &Vector) -> Self {
        let length = normal.x.hypot(normal.z);
        let (sin, cos) = if length > 0.0 {
            (normal.x / length, -normal.z / length)
        } else {
            (0.0, 1.0)
        };

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            cos, 0.0, sin,
            0.0, 1.0, 0.0,
            -sin, 0.0, cos,
        );
        Self {
            origin,
            rotation: Rotation3::from_matrix_unchecked(matrix),
        }
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn to_local(&self, point: &Point) -> Point {
        Point::from(self.rotation * (point - self.origin))
    }

    pub fn to_local_vector(&self, vector: &Vector) -> Vector {
        self.rotation * vector
    }

    pub fn to_world(&self, point: &Point2<f32>) -> Point {
        self.origin + self.rotation.inverse() * Vector::new(point.x, point.y, 0.0)
    }

    /// Finds where a ray crosses the plane. Rays that are moving away from
    /// the plane, or run along it, never cross.
    pub fn crossing(&self, origin: &Point, direction: &Vector) -> Option<PlaneCrossing> {
        let (origin, direction) = (self.to_local(origin), self.to_local_vector(direction));
        if direction.z.abs() <= PARALLEL_EPSILON || origin.z * direction.z >= 0.0 {
            return None;
        }

        let distance = -origin.z / direction.z;
        Some(PlaneCrossing {
            distance,
            point: Point2::new(
                origin.x + direction.x * distance,
                origin.y + direction.y * distance,
            ),
        })
    }

    /// Projects a ray onto the plane: local origin and the in-plane part of
    /// the direction. `None` if the ray runs along the plane normal.
    pub fn project(&self, origin: &Point, direction: &Vector) -> Option<(Point2<f32>, Vector2<f32>)> {
        let (origin, direction) = (self.to_local(origin), self.to_local_vector(direction));
        let direction = Vector2::new(direction.x, direction.y).try_normalize(1e-12)?;
        Some((Point2::new(origin.x, origin.y), direction))
    }
}
