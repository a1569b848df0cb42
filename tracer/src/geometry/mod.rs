use nalgebra::{Point3, Vector3};

pub mod bounding_box;
pub mod plane;
pub mod primitive;
pub mod sphere;
pub mod triangle;

pub use bounding_box::BoundingBox;
pub use plane::Plane;
pub use primitive::Primitive;
pub use sphere::Sphere;
pub use triangle::Triangle;

pub type Point = Point3<f32>;
pub type Vector = Vector3<f32>;

/// Hits closer than this to the ray origin are discarded, so a ray spawned on
/// a surface does not immediately hit that surface again.
pub const MIN_DISTANCE: f32 = 5e-4;

/// Traversal state that travels with a ray. The tunnel index uses it to
/// resume from the segment a parent ray was last seen in instead of
/// searching from the entrance.
///
/// `segment` only means something while `inside_tunnel` is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RayContext {
    pub inside_tunnel: bool,
    pub segment: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point,
    /// Always unit length.
    pub direction: Vector,
    pub context: RayContext,
}

/// The closest intersection of a ray with a scene.
#[derive(Clone, Copy, Debug)]
pub struct Hit<'a> {
    pub distance: f32,
    pub position: Point,
    pub normal: Vector,
    pub primitive: &'a Primitive,
}

impl Ray {
    pub fn new(origin: Point, direction: Vector) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            context: RayContext::default(),
        }
    }

    /// Creates a ray that continues this one's light path. The context is
    /// copied, never shared, so sibling rays keep independent tunnel cursors.
    pub fn spawn(&self, origin: Point, direction: Vector) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            context: self.context,
        }
    }

    pub fn at(&self, distance: f32) -> Point {
        self.origin + self.direction * distance
    }
}

impl<'a> Hit<'a> {
    /// Picks the nearer of two optional hits.
    pub fn closest(a: Option<Hit<'a>>, b: Option<Hit<'a>>) -> Option<Hit<'a>> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if b.distance < a.distance { b } else { a }),
            (a, b) => a.or(b),
        }
    }

    /// Mirror reflection of `ray` about the hit normal, starting at the hit.
    pub fn reflect(&self, ray: &Ray) -> Ray {
        let normal = if self.normal.dot(&ray.direction) > 0.0 {
            -self.normal
        } else {
            self.normal
        };
        let direction = ray.direction - normal * (2.0 * normal.dot(&ray.direction));
        ray.spawn(self.position, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::{Hit, Plane, Point, Primitive, Ray, RayContext, Vector};

    #[test]
    fn new_rays_are_outside() {
        let ray = Ray::new(Point::origin(), Vector::new(0.0, 0.0, -3.0));
        assert_eq!(ray.context, RayContext::default());
        assert!((ray.direction.norm() - 1.0).abs() < 1e-6);
        assert_eq!(ray.at(2.0), Point::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn spawned_rays_copy_context() {
        let mut parent = Ray::new(Point::origin(), Vector::z());
        parent.context = RayContext {
            inside_tunnel: true,
            segment: 7,
        };

        let mut child = parent.spawn(Point::new(1.0, 0.0, 0.0), Vector::x());
        assert_eq!(child.context, parent.context);

        child.context.segment = 9;
        assert_eq!(parent.context.segment, 7);
    }

    #[test]
    fn reflect_flips_normal_component() {
        let floor = Primitive::Plane(Plane::new(Vector::y(), 0.0));
        let ray = Ray::new(Point::new(0.0, 1.0, 0.0), Vector::new(1.0, -1.0, 0.0));
        let hit = floor.intersect(&ray).unwrap();

        let bounce = hit.reflect(&ray);
        let expected = Vector::new(1.0, 1.0, 0.0).normalize();
        assert!((bounce.direction - expected).norm() < 1e-5);
        assert!((bounce.origin - Point::new(1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn closest_prefers_nearer() {
        let floor = Primitive::Plane(Plane::new(Vector::y(), 0.0));
        let ceiling = Primitive::Plane(Plane::new(Vector::y(), 3.0));
        let ray = Ray::new(Point::new(0.0, 1.0, 0.0), Vector::y());

        let up = ceiling.intersect(&ray);
        let down = floor.intersect(&ray);
        assert!(down.is_none());
        assert_eq!(Hit::closest(down, up).unwrap().distance, 2.0);
        assert!(Hit::closest(None, None).is_none());
    }
}
