use super::{BoundingBox, Point, Ray, Vector, MIN_DISTANCE};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Point,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Point, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn bounds(&self) -> BoundingBox {
        let radius = Vector::repeat(self.radius);
        BoundingBox::new(self.center - radius, self.center + radius)
    }

    /// Nearest root past the minimum distance. From inside the sphere that is
    /// the far root.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let to_center = self.center - ray.origin;
        let b = ray.direction.dot(&to_center);
        let delta = b * b - (to_center.norm_squared() - self.radius * self.radius);
        if delta < 0.0 {
            return None;
        }

        let root = delta.sqrt();
        let (near, far) = (b - root, b + root);
        if near >= MIN_DISTANCE {
            Some(near)
        } else {
            (far >= MIN_DISTANCE).then_some(far)
        }
    }

    pub fn normal_at(&self, point: &Point) -> Vector {
        (point - self.center) / self.radius
    }

    pub fn overlaps_box(&self, bounds: &BoundingBox) -> bool {
        let closest = self.center.sup(&bounds.min).inf(&bounds.max);
        (closest - self.center).norm_squared() <= self.radius * self.radius
    }
}
