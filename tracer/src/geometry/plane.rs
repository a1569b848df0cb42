use super::{BoundingBox, Point, Ray, Vector, MIN_DISTANCE};

/// Infinite two sided plane, the points `p` with `normal . p = offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector,
    pub offset: f32,
}

impl Plane {
    pub fn new(normal: Vector, offset: f32) -> Self {
        Self {
            normal: normal.normalize(),
            offset,
        }
    }

    /// Plane through `point` facing along `normal`.
    pub fn from_point(point: &Point, normal: Vector) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            offset: normal.dot(&point.coords),
        }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let denominator = self.normal.dot(&ray.direction);
        if denominator.abs() < 1e-10 {
            return None;
        }

        let t = (self.offset - self.normal.dot(&ray.origin.coords)) / denominator;
        (t >= MIN_DISTANCE).then_some(t)
    }

    /// A point on the plane.
    pub fn anchor(&self) -> Point {
        Point::from(self.normal * self.offset)
    }

    /// True if the plane passes through the box.
    pub fn overlaps_box(&self, bounds: &BoundingBox) -> bool {
        let center = bounds.center();
        let radius = (bounds.extent() / 2.0).dot(&self.normal.abs());
        (self.normal.dot(&center.coords) - self.offset).abs() <= radius
    }
}

#[cfg(test)]
mod tests {
    use super::Plane;
    use crate::geometry::{BoundingBox, Point, Ray, Vector};

    #[test]
    fn two_sided() {
        let plane = Plane::from_point(&Point::new(0.0, 0.0, -10.0), Vector::z());
        let toward = Ray::new(Point::origin(), -Vector::z());
        let back = Ray::new(Point::new(0.0, 0.0, -20.0), Vector::z());
        assert!((plane.intersect(&toward).unwrap() - 10.0).abs() < 1e-5);
        assert!((plane.intersect(&back).unwrap() - 10.0).abs() < 1e-5);
        assert!(plane.intersect(&Ray::new(Point::origin(), Vector::z())).is_none());
        assert!(plane.intersect(&Ray::new(Point::origin(), Vector::x())).is_none());
    }

    #[test]
    fn box_overlap() {
        let plane = Plane::new(Vector::new(1.0, 1.0, 0.0), 0.0);
        let through = BoundingBox::new(Point::new(-1.0, -1.0, 0.0), Point::new(1.0, 1.0, 1.0));
        let beside = BoundingBox::new(Point::new(2.0, 2.0, 0.0), Point::new(3.0, 3.0, 1.0));
        assert!(plane.overlaps_box(&through));
        assert!(!plane.overlaps_box(&beside));
        assert_eq!(plane.anchor(), Point::origin());
    }
}
