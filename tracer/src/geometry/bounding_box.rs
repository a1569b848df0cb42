use super::{Point, Ray, Vector};

/// Slack applied when checking whether a point lies on or inside a box.
const BOX_EPSILON: f32 = 1e-4;

/// Directions with a smaller component than this never cross that axis's
/// slabs.
const PARALLEL_EPSILON: f32 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// A box containing nothing. Expanding it by any point gives a box
    /// around just that point.
    pub fn empty() -> Self {
        Self {
            min: Point::from(Vector::repeat(f32::INFINITY)),
            max: Point::from(Vector::repeat(f32::NEG_INFINITY)),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        let mut out = Self::empty();
        points.into_iter().for_each(|x| out.expand_point(x));
        out
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn expand_point(&mut self, point: &Point) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn expand_box(&mut self, other: &BoundingBox) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    pub fn extent(&self) -> Vector {
        self.max - self.min
    }

    pub fn center(&self) -> Point {
        self.min + self.extent() / 2.0
    }

    pub fn longest_axis(&self) -> usize {
        self.extent().imax()
    }

    /// Half of the surface area. Only ratios of areas are ever used, so the
    /// factor of two is left off.
    pub fn half_area(&self) -> f32 {
        let size = self.extent();
        size.x * size.y + size.x * size.z + size.y * size.z
    }

    pub fn contains(&self, point: &Point) -> bool {
        (0..3).all(|axis| {
            point[axis] >= self.min[axis] - BOX_EPSILON
                && point[axis] <= self.max[axis] + BOX_EPSILON
        })
    }

    /// Cuts the box in two at `position` along `axis`.
    pub fn split(&self, axis: usize, position: f32) -> (BoundingBox, BoundingBox) {
        let (mut left, mut right) = (*self, *self);
        left.max[axis] = position;
        right.min[axis] = position;
        (left, right)
    }

    /// Slab test. Returns the distances along the ray where it enters and
    /// leaves the box. The entry distance is negative when the origin is
    /// inside. Boxes entirely behind the ray are a miss.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32)> {
        let mut span = Span::default();

        for axis in 0..3 {
            let direction = ray.direction[axis];
            if direction.abs() <= PARALLEL_EPSILON {
                continue;
            }

            let (next, next_next) = ((axis + 1) % 3, (axis + 2) % 3);
            for plane in [self.min[axis], self.max[axis]] {
                let distance = (plane - ray.origin[axis]) / direction;
                let point = ray.at(distance);
                if self.within(point[next], next) && self.within(point[next_next], next_next) {
                    span.push(distance);
                }
            }
        }

        span.finish().filter(|&(_, exit)| exit >= 0.0)
    }

    fn within(&self, value: f32, axis: usize) -> bool {
        value >= self.min[axis] - BOX_EPSILON && value <= self.max[axis] + BOX_EPSILON
    }
}

/// Running entry/exit pair for the slab test. The first accepted distance is
/// the entry, the second orders the pair and any later ones can only widen
/// it. Rays crossing near an edge produce near-duplicate distances and those
/// must not collapse the span.
#[derive(Default)]
struct Span {
    entry: Option<f32>,
    exit: Option<f32>,
}

impl Span {
    fn push(&mut self, distance: f32) {
        match (self.entry, self.exit) {
            (None, _) => self.entry = Some(distance),
            (Some(entry), None) => {
                self.entry = Some(entry.min(distance));
                self.exit = Some(entry.max(distance));
            }
            (Some(entry), Some(exit)) => {
                self.entry = Some(entry.min(distance));
                self.exit = Some(exit.max(distance));
            }
        }
    }

    fn finish(self) -> Option<(f32, f32)> {
        let entry = self.entry?;
        Some((entry, self.exit.unwrap_or(entry)))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{BoundingBox, Span};
    use crate::geometry::{Point, Ray, Vector};

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point::origin(), Point::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn slab_entry_exit() {
        let ray = Ray::new(Point::new(0.5, 0.5, -1.0), Vector::new(0.0, 0.0, 1.0));
        let (entry, exit) = unit_box().intersect_ray(&ray).unwrap();
        assert!((entry - 1.0).abs() < 1e-6);
        assert!((exit - 2.0).abs() < 1e-6);
    }

    #[test]
    fn slab_miss() {
        let ray = Ray::new(Point::new(2.0, 2.0, 2.0), Vector::new(1.0, 0.0, 0.0));
        assert!(unit_box().intersect_ray(&ray).is_none());
    }

    #[test]
    fn slab_from_inside() {
        let ray = Ray::new(Point::new(0.5, 0.5, 0.25), Vector::new(0.0, 0.0, 1.0));
        let (entry, exit) = unit_box().intersect_ray(&ray).unwrap();
        assert!((entry + 0.25).abs() < 1e-6);
        assert!((exit - 0.75).abs() < 1e-6);
    }

    #[test]
    fn slab_behind() {
        let ray = Ray::new(Point::new(0.5, 0.5, 3.0), Vector::new(0.0, 0.0, 1.0));
        assert!(unit_box().intersect_ray(&ray).is_none());
    }

    #[test]
    fn span_only_widens() {
        let mut span = Span::default();
        for distance in [2.0, 1.0, 1.5, 1.0001, 2.5] {
            span.push(distance);
        }
        assert_eq!(span.finish(), Some((1.0, 2.5)));
    }

    #[test]
    fn slab_through_edge() {
        let ray = Ray::new(Point::new(-1.0, -1.0, 0.5), Vector::new(1.0, 1.0, 0.0));
        let (entry, exit) = unit_box().intersect_ray(&ray).unwrap();
        assert!((entry - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((exit - 2.0 * std::f32::consts::SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn empty_box_expands() {
        let mut bounds = BoundingBox::empty();
        assert!(bounds.is_empty());
        bounds.expand_point(&Point::new(1.0, -2.0, 3.0));
        bounds.expand_point(&Point::new(-1.0, 4.0, 0.0));
        assert!(!bounds.is_empty());
        assert_eq!(bounds.min, Point::new(-1.0, -2.0, 0.0));
        assert_eq!(bounds.max, Point::new(1.0, 4.0, 3.0));
        assert_eq!(bounds.longest_axis(), 1);
    }

    prop_compose! {
        fn point_in_box()(x in 0.0..1.0f32, y in 0.0..1.0f32, z in 0.0..1.0f32) -> Point {
            Point::new(x, y, z)
        }
    }

    prop_compose! {
        fn direction()(x in -1.0..1.0f32, y in -1.0..1.0f32, z in -1.0..1.0f32) -> Vector {
            let v = Vector::new(x, y, z);
            if v.norm() < 1e-3 { Vector::z() } else { v }
        }
    }

    proptest! {
        #[test]
        fn ray_through_inner_point_hits(target in point_in_box(), dir in direction()) {
            // Start well outside and aim through a point inside the box.
            let dir = dir.normalize();
            let ray = Ray::new(target - dir * 5.0, dir);
            let (entry, exit) = unit_box().intersect_ray(&ray).unwrap();

            prop_assert!(entry <= 5.0 + 1e-3);
            prop_assert!(exit >= 5.0 - 1e-3);
            prop_assert!(unit_box().contains(&ray.at(entry)));
            prop_assert!(unit_box().contains(&ray.at(exit)));
        }

        #[test]
        fn origin_inside_has_negative_entry(origin in point_in_box(), dir in direction()) {
            let ray = Ray::new(origin, dir);
            let (entry, exit) = unit_box().intersect_ray(&ray).unwrap();
            prop_assert!(entry <= 1e-4);
            prop_assert!(exit >= -1e-4);
        }
    }
}
