use super::{BoundingBox, Hit, Plane, Point, Ray, Sphere, Triangle, Vector};

/// A single intersectable shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Primitive {
    Triangle(Triangle),
    Plane(Plane),
    Sphere(Sphere),
}

impl Primitive {
    pub fn intersect(&self, ray: &Ray) -> Option<Hit<'_>> {
        let distance = match self {
            Primitive::Triangle(triangle) => triangle.intersect(ray),
            Primitive::Plane(plane) => plane.intersect(ray),
            Primitive::Sphere(sphere) => sphere.intersect(ray),
        }?;

        let position = ray.at(distance);
        Some(Hit {
            distance,
            position,
            normal: self.normal_at(&position),
            primitive: self,
        })
    }

    /// Planes are unbounded and return `None`.
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Primitive::Triangle(triangle) => Some(triangle.bounds()),
            Primitive::Plane(_) => None,
            Primitive::Sphere(sphere) => Some(sphere.bounds()),
        }
    }

    pub fn centroid(&self) -> Point {
        match self {
            Primitive::Triangle(triangle) => triangle.centroid(),
            Primitive::Plane(plane) => plane.anchor(),
            Primitive::Sphere(sphere) => sphere.center,
        }
    }

    /// Exact overlap with a box, as opposed to the bounding box overlap.
    pub fn overlaps_box(&self, bounds: &BoundingBox) -> bool {
        match self {
            Primitive::Triangle(triangle) => triangle.overlaps_box(bounds),
            Primitive::Plane(plane) => plane.overlaps_box(bounds),
            Primitive::Sphere(sphere) => sphere.overlaps_box(bounds),
        }
    }

    fn normal_at(&self, position: &Point) -> Vector {
        match self {
            Primitive::Triangle(triangle) => triangle.normal(),
            Primitive::Plane(plane) => plane.normal,
            Primitive::Sphere(sphere) => sphere.normal_at(position),
        }
    }
}

impl From<Triangle> for Primitive {
    fn from(value: Triangle) -> Self {
        Primitive::Triangle(value)
    }
}

impl From<Plane> for Primitive {
    fn from(value: Plane) -> Self {
        Primitive::Plane(value)
    }
}

impl From<Sphere> for Primitive {
    fn from(value: Sphere) -> Self {
        Primitive::Sphere(value)
    }
}
