use super::{BoundingBox, Point, Ray, Vector, MIN_DISTANCE};

/// Barycentric slack. Rays landing on an edge shared by two triangles are
/// accepted by both instead of slipping between them.
const EDGE_EPSILON: f32 = 1e-4;
const DETERMINANT_EPSILON: f32 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Point; 3],
    normal: Vector,
}

impl Triangle {
    /// The normal follows the winding, `(b - a) x (c - b)`.
    pub fn new(a: Point, b: Point, c: Point) -> Self {
        let normal = (b - a)
            .cross(&(c - b))
            .try_normalize(0.0)
            .unwrap_or_else(Vector::zeros);
        Self {
            vertices: [a, b, c],
            normal,
        }
    }

    pub fn normal(&self) -> Vector {
        self.normal
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    pub fn centroid(&self) -> Point {
        let [a, b, c] = self.vertices;
        Point::from((a.coords + b.coords + c.coords) / 3.0)
    }

    // References:
    //  - https://www.scratchapixel.com/lessons/3d-basic-rendering/ray-tracing-rendering-a-triangle/moller-trumbore-ray-triangle-intersection.html
    //  - Cramer's rule on [b-a, c-a, -d] (t, beta, gamma)
    /// Distance along the ray to the triangle, if it is hit.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let [a, b, c] = self.vertices;
        let (ab, ac) = (b - a, c - a);

        let p = ray.direction.cross(&ac);
        let determinant = ab.dot(&p);
        if determinant.abs() < DETERMINANT_EPSILON {
            return None;
        }

        let inverse = 1.0 / determinant;
        let s = ray.origin - a;
        let beta = s.dot(&p) * inverse;
        if !barycentric_ok(beta) {
            return None;
        }

        let q = s.cross(&ab);
        let gamma = ray.direction.dot(&q) * inverse;
        if !barycentric_ok(gamma) || !barycentric_ok(1.0 - beta - gamma) {
            return None;
        }

        let t = ac.dot(&q) * inverse;
        (t >= MIN_DISTANCE).then_some(t)
    }

    /// Separating axis test against a box. Used by the clipped grid insertion
    /// policy to skip cells the triangle's bounding box covers but the
    /// triangle itself does not.
    // Reference: Akenine-Moller, "Fast 3D Triangle-Box Overlap Testing"
    pub fn overlaps_box(&self, bounds: &BoundingBox) -> bool {
        let center = bounds.center();
        let half = bounds.extent() / 2.0 + Vector::repeat(EDGE_EPSILON);
        let verts = self.vertices.map(|x| x - center);
        let edges = [verts[1] - verts[0], verts[2] - verts[1], verts[0] - verts[2]];

        // True if projecting onto `axis` separates the triangle from the box.
        let separated = |axis: Vector| {
            let projected = verts.map(|x| x.dot(&axis));
            let min = projected[0].min(projected[1]).min(projected[2]);
            let max = projected[0].max(projected[1]).max(projected[2]);
            let radius = half.dot(&axis.abs());
            min > radius || max < -radius
        };

        let box_axes = [Vector::x(), Vector::y(), Vector::z()];
        if box_axes.iter().any(|&axis| separated(axis)) {
            return false;
        }

        if separated(edges[0].cross(&edges[1])) {
            return false;
        }

        !edges
            .iter()
            .any(|edge| box_axes.iter().any(|axis| separated(edge.cross(axis))))
    }
}

fn barycentric_ok(value: f32) -> bool {
    (-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&value)
}
