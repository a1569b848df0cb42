use nalgebra::Point2;

/// Points closer than this to an edge's line, or outside it, count as
/// outside the cross-section. Rays grazing a wall get checked against the
/// wall instead of slipping past it.
pub const INSIDE_EPSILON: f32 = 1e-4;

/// Line through a cross-section edge, `a * x + b * y + c`, scaled so the
/// value is the signed distance to the line. Positive on the inside of a
/// counterclockwise polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfPlane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl HalfPlane {
    pub fn through(start: &Point2<f32>, end: &Point2<f32>) -> Self {
        let (a, b) = (start.y - end.y, end.x - start.x);
        let c = start.x * end.y - end.x * start.y;
        let length = a.hypot(b);
        if length > 0.0 {
            Self {
                a: a / length,
                b: b / length,
                c: c / length,
            }
        } else {
            Self { a, b, c }
        }
    }

    pub fn value(&self, point: &Point2<f32>) -> f32 {
        self.a * point.x + self.b * point.y + self.c
    }

    pub fn passes(&self, point: &Point2<f32>) -> bool {
        self.value(point) >= INSIDE_EPSILON
    }
}

/// One half plane per edge, edge `i` running from vertex `i` to `i + 1`.
pub fn half_planes(polygon: &[Point2<f32>]) -> Vec<HalfPlane> {
    let n = polygon.len();
    (0..n)
        .map(|i| HalfPlane::through(&polygon[i], &polygon[(i + 1) % n]))
        .collect()
}
