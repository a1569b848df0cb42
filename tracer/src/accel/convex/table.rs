use std::ops::RangeInclusive;

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

use super::edges::{HalfPlane, INSIDE_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    /// Every point of the cell is inside the cross-section.
    Hit,
    /// No corner of the cell is inside the cross-section.
    Miss,
    /// Straddles the boundary. Only edges `first..=last` need checking.
    Partial { first: u32, last: u32 },
}

/// Coarse inside/outside classification of the cross-section plane. Cell
/// centers sit on a `size x size` lattice spanning the polygon's bounding
/// rectangle, so the outer cells stick out half a cell past it.
pub struct ClassificationTable {
    min: Point2<f32>,
    cell: Vector2<f32>,
    size: usize,
    cells: Box<[CellStatus]>,
}

impl ClassificationTable {
    pub fn build(polygon: &[Point2<f32>], planes: &[HalfPlane], size: usize) -> Self {
        let size = size.max(2);
        let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
        let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for point in polygon {
            min = min.inf(point);
            max = max.sup(point);
        }
        let cell = (max - min) / (size - 1) as f32;

        let mut table = Self {
            min,
            cell,
            size,
            cells: Box::new([]),
        };

        let cells = (0..size * size)
            .into_par_iter()
            .map(|idx| table.classify(polygon, planes, idx / size, idx % size))
            .collect::<Vec<_>>();
        table.cells = cells.into_boxed_slice();
        table
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn status(&self, x: usize, y: usize) -> CellStatus {
        self.cells[x * self.size + y]
    }

    /// Status of the cell whose center is nearest to `point`. Points off the
    /// table use the nearest edge cell.
    pub fn lookup(&self, point: &Point2<f32>) -> CellStatus {
        let index = |value: f32, min: f32, cell: f32| {
            let idx = ((value - min) / cell).round();
            if idx.is_nan() {
                0
            } else {
                (idx.max(0.0) as usize).min(self.size - 1)
            }
        };

        let x = index(point.x, self.min.x, self.cell.x);
        let y = index(point.y, self.min.y, self.cell.y);
        self.status(x, y)
    }

    /// Point in polygon test, exact only for the edges that matter in the
    /// point's cell.
    pub fn contains(&self, planes: &[HalfPlane], point: &Point2<f32>) -> bool {
        match self.lookup(point) {
            CellStatus::Hit => true,
            CellStatus::Miss => false,
            CellStatus::Partial { first, last } => planes
                [first as usize..=last as usize]
                .iter()
                .all(|x| x.passes(point)),
        }
    }

    pub fn corners(&self, x: usize, y: usize) -> [Point2<f32>; 4] {
        let center = self.min + self.cell.component_mul(&Vector2::new(x as f32, y as f32));
        let half = self.cell / 2.0;
        [
            center + Vector2::new(-half.x, -half.y),
            center + Vector2::new(half.x, -half.y),
            center + Vector2::new(half.x, half.y),
            center + Vector2::new(-half.x, half.y),
        ]
    }

    fn classify(&self, polygon: &[Point2<f32>], planes: &[HalfPlane], x: usize, y: usize) -> CellStatus {
        let corners = self.corners(x, y);
        let inside = (corners.iter())
            .filter(|corner| planes.iter().all(|plane| plane.passes(corner)))
            .count();

        match inside {
            4 => CellStatus::Hit,
            0 if !self.holds_vertex(polygon, &corners) => CellStatus::Miss,
            _ => {
                let range = self.edge_range(polygon, planes, &corners);
                CellStatus::Partial {
                    first: *range.start() as u32,
                    last: *range.end() as u32,
                }
            }
        }
    }

    /// A narrow tip of the polygon can poke into a cell without covering any
    /// corner.
    fn holds_vertex(&self, polygon: &[Point2<f32>], corners: &[Point2<f32>; 4]) -> bool {
        let (lo, hi) = (corners[0], corners[2]);
        polygon
            .iter()
            .any(|p| p.x >= lo.x && p.x <= hi.x && p.y >= lo.y && p.y <= hi.y)
    }

    /// Smallest edge index range holding every edge whose line crosses the
    /// cell, skipping edges that lie entirely to one side of it.
    fn edge_range(
        &self,
        polygon: &[Point2<f32>],
        planes: &[HalfPlane],
        corners: &[Point2<f32>; 4],
    ) -> RangeInclusive<usize> {
        let (lo, hi) = (corners[0], corners[2]);
        let n = polygon.len();

        let crossing = (0..n).filter(|&edge| {
            let values = corners.map(|x| planes[edge].value(&x));
            if values.iter().all(|&x| x > INSIDE_EPSILON) || values.iter().all(|&x| x < -INSIDE_EPSILON) {
                return false;
            }

            let (a, b) = (polygon[edge], polygon[(edge + 1) % n]);
            !((a.x < lo.x && b.x < lo.x)
                || (a.x > hi.x && b.x > hi.x)
                || (a.y < lo.y && b.y < lo.y)
                || (a.y > hi.y && b.y > hi.y))
        });

        let (first, last) = crossing.fold((usize::MAX, 0), |(first, last), edge| {
            (first.min(edge), last.max(edge))
        });

        if first == usize::MAX {
            0..=n - 1
        } else {
            first..=last
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point2;
    use proptest::prelude::*;

    use super::{CellStatus, ClassificationTable};
    use crate::{accel::convex::edges::half_planes, tunnel::arch_cross_section};

    fn diamond() -> Vec<Point2<f32>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 4.0),
            Point2::new(-2.0, 2.0),
        ]
    }

    #[test]
    fn diamond_cells() {
        let polygon = diamond();
        let planes = half_planes(&polygon);
        let table = ClassificationTable::build(&polygon, &planes, 9);

        assert_eq!(table.status(4, 4), CellStatus::Hit);
        assert_eq!(table.status(0, 8), CellStatus::Miss);
        assert!(matches!(table.status(6, 2), CellStatus::Partial { .. }));

        // The bottom tip is inside cell (4, 0) but no corner of it is.
        assert!(matches!(table.status(4, 0), CellStatus::Partial { .. }));

        assert!(table.contains(&planes, &Point2::new(0.0, 2.0)));
        assert!(table.contains(&planes, &Point2::new(1.0, 1.2)));
        assert!(!table.contains(&planes, &Point2::new(1.5, 0.5)));
        assert!(!table.contains(&planes, &Point2::new(30.0, 30.0)));
    }

    #[test]
    fn partial_ranges_are_narrow() {
        let polygon = arch_cross_section(50.0, 25.0, 25.0, 150);
        let planes = half_planes(&polygon);
        let table = ClassificationTable::build(&polygon, &planes, 100);

        // Somewhere on the arch, far from the first and last edges.
        let top = table.lookup(&Point2::new(0.0, 50.0));
        let CellStatus::Partial { first, last } = top else {
            panic!("top of the arch should straddle the wall, got {top:?}");
        };
        assert!(first > 0 && last < polygon.len() as u32 - 1);
        assert!(last - first < 10);
    }

    proptest! {
        #[test]
        fn consistent_with_half_planes(width in 1.0..60.0f32, rect in 0.5..30.0f32, arch in 0.5..30.0f32, segments in 2..40u32, size in 4..64usize) {
            let polygon = arch_cross_section(width, rect, arch, segments);
            let planes = half_planes(&polygon);
            let table = ClassificationTable::build(&polygon, &planes, size);

            for x in 0..table.size() {
                for y in 0..table.size() {
                    let corners = table.corners(x, y);
                    let passing = corners
                        .iter()
                        .filter(|c| planes.iter().all(|p| p.passes(c)))
                        .count();
                    match table.status(x, y) {
                        CellStatus::Hit => prop_assert_eq!(passing, 4),
                        CellStatus::Miss => prop_assert_eq!(passing, 0),
                        CellStatus::Partial { first, last } => {
                            prop_assert!(first <= last);
                            prop_assert!((last as usize) < polygon.len());
                        }
                    }
                }
            }
        }
    }
}
