use super::Grid;
use crate::geometry::Ray;

/// Direction components smaller than this never reach the next cell on that
/// axis.
const PARALLEL_EPSILON: f32 = 1e-10;

/// One cell visited by a [`Walk`], with the distances along the ray where
/// the ray enters and leaves it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellVisit {
    pub cell: [usize; 3],
    pub entry: f32,
    pub exit: f32,
}

/// 3D DDA through a grid. Each step moves to the neighboring cell across
/// whichever cell boundary the ray reaches first, so a walk visits at most
/// `nx + ny + nz` cells.
pub struct Walk<'a> {
    grid: &'a Grid,
    ray: Ray,
    cell: [usize; 3],
    distance: f32,
    done: bool,
}

impl<'a> Walk<'a> {
    pub(super) fn new(grid: &'a Grid, ray: &Ray) -> Self {
        // Rays starting outside the grid begin where they enter it.
        let start = if grid.bounds().contains(&ray.origin) {
            Some(0.0)
        } else {
            grid.bounds().intersect_ray(ray).map(|(entry, _)| entry)
        };

        Self {
            grid,
            ray: *ray,
            cell: start.map_or([0; 3], |x| grid.cell_of(&ray.at(x))),
            distance: start.unwrap_or_default(),
            done: start.is_none(),
        }
    }

    /// Distance along the ray to the far boundary of the current cell on
    /// `axis`, or infinity if the ray never gets there.
    fn boundary(&self, axis: usize) -> f32 {
        let direction = self.ray.direction[axis];
        if direction.abs() <= PARALLEL_EPSILON {
            return f32::INFINITY;
        }

        let side = if direction > 0.0 { 1.0 } else { 0.0 };
        let plane = self.grid.origin()[axis]
            + (self.cell[axis] as f32 + side) * self.grid.cell_size()[axis];
        (plane - self.ray.origin[axis]) / direction
    }
}

impl Iterator for Walk<'_> {
    type Item = CellVisit;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let (axis, exit) = (0..3)
            .map(|axis| (axis, self.boundary(axis)))
            .fold((0, f32::INFINITY), |a, b| if b.1 < a.1 { b } else { a });

        let visit = CellVisit {
            cell: self.cell,
            entry: self.distance,
            exit: exit.max(self.distance),
        };

        // Step across the nearest boundary, stopping once the index leaves
        // the grid.
        let stepped = if !exit.is_finite() {
            None
        } else if self.ray.direction[axis] > 0.0 {
            Some(self.cell[axis] + 1).filter(|&x| x < self.grid.dimensions()[axis])
        } else {
            self.cell[axis].checked_sub(1)
        };

        match stepped {
            Some(index) => {
                self.cell[axis] = index;
                self.distance = visit.exit;
            }
            None => self.done = true,
        }

        Some(visit)
    }
}
