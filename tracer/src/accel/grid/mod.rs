use anyhow::{bail, Result};
use common::{
    config::{GridInsertion, IndexConfig},
    progress::Progress,
};
use rayon::prelude::*;

use crate::{
    geometry::{BoundingBox, Hit, Point, Ray, Vector},
    scene::Scene,
};

mod walk;
pub use walk::{CellVisit, Walk};

/// A hit inside a cell only ends the walk if it lies no further than this
/// past the cell's far boundary. Primitives spanning several cells can be
/// hit beyond the current cell and a closer one may still be waiting in the
/// next cell.
const CELL_EPSILON: f32 = 1e-3;

/// How cell sizes are derived from the scene bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridPolicy {
    /// One cell size on all axes, from the longest side of the bounds.
    Cubical,
    /// The same number of cells on every axis.
    PerAxis,
}

/// Uniform grid. Each cell lists every primitive assigned to it, so a
/// primitive may appear in many cells.
///
/// Cells are stored compressed: the primitives of cell `c` are
/// `items[offsets[c]..offsets[c + 1]]`, with cell `(x, y, z)` at
/// `(x * ny + y) * nz + z`.
pub struct Grid {
    scene: Scene,
    bounds: BoundingBox,
    origin: Point,
    cell_size: Vector,
    dimensions: [usize; 3],

    offsets: Box<[u32]>,
    items: Box<[u32]>,
    unbounded: Box<[u32]>,
}

#[derive(Debug, Clone, Copy)]
pub struct GridStats {
    pub dimensions: [usize; 3],
    pub occupied: usize,
    pub references: usize,
}

impl Grid {
    pub fn build(
        scene: Scene,
        policy: GridPolicy,
        config: &IndexConfig,
        progress: &Progress,
    ) -> Result<Self> {
        let scene_bounds = scene.bounds();
        let (origin, cell_size, dimensions) = if scene_bounds.is_empty() {
            (Point::origin(), Vector::repeat(1.0), [1, 1, 1])
        } else {
            layout(&scene_bounds, policy, config.grid_resolution as usize)
        };

        let bounds = if scene_bounds.is_empty() {
            BoundingBox::empty()
        } else {
            let size = Vector::from(dimensions.map(|x| x as f32));
            BoundingBox::new(origin, origin + cell_size.component_mul(&size))
        };

        let mut grid = Self {
            bounds,
            scene,
            origin,
            cell_size,
            dimensions,
            offsets: Box::new([]),
            items: Box::new([]),
            unbounded: Box::new([]),
        };

        let bounded = grid.scene.bounded();
        progress.start_stage("grid insert", bounded.len() as u64);

        // Cell lists for each primitive are independent, so they are
        // found in parallel and scattered into place afterwards.
        let cells = bounded
            .par_iter()
            .map(|&primitive| {
                let out = grid.cells_for(primitive, config.grid_insertion);
                progress.add_complete(1);
                out
            })
            .collect::<Vec<_>>();

        let total = cells.iter().map(|x| x.len() as u64).sum::<u64>();
        let cell_count = dimensions.iter().product::<usize>();
        if total > u32::MAX as u64 || cell_count >= u32::MAX as usize {
            bail!("Grid too large: {cell_count} cells with {total} references");
        }

        let mut offsets = vec![0_u32; cell_count + 1];
        for &cell in cells.iter().flatten() {
            offsets[cell as usize + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        // Uses each start offset as a cursor, which leaves offsets[c] at the
        // start of c + 1. Shifting by one restores the starts.
        let mut items = vec![0_u32; total as usize];
        for (&primitive, cells) in bounded.iter().zip(&cells) {
            for &cell in cells {
                items[offsets[cell as usize] as usize] = primitive;
                offsets[cell as usize] += 1;
            }
        }
        offsets.copy_within(0..cell_count, 1);
        offsets[0] = 0;

        grid.offsets = offsets.into_boxed_slice();
        grid.items = items.into_boxed_slice();
        grid.unbounded = grid.scene.unbounded().into();
        progress.set_finished();

        Ok(grid)
    }

    pub fn intersect(&self, ray: &Ray) -> Option<Hit<'_>> {
        let mut best = None;
        for visit in self.walk(ray) {
            for &primitive in self.cell(visit.cell) {
                best = Hit::closest(best, self.scene.get(primitive).intersect(ray));
            }

            if best.is_some_and(|hit: Hit| hit.distance <= visit.exit + CELL_EPSILON) {
                break;
            }
        }

        Hit::closest(best, self.scene.intersect_subset(&self.unbounded, ray))
    }

    /// Cells the ray passes through, in order.
    pub fn walk(&self, ray: &Ray) -> Walk<'_> {
        Walk::new(self, ray)
    }

    pub fn cell(&self, [x, y, z]: [usize; 3]) -> &[u32] {
        let [_, ny, nz] = self.dimensions;
        let idx = (x * ny + y) * nz + z;
        match (self.offsets.get(idx), self.offsets.get(idx + 1)) {
            (Some(&start), Some(&end)) => &self.items[start as usize..end as usize],
            _ => &[],
        }
    }

    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn cell_size(&self) -> Vector {
        self.cell_size
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn stats(&self) -> GridStats {
        GridStats {
            dimensions: self.dimensions,
            occupied: self.offsets.windows(2).filter(|x| x[1] > x[0]).count(),
            references: self.items.len(),
        }
    }

    /// Index of the cell containing `point`, clamped into the grid.
    pub fn cell_of(&self, point: &Point) -> [usize; 3] {
        [0, 1, 2].map(|axis| {
            let cell = ((point[axis] - self.origin[axis]) / self.cell_size[axis]).floor();
            (cell.max(0.0) as usize).min(self.dimensions[axis] - 1)
        })
    }

    pub(super) fn origin(&self) -> Point {
        self.origin
    }

    fn cell_bounds(&self, cell: [usize; 3]) -> BoundingBox {
        let min = self.origin
            + Vector::from(cell.map(|x| x as f32)).component_mul(&self.cell_size);
        BoundingBox::new(min, min + self.cell_size)
    }

    fn flat_index(&self, [x, y, z]: [usize; 3]) -> u32 {
        let [_, ny, nz] = self.dimensions;
        ((x * ny + y) * nz + z) as u32
    }

    fn cells_for(&self, primitive: u32, insertion: GridInsertion) -> Vec<u32> {
        let primitive = self.scene.get(primitive);
        let Some(bounds) = primitive.bounds() else {
            return Vec::new();
        };

        let (lo, hi) = (self.cell_of(&bounds.min), self.cell_of(&bounds.max));
        let mut out = Vec::new();
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    let cell = [x, y, z];
                    if insertion == GridInsertion::Clipped
                        && !primitive.overlaps_box(&self.cell_bounds(cell))
                    {
                        continue;
                    }
                    out.push(self.flat_index(cell));
                }
            }
        }

        out
    }
}

/// Grid origin, cell size and dimensions for the given scene bounds. The
/// grid is padded by half a cell on every side.
fn layout(bounds: &BoundingBox, policy: GridPolicy, resolution: usize) -> (Point, Vector, [usize; 3]) {
    let extent = bounds.extent();
    let divisions = resolution.max(2) as f32 - 1.0;

    let (cell_size, dimensions) = match policy {
        GridPolicy::Cubical => {
            let size = positive_or(extent.max() / divisions, 1.0);
            let dimensions = [0, 1, 2].map(|axis| ((extent[axis] / size + 1.5) as usize).max(1));
            (Vector::repeat(size), dimensions)
        }
        GridPolicy::PerAxis => {
            let fallback = positive_or(extent.max() / divisions, 1.0);
            let mut size = Vector::zeros();
            let mut dimensions = [resolution; 3];
            for axis in 0..3 {
                size[axis] = extent[axis] / divisions;
                if size[axis] <= f32::EPSILON * extent.max().max(1.0) {
                    size[axis] = fallback;
                    dimensions[axis] = 1;
                }
            }
            (size, dimensions)
        }
    };

    (bounds.min - cell_size / 2.0, cell_size, dimensions)
}

fn positive_or(value: f32, fallback: f32) -> f32 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        fallback
    }
}
