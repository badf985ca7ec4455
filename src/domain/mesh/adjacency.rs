use super::cell::{face_dim, opposite_face, Cell};

use log::{debug, info, warn};
use smallvec::{smallvec, SmallVec};

/// Factor applied to every coordinate while neighbors are resolved
pub const TWEAK_SCALE: i64 = 8;
/// Distance by which faces are pushed or pulled (in scaled coordinates)
pub const TWEAK_DELTA: i64 = 2;

/// Neighbor slots of one Cell: one entry per face
pub type NeighborSlots = SmallVec<[Option<usize>; 4]>;

/// How strictly two touching Cells must line up to be considered neighbors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Matching {
    /// along every other dimension, one Cell fully covers the other
    Exact,
    /// along every other dimension, the Cells share some positive extent
    Relaxed,
}

/// A scoped perturbation of a collection of Cells.
///
/// On construction, every Cell (and the extent) is checkpointed, scaled by [TWEAK_SCALE] and
/// pumped/squeezed by [TWEAK_DELTA]: degenerate dimensions grow into thin strips while solid
/// dimensions shrink away from them. The faces of solid dimensions are then pushed back out one
/// at a time, unless doing so would overlap another Cell. In the resulting geometry, edges and
/// vertices occupy real space between the solid Cells they separate, so coordinate equality
/// between faces is an unambiguous touching test.
///
/// The original bounds are restored when the guard is dropped (including during unwinding).
pub struct BoundsTweak<'c> {
    cells: &'c mut [Cell],
    extent: &'c mut Cell,
}

impl<'c> BoundsTweak<'c> {
    pub fn apply(cells: &'c mut [Cell], extent: &'c mut Cell) -> Self {
        let mut tweak = Self { cells, extent };
        tweak.perturb();
        tweak
    }

    pub fn cells(&self) -> &[Cell] {
        &*self.cells
    }

    pub fn extent(&self) -> &Cell {
        &*self.extent
    }

    /// Does `face` of Cell `cell_id` lie on the boundary of the extent (judged on the unperturbed bounds)
    pub fn on_outer_boundary(&self, cell_id: usize, face: usize) -> bool {
        let dim = face_dim(face);
        match (
            self.cells[cell_id].backed_up_bounds(),
            self.extent.backed_up_bounds(),
        ) {
            (Some(bounds), Some(extent)) => {
                bounds[face] == extent[2 * dim] || bounds[face] == extent[2 * dim + 1]
            }
            _ => panic!("Cannot judge boundary faces of Cells that were not perturbed!"),
        }
    }

    fn perturb(&mut self) {
        for cell in self.cells.iter_mut() {
            cell.back_up_bounds();
            cell.scale(TWEAK_SCALE);
            cell.pump_or_squeeze(TWEAK_DELTA);
        }
        self.extent.back_up_bounds();
        self.extent.scale(TWEAK_SCALE);

        // try to undo the squeeze one face at a time
        for cell_id in 0..self.cells.len() {
            for face in 0..self.cells[cell_id].face_count() {
                if was_degenerate(&self.cells[cell_id], face_dim(face)) {
                    continue;
                }

                self.cells[cell_id].spread(face, TWEAK_DELTA);
                if overlaps_with_any_other(self.cells(), cell_id) {
                    self.cells[cell_id].spread(face, -TWEAK_DELTA);
                }
            }
        }

        self.extent.spread_all(TWEAK_DELTA);
    }
}

impl Drop for BoundsTweak<'_> {
    fn drop(&mut self) {
        for cell in self.cells.iter_mut().filter(|cell| cell.has_backup()) {
            cell.restore_bounds();
        }
        if self.extent.has_backup() {
            self.extent.restore_bounds();
        }
    }
}

fn was_degenerate(cell: &Cell, dim: usize) -> bool {
    match cell.backed_up_bounds() {
        Some(bounds) => bounds[2 * dim] == bounds[2 * dim + 1],
        None => cell.is_degenerate(dim),
    }
}

/// Does Cell `cell_id` overlap any other Cell in the collection
pub fn overlaps_with_any_other(cells: &[Cell], cell_id: usize) -> bool {
    let that = &cells[cell_id];
    cells
        .iter()
        .enumerate()
        .any(|(other_id, other)| other_id != cell_id && that.overlaps(other))
}

/// Is `other` a neighbor of `that` across `face`
pub fn cells_are_adjacent(that: &Cell, other: &Cell, face: usize, matching: Matching) -> bool {
    if that.bound(face) != other.bound(opposite_face(face)) {
        return false;
    }

    let given_dim = face_dim(face);
    (0..that.dim_count())
        .filter(|dim| *dim != given_dim)
        .all(|dim| {
            let overlap = that.overlapping_extent(other, dim);
            match matching {
                Matching::Exact => overlap == that.size(dim) || overlap == other.size(dim),
                Matching::Relaxed => overlap != 0,
            }
        })
}

/// Resolve the neighbor across every face of every Cell.
///
/// The Cells are perturbed for the duration of the search (see [BoundsTweak]) and restored before returning.
/// Exact matching runs over the whole collection first; faces that are still unresolved and do not lie on the
/// boundary of `extent` then fall back to relaxed matching. If several Cells match a face, the last one in
/// collection order is kept.
pub fn compute_all_neighbors(cells: &mut [Cell], extent: &mut Cell) -> Vec<NeighborSlots> {
    let tweak = BoundsTweak::apply(cells, extent);
    let neighbors = resolve_neighbors(&tweak);
    drop(tweak);

    info!(
        "Resolved {} neighbor relations between {} Cells",
        neighbors
            .iter()
            .map(|slots| slots.iter().flatten().count())
            .sum::<usize>(),
        neighbors.len()
    );

    neighbors
}

fn resolve_neighbors(tweak: &BoundsTweak) -> Vec<NeighborSlots> {
    let cells = tweak.cells();
    let mut neighbors: Vec<NeighborSlots> = cells
        .iter()
        .map(|cell| smallvec![None; cell.face_count()])
        .collect();

    for (that_id, that) in cells.iter().enumerate() {
        for (other_id, other) in cells.iter().enumerate() {
            if other_id == that_id {
                continue;
            }
            for face in 0..that.face_count() {
                if cells_are_adjacent(that, other, face, Matching::Exact) {
                    neighbors[that_id][face] = Some(other_id);
                }
            }
        }
    }

    for (that_id, that) in cells.iter().enumerate() {
        for face in 0..that.face_count() {
            if neighbors[that_id][face].is_some() || tweak.on_outer_boundary(that_id, face) {
                continue;
            }

            let candidates: SmallVec<[usize; 4]> = cells
                .iter()
                .enumerate()
                .filter(|(other_id, other)| {
                    *other_id != that_id && cells_are_adjacent(that, other, face, Matching::Relaxed)
                })
                .map(|(other_id, _)| other_id)
                .collect();

            if candidates.len() > 1 {
                warn!(
                    "Face {} of Cell {} has {} relaxed neighbor candidates {:?}; keeping the last",
                    face,
                    that_id,
                    candidates.len(),
                    candidates
                );
            }
            if let Some(&other_id) = candidates.last() {
                debug!(
                    "Relaxed neighbor of Cell {} across face {}: Cell {}",
                    that_id, face, other_id
                );
                neighbors[that_id][face] = Some(other_id);
            }
        }
    }

    neighbors
}

/// Perturbed copies of `cells` and `extent` (as seen during neighbor resolution)
pub fn tweaked_copy(mut cells: Vec<Cell>, mut extent: Cell) -> (Vec<Cell>, Cell) {
    let tweak = BoundsTweak::apply(&mut cells, &mut extent);
    let tweaked_cells = tweak
        .cells()
        .iter()
        .map(|cell| Cell::from_bounds(cell.bounds()))
        .collect();
    let tweaked_extent = Cell::from_bounds(tweak.extent().bounds());

    (tweaked_cells, tweaked_extent)
}
