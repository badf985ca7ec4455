use super::cell::{Cell, Coord, X_DIM, Y_DIM};
use super::Mesh;

use log::debug;
use smallvec::SmallVec;

/// Pattern used to subdivide a solid Cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subdivision {
    /// halves along x, then halves along y (2x2 children)
    Quad,
    /// thirds along x, then halves along y (3x2 children)
    Hex,
}

impl Subdivision {
    /// Children of `cell`, ordered column by column
    pub fn apply(&self, cell: &Cell) -> SmallVec<[Cell; 6]> {
        let columns: SmallVec<[Cell; 3]> = match self {
            Self::Quad => cell.split_halves(X_DIM).into_iter().collect(),
            Self::Hex => cell.split_thirds(X_DIM).into_iter().collect(),
        };

        columns
            .iter()
            .flat_map(|column| column.split_halves(Y_DIM))
            .collect()
    }
}

impl Mesh {
    /// Subdivide every solid Cell contained in `scope`. All other Cells are kept as they are.
    pub fn split_within(&mut self, scope: &Cell, subdivision: Subdivision) {
        let before = self.len();
        self.rewrite(|cell, new_cells| {
            if cell.non_empty() && cell.contained_in(scope) {
                new_cells.extend(subdivision.apply(&cell));
            } else {
                new_cells.push(cell);
            }
        });
        debug!(
            "{:?} split within [{}]: {} -> {} Cells",
            subdivision,
            scope,
            before,
            self.len()
        );
    }

    pub fn split_all_into_4(&mut self, scope: &Cell) {
        self.split_within(scope, Subdivision::Quad);
    }

    pub fn split_all_into_6(&mut self, scope: &Cell) {
        self.split_within(scope, Subdivision::Hex);
    }

    pub fn split_all_elements_into_4(&mut self) {
        let root = self.root().clone();
        self.split_within(&root, Subdivision::Quad);
    }

    pub fn split_all_elements_into_6(&mut self) {
        let root = self.root().clone();
        self.split_within(&root, Subdivision::Hex);
    }

    /// Refine the ring of solid Cells that touch the midlines of `scope`.
    ///
    /// A Cell touching the horizontal midline (but not the vertical one) is bisected along y; a Cell touching the
    /// vertical midline (but not the horizontal one) is bisected along x. Cells touching both midlines are kept whole.
    /// Comparisons against the midlines are exact.
    pub fn split_eight_sides(&mut self, scope: &Cell) {
        let mid_x = scope.middle(X_DIM);
        let mid_y = scope.middle(Y_DIM);
        let before = self.len();

        self.rewrite(|cell, new_cells| {
            if cell.non_empty() && cell.contained_in(scope) && !is_middle(&cell, mid_x, mid_y) {
                if is_horizontal_side(&cell, mid_y) {
                    new_cells.extend(cell.split_halves(Y_DIM));
                } else if is_vertical_side(&cell, mid_x) {
                    new_cells.extend(cell.split_halves(X_DIM));
                } else {
                    new_cells.push(cell);
                }
            } else {
                new_cells.push(cell);
            }
        });

        debug!(
            "Eight-side split within [{}]: {} -> {} Cells",
            scope,
            before,
            self.len()
        );
    }

    /// Insert `count` edges spanning `region` along `dim`, fixed at `coord` in the other dimension.
    ///
    /// With `eight_sided`, the two middle segments are bisected and a vertex is placed at each of their midpoints.
    pub fn add_edge(&mut self, dim: usize, region: &Cell, coord: Coord, count: usize, eight_sided: bool) {
        assert!(count > 0, "Cannot add an edge made of zero segments!");

        let from = region.from(dim);
        let segment_size = region.size(dim) / count as Coord;

        for i in 0..count {
            let segment_from = from + segment_size * i as Coord;
            let segment_to = segment_from + segment_size;

            if eight_sided && (i == count / 2 || i + 1 == count / 2) {
                let mid = (segment_from + segment_to).div_euclid(2);
                self.push(edge_segment(dim, segment_from, mid, coord));
                self.push(edge_segment(dim, mid, segment_to, coord));
                if dim == X_DIM {
                    self.add_vertex(mid, coord);
                } else {
                    self.add_vertex(coord, mid);
                }
            } else {
                self.push(edge_segment(dim, segment_from, segment_to, coord));
            }
        }

        debug!(
            "Added a {}-segment edge along dim {} at {} over [{}]",
            count, dim, coord, region
        );
    }

    /// Insert a vertex at each of the four corners of `region`
    pub fn add_corner_vertices(&mut self, region: &Cell) {
        self.add_vertex(region.left(), region.up());
        self.add_vertex(region.left(), region.down());
        self.add_vertex(region.right(), region.up());
        self.add_vertex(region.right(), region.down());
    }

    pub fn add_vertex(&mut self, x: Coord, y: Coord) {
        self.push(Cell::vertex(x, y));
    }

    /// Drop every Cell that is not contained in `region`, which becomes the new extent of the Mesh
    pub fn remove_not_contained_in(&mut self, region: &Cell) {
        let before = self.len();
        self.rewrite(|cell, new_cells| {
            if cell.contained_in(region) {
                new_cells.push(cell);
            }
        });
        self.set_extent(region.clone());

        debug!(
            "Trimmed Mesh to [{}]: {} -> {} Cells",
            region,
            before,
            self.len()
        );
    }
}

fn edge_segment(dim: usize, from: Coord, to: Coord, coord: Coord) -> Cell {
    let mut segment = Cell::new(2);
    segment.set_bounds(dim, from, to);
    segment.set_bounds(dim ^ 1, coord, coord);
    segment
}

fn is_middle(cell: &Cell, mid_x: Coord, mid_y: Coord) -> bool {
    is_vertical_side(cell, mid_x) && is_horizontal_side(cell, mid_y)
}

fn is_horizontal_side(cell: &Cell, mid_y: Coord) -> bool {
    cell.up() == mid_y || cell.down() == mid_y
}

fn is_vertical_side(cell: &Cell, mid_x: Coord) -> bool {
    cell.left() == mid_x || cell.right() == mid_x
}
