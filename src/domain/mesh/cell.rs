use smallvec::SmallVec;
use std::fmt;

/// Integer coordinate used for every bound in the mesh
pub type Coord = i64;

/// Index of the horizontal dimension
pub const X_DIM: usize = 0;
/// Index of the vertical dimension
pub const Y_DIM: usize = 1;

/// Face indices of a 2D `Cell`
///
/// Face `2 * dim` is the lower ("from") bound of `dim`, face `2 * dim + 1` is its upper ("to") bound:
/// ```text
///               UP (2)
///          +-------------+
///          |             |
///  LEFT (0)|             |RIGHT (1)
///          |             |
///          +-------------+
///              DOWN (3)
/// ```
pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;
pub const UP: usize = 2;
pub const DOWN: usize = 3;

/// Dimension that a face bounds
pub const fn face_dim(face: usize) -> usize {
    face >> 1
}

/// The face on the other side of the same dimension
pub const fn opposite_face(face: usize) -> usize {
    face ^ 1
}

/// Is this a lower ("from") face
pub const fn is_from_face(face: usize) -> bool {
    face % 2 == 0
}

type Bounds = SmallVec<[Coord; 4]>;

/// An axis-aligned box with an arbitrary number of dimensions.
///
/// A `Cell` with zero extent in some dimension is degenerate: 2D meshes use those to represent
/// edges (one zero extent) and vertices (zero extent in both dimensions) alongside the solid elements.
#[derive(Debug, Clone)]
pub struct Cell {
    bounds: Bounds,
    backup: Option<Bounds>,
}

impl Cell {
    /// A cell with all bounds at the origin
    pub fn new(dims: usize) -> Self {
        assert!(dims > 0, "Cells must have at least one dimension!");
        Self {
            bounds: SmallVec::from_elem(0, dims * 2),
            backup: None,
        }
    }

    /// A 2D cell spanning `[left, right] x [up, down]`
    pub fn new_2d(left: Coord, right: Coord, up: Coord, down: Coord) -> Self {
        Self::from_bounds(&[left, right, up, down])
    }

    /// A 2D point-like cell
    pub fn vertex(x: Coord, y: Coord) -> Self {
        Self::new_2d(x, x, y, y)
    }

    /// Build a cell from a list of `[from_0, to_0, from_1, to_1, ...]` bounds
    pub fn from_bounds(bounds: &[Coord]) -> Self {
        assert!(
            !bounds.is_empty() && bounds.len() % 2 == 0,
            "Cell bounds must come in (from, to) pairs; got {} values!",
            bounds.len()
        );
        for dim in 0..bounds.len() / 2 {
            assert!(
                bounds[2 * dim] <= bounds[2 * dim + 1],
                "Cell bound 'from' must not exceed 'to' (dim {}: {} > {})!",
                dim,
                bounds[2 * dim],
                bounds[2 * dim + 1]
            );
        }

        Self {
            bounds: SmallVec::from_slice(bounds),
            backup: None,
        }
    }

    pub fn dim_count(&self) -> usize {
        self.bounds.len() / 2
    }

    pub fn face_count(&self) -> usize {
        self.bounds.len()
    }

    pub fn bounds(&self) -> &[Coord] {
        &self.bounds
    }

    #[inline]
    pub fn from(&self, dim: usize) -> Coord {
        self.bounds[2 * dim]
    }

    #[inline]
    pub fn to(&self, dim: usize) -> Coord {
        self.bounds[2 * dim + 1]
    }

    #[inline]
    pub fn bound(&self, face: usize) -> Coord {
        self.bounds[face]
    }

    pub fn left(&self) -> Coord {
        self.bounds[LEFT]
    }

    pub fn right(&self) -> Coord {
        self.bounds[RIGHT]
    }

    pub fn up(&self) -> Coord {
        self.bounds[UP]
    }

    pub fn down(&self) -> Coord {
        self.bounds[DOWN]
    }

    pub fn set_bounds(&mut self, dim: usize, from: Coord, to: Coord) {
        assert!(
            from <= to,
            "Cannot set bounds of dim {} to [{}, {}]; 'from' exceeds 'to'!",
            dim,
            from,
            to
        );
        self.bounds[2 * dim] = from;
        self.bounds[2 * dim + 1] = to;
    }

    pub fn size(&self, dim: usize) -> Coord {
        self.to(dim) - self.from(dim)
    }

    /// Midpoint of a dimension (rounded towards negative infinity)
    pub fn middle(&self, dim: usize) -> Coord {
        (self.from(dim) + self.to(dim)).div_euclid(2)
    }

    pub fn is_degenerate(&self, dim: usize) -> bool {
        self.size(dim) == 0
    }

    /// Zero extent in every dimension
    pub fn is_point(&self) -> bool {
        (0..self.dim_count()).all(|dim| self.is_degenerate(dim))
    }

    /// A true solid cell: nonzero extent in every dimension
    pub fn non_empty(&self) -> bool {
        (0..self.dim_count()).all(|dim| !self.is_degenerate(dim))
    }

    /// Is every interval of this cell within the corresponding interval of `outer` (non-strict)
    pub fn contained_in(&self, outer: &Cell) -> bool {
        debug_assert_eq!(self.dim_count(), outer.dim_count());
        (0..self.dim_count())
            .all(|dim| outer.from(dim) <= self.from(dim) && self.to(dim) <= outer.to(dim))
    }

    /// Do the two cells share a region of positive measure
    ///
    /// Touching cells (sharing only a boundary) do not overlap
    pub fn overlaps(&self, other: &Cell) -> bool {
        debug_assert_eq!(self.dim_count(), other.dim_count());
        (0..self.dim_count()).all(|dim| self.overlapping_extent(other, dim) > 0)
    }

    /// Length of the intersection of both cells' intervals in `dim` (zero if disjoint)
    pub fn overlapping_extent(&self, other: &Cell, dim: usize) -> Coord {
        let from = self.from(dim).max(other.from(dim));
        let to = self.to(dim).min(other.to(dim));
        (to - from).max(0)
    }

    /// Split into two cells along `dim` at `coord`
    ///
    /// Both halves must have positive extent in `dim`
    pub fn split(&self, dim: usize, coord: Coord) -> [Cell; 2] {
        assert!(
            self.from(dim) < coord && coord < self.to(dim),
            "Cannot split Cell [{}] along dim {} at {}; both parts must have positive extent!",
            self,
            dim,
            coord
        );

        let mut first = self.geometry();
        let mut second = self.geometry();
        first.set_bounds(dim, self.from(dim), coord);
        second.set_bounds(dim, coord, self.to(dim));

        [first, second]
    }

    pub fn split_halves(&self, dim: usize) -> [Cell; 2] {
        self.split(dim, self.middle(dim))
    }

    /// Split into three parts along `dim` at the 1/3 and 2/3 points
    pub fn split_thirds(&self, dim: usize) -> [Cell; 3] {
        let from = self.from(dim);
        let size = self.size(dim);
        let [first, rest] = self.split(dim, from + size / 3);
        let [second, third] = rest.split(dim, from + 2 * size / 3);

        [first, second, third]
    }

    /// Multiply every bound by `factor`
    pub fn scale(&mut self, factor: Coord) {
        for bound in self.bounds.iter_mut() {
            *bound *= factor;
        }
    }

    /// Move one face outwards by `delta` (inwards for negative `delta`)
    pub fn spread(&mut self, face: usize, delta: Coord) {
        if is_from_face(face) {
            self.bounds[face] -= delta;
        } else {
            self.bounds[face] += delta;
        }
    }

    /// Move every face outwards by `delta`
    pub fn spread_all(&mut self, delta: Coord) {
        for face in 0..self.face_count() {
            self.spread(face, delta);
        }
    }

    /// A copy with every face moved inwards by `offset`
    pub fn shrunk(&self, offset: Coord) -> Cell {
        let mut inner = self.clone();
        inner.spread_all(-offset);
        inner
    }

    /// Push degenerate dimensions outwards and pull solid dimensions inwards by `delta`
    pub fn pump_or_squeeze(&mut self, delta: Coord) {
        for dim in 0..self.dim_count() {
            let shift = if self.is_degenerate(dim) { delta } else { -delta };
            self.spread(2 * dim, shift);
            self.spread(2 * dim + 1, shift);
        }
    }

    /// Checkpoint the current bounds so they can be restored once by [Cell::restore_bounds]
    pub fn back_up_bounds(&mut self) {
        assert!(
            self.backup.is_none(),
            "Bounds of Cell [{}] have already been backed up!",
            self
        );
        self.backup = Some(self.bounds.clone());
    }

    /// Restore the bounds saved by the last [Cell::back_up_bounds]
    pub fn restore_bounds(&mut self) {
        match self.backup.take() {
            Some(bounds) => self.bounds = bounds,
            None => panic!("Cell [{}] has no backed up bounds to restore!", self),
        }
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    /// The bounds saved by the last [Cell::back_up_bounds] (if any)
    pub fn backed_up_bounds(&self) -> Option<&[Coord]> {
        self.backup.as_deref()
    }

    // copy of the bounds without any checkpoint
    fn geometry(&self) -> Self {
        Self {
            bounds: self.bounds.clone(),
            backup: None,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.bounds == other.bounds
    }
}

impl Eq for Cell {}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, bound) in self.bounds.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", bound)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(cell: &Cell) -> Coord {
        cell.size(X_DIM) * cell.size(Y_DIM)
    }

    fn assert_partition(parent: &Cell, children: &[Cell]) {
        assert_eq!(children.iter().map(area).sum::<Coord>(), area(parent));
        for (i, a) in children.iter().enumerate() {
            assert!(a.contained_in(parent));
            for b in children.iter().skip(i + 1) {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn split_conserves_area() {
        let cell = Cell::new_2d(0, 12, 4, 10);

        assert_partition(&cell, &cell.split(X_DIM, 5));
        assert_partition(&cell, &cell.split_halves(Y_DIM));
        assert_partition(&cell, &cell.split_thirds(X_DIM));

        let [first, second, third] = cell.split_thirds(X_DIM);
        assert_eq!(first, Cell::new_2d(0, 4, 4, 10));
        assert_eq!(second, Cell::new_2d(4, 8, 4, 10));
        assert_eq!(third, Cell::new_2d(8, 12, 4, 10));
    }

    #[test]
    #[should_panic]
    fn zero_extent_split() {
        Cell::new_2d(0, 4, 0, 4).split(X_DIM, 4);
    }

    #[test]
    #[should_panic]
    fn inverted_bounds() {
        Cell::new_2d(4, 0, 0, 4);
    }

    #[test]
    fn containment() {
        let a = Cell::new_2d(2, 4, 2, 4);
        let b = Cell::new_2d(0, 4, 0, 8);
        let c = Cell::new_2d(0, 16, 0, 16);

        assert!(a.contained_in(&a));
        assert!(a.contained_in(&b) && b.contained_in(&c) && a.contained_in(&c));
        assert!(!c.contained_in(&b));
        assert!(Cell::vertex(4, 4).contained_in(&a));
    }

    #[test]
    fn overlap_is_strict() {
        let a = Cell::new_2d(0, 1, 0, 1);
        let b = Cell::new_2d(1, 2, 0, 1);
        let c = Cell::new_2d(0, 2, 0, 2);

        assert!(!a.overlaps(&b) && !b.overlaps(&a));
        assert!(a.overlaps(&c) && c.overlaps(&a));
        assert!(a.overlaps(&a));

        let edge = Cell::new_2d(0, 2, 1, 1);
        assert!(!edge.overlaps(&edge));
        assert!(!edge.overlaps(&c) && !c.overlaps(&edge));
        assert!(!Cell::vertex(1, 1).overlaps(&Cell::vertex(1, 1)));
    }

    #[test]
    fn overlapping_extent() {
        let a = Cell::new_2d(0, 4, 0, 4);
        let b = Cell::new_2d(2, 8, 4, 6);

        assert_eq!(a.overlapping_extent(&b, X_DIM), 2);
        assert_eq!(a.overlapping_extent(&b, Y_DIM), 0);
        assert_eq!(a.overlapping_extent(&Cell::new_2d(6, 8, 0, 4), X_DIM), 0);
    }

    #[test]
    fn pump_squeeze_and_restore() {
        let mut edge = Cell::new_2d(0, 8, 4, 4);
        edge.back_up_bounds();
        edge.scale(8);
        edge.pump_or_squeeze(2);

        assert_eq!(edge.bounds(), &[2, 62, 30, 34]);

        edge.spread(LEFT, 2);
        assert_eq!(edge.left(), 0);
        edge.spread_all(-1);
        assert_eq!(edge.bounds(), &[1, 61, 31, 33]);

        edge.restore_bounds();
        assert_eq!(edge, Cell::new_2d(0, 8, 4, 4));
        assert!(!edge.has_backup());
    }

    #[test]
    #[should_panic]
    fn restore_without_backup() {
        Cell::new_2d(0, 1, 0, 1).restore_bounds();
    }

    #[test]
    fn degenerate_classification() {
        assert!(Cell::vertex(3, 3).is_point());
        assert!(!Cell::new_2d(0, 2, 3, 3).non_empty());
        assert!(!Cell::new_2d(0, 2, 3, 3).is_point());
        assert!(Cell::new_2d(0, 2, 0, 3).non_empty());
        assert_eq!(face_dim(DOWN), Y_DIM);
        assert_eq!(opposite_face(LEFT), RIGHT);
        assert_eq!(opposite_face(DOWN), UP);
    }

    #[test]
    fn higher_dimensions() {
        let cube = Cell::from_bounds(&[0, 2, 0, 2, 0, 2]);
        let [lower, upper] = cube.split_halves(2);

        assert_eq!(cube.dim_count(), 3);
        assert!(lower.contained_in(&cube) && upper.contained_in(&cube));
        assert!(!lower.overlaps(&upper));
        assert_eq!(lower.to(2), 1);
    }
}
