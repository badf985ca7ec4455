/// Neighbor discovery between the Cells of a Mesh
pub mod adjacency;
/// An axis-aligned box: the geometric unit of the Mesh
pub mod cell;
/// A Cell of a frozen Mesh, along with its neighbors and B-spline tags
pub mod elem;
/// Bulk rewrite operators used to build graded meshes
pub mod refinement;

use adjacency::{compute_all_neighbors, tweaked_copy};
use cell::{face_dim, opposite_face, Cell, Coord, X_DIM, Y_DIM};
use elem::{Elem, LevelId};

#[cfg(feature = "json_export")]
use json::JsonValue;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// A Mesh in its refinement phase.
///
/// Holds an ordered collection of [Cell]s decomposing the root domain. Refinement operators
/// (see the [refinement] module) rewrite the whole collection. Once refinement is complete,
/// [Mesh::freeze] consumes the Mesh and produces a [FrozenMesh], which is the only place where
/// neighbor relations exist.
#[derive(Debug, Clone)]
pub struct Mesh {
    root: Cell,
    extent: Cell,
    cells: Vec<Cell>,
}

impl Mesh {
    /// A Mesh made of one Cell covering the whole root domain
    pub fn new(root: Cell) -> Self {
        Self {
            extent: root.clone(),
            cells: vec![root.clone()],
            root,
        }
    }

    /// A Mesh over `root` made of an explicit list of Cells
    pub fn from_cells(root: Cell, cells: Vec<Cell>) -> Self {
        for cell in cells.iter() {
            assert!(
                cell.contained_in(&root),
                "Cell [{}] lies outside of the root domain [{}]; cannot construct Mesh!",
                cell,
                root
            );
        }

        Self {
            extent: root.clone(),
            cells,
            root,
        }
    }

    /// The domain the Mesh was constructed over
    pub fn root(&self) -> &Cell {
        &self.root
    }

    /// The region currently covered by the Mesh (smaller than the root after trimming)
    pub fn extent(&self) -> &Cell {
        &self.extent
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn count_non_empty(&self) -> usize {
        self.cells.iter().filter(|cell| cell.non_empty()).count()
    }

    /// Number of solid Cells fully contained in `region`
    pub fn count_cells_within(&self, region: &Cell) -> usize {
        count_within(self.cells.iter(), region)
    }

    /// Every pair of solid Cells with a positive-area overlap
    pub fn overlapping_pairs(&self) -> Vec<[usize; 2]> {
        overlapping_pairs(&self.cells)
    }

    pub(crate) fn push(&mut self, cell: Cell) {
        assert_eq!(
            cell.dim_count(),
            self.root.dim_count(),
            "Cannot add a {}D Cell to a {}D Mesh!",
            cell.dim_count(),
            self.root.dim_count()
        );
        self.cells.push(cell);
    }

    pub(crate) fn set_extent(&mut self, extent: Cell) {
        self.extent = extent;
    }

    // Replace the whole collection: every old Cell is handed to `f`, which pushes its replacement(s) onto the new collection
    pub(crate) fn rewrite<F>(&mut self, mut f: F)
    where
        F: FnMut(Cell, &mut Vec<Cell>),
    {
        let old_cells = std::mem::take(&mut self.cells);
        let mut new_cells = Vec::with_capacity(old_cells.len() * 2);
        for cell in old_cells {
            f(cell, &mut new_cells);
        }
        self.cells = new_cells;
    }

    /// Finish the refinement phase.
    ///
    /// * checks that no two solid Cells overlap
    /// * assigns a level and a within-level id to every solid Cell
    /// * resolves the neighbors of every Cell
    pub fn freeze(mut self) -> FrozenMesh {
        let overlaps = self.overlapping_pairs();
        assert!(
            overlaps.is_empty(),
            "Solid Cells must not overlap after refinement; found {} overlapping pairs (first: {:?})!",
            overlaps.len(),
            overlaps.first()
        );

        let level_ids = self.enumerate();
        let neighbors = compute_all_neighbors(&mut self.cells, &mut self.extent);

        let elems: Vec<Elem> = self
            .cells
            .drain(0..)
            .zip(level_ids)
            .zip(neighbors)
            .enumerate()
            .map(|(num, ((cell, level_id), neighbors))| Elem::new(num, cell, level_id, neighbors))
            .collect();

        let frozen = FrozenMesh {
            root: self.root,
            extent: self.extent,
            elems,
        };
        frozen.check_neighbor_continuity();

        info!(
            "Mesh frozen with {} Elems ({} solid) and {} neighbor relations",
            frozen.len(),
            frozen.count_non_empty(),
            frozen.total_neighbor_count()
        );

        frozen
    }

    // level is ilog2(root width / largest extent) - 1; ids count up from 1 within each level
    fn enumerate(&self) -> Vec<Option<LevelId>> {
        let mut ids_by_level: BTreeMap<usize, usize> = BTreeMap::new();
        let root_size = self.root.size(X_DIM);

        let level_ids: Vec<Option<LevelId>> = self
            .cells
            .iter()
            .map(|cell| {
                if cell.non_empty() {
                    let level = compute_level(root_size, cell);
                    let id = ids_by_level
                        .entry(level)
                        .and_modify(|count| *count += 1)
                        .or_insert(1);
                    Some(LevelId { level, id: *id })
                } else {
                    None
                }
            })
            .collect();

        debug!("Solid Cells per level: {:?}", ids_by_level);
        level_ids
    }
}

fn compute_level(root_size: Coord, cell: &Cell) -> usize {
    let largest = cell.size(X_DIM).max(cell.size(Y_DIM)).max(1);
    let ratio = (root_size / largest).max(1) as u64;
    (ratio.ilog2() as usize).saturating_sub(1)
}

fn count_within<'a>(cells: impl Iterator<Item = &'a Cell>, region: &Cell) -> usize {
    cells
        .filter(|cell| cell.non_empty() && cell.contained_in(region))
        .count()
}

fn overlapping_pairs(cells: &[Cell]) -> Vec<[usize; 2]> {
    cells
        .par_iter()
        .enumerate()
        .filter(|(_, cell)| cell.non_empty())
        .flat_map_iter(|(i, cell)| {
            cells
                .iter()
                .enumerate()
                .skip(i + 1)
                .filter(move |(_, other)| other.non_empty() && cell.overlaps(other))
                .map(move |(j, _)| [i, j])
        })
        .collect()
}

/// A Mesh whose structure can no longer change.
///
/// The [Elem]s of a `FrozenMesh` have stable ids (their positions), so neighbor relations are stored as ids.
/// Only B-spline tags can still be modified.
#[derive(Debug, Clone)]
pub struct FrozenMesh {
    root: Cell,
    extent: Cell,
    elems: Vec<Elem>,
}

impl FrozenMesh {
    pub fn root(&self) -> &Cell {
        &self.root
    }

    pub fn extent(&self) -> &Cell {
        &self.extent
    }

    pub fn elems(&self) -> &[Elem] {
        &self.elems
    }

    pub fn elem(&self, elem_id: usize) -> &Elem {
        assert!(
            elem_id < self.elems.len(),
            "Elem {} doesn't exist!",
            elem_id
        );
        &self.elems[elem_id]
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Iterate over the solid `Elem`s
    pub fn solid_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.elems.iter().filter(|elem| elem.non_empty())
    }

    /// Iterate over the solid `Elem`s fully contained in `region`
    pub fn solid_elems_within<'a>(&'a self, region: &'a Cell) -> impl Iterator<Item = &'a Elem> + 'a {
        self.solid_elems()
            .filter(move |elem| elem.cell.contained_in(region))
    }

    pub fn count_non_empty(&self) -> usize {
        self.solid_elems().count()
    }

    /// Number of solid `Elem`s fully contained in `region`
    pub fn count_elems_within(&self, region: &Cell) -> usize {
        count_within(self.elems.iter().map(|elem| &elem.cell), region)
    }

    /// Refinement level of an arbitrary region, measured against the root
    pub fn level_of(&self, cell: &Cell) -> usize {
        compute_level(self.root.size(X_DIM), cell)
    }

    /// Id of the `Elem` neighboring `elem_id` across `face`
    pub fn neighbor(&self, elem_id: usize, face: usize) -> Option<usize> {
        self.elem(elem_id).neighbor(face)
    }

    pub fn total_neighbor_count(&self) -> usize {
        self.elems.iter().map(|elem| elem.neighbor_count()).sum()
    }

    /// The Cells of the Mesh in the perturbed coordinate system used for neighbor discovery
    ///
    /// The Mesh itself is left untouched
    pub fn tweaked_cells(&self) -> (Vec<Cell>, Cell) {
        tweaked_copy(
            self.elems.iter().map(|elem| elem.cell.clone()).collect(),
            self.extent.clone(),
        )
    }

    /// The box reached by pushing each face of an `Elem` out to the far side of its neighbor across that face
    ///
    /// Faces without a neighbor stay where they are
    pub fn support_cell(&self, elem_id: usize) -> Cell {
        let elem = self.elem(elem_id);
        let bounds: Vec<Coord> = (0..elem.cell.face_count())
            .map(|face| match elem.neighbor(face) {
                Some(neighbor_id) => self.elems[neighbor_id].cell.bound(face),
                None => elem.cell.bound(face),
            })
            .collect();

        Cell::from_bounds(&bounds)
    }

    pub(crate) fn tag_bspline(&mut self, elem_id: usize, bspline: usize) -> bool {
        self.elems[elem_id].add_bspline(bspline)
    }

    pub(crate) fn clear_bspline_tags(&mut self) {
        for elem in self.elems.iter_mut() {
            elem.clear_bsplines();
        }
    }

    /// Ids of the `Elem`s tagged with a given B-spline
    pub fn bspline_support(&self, bspline: usize) -> Vec<usize> {
        self.elems
            .iter()
            .filter(|elem| elem.bsplines().contains(&bspline))
            .map(|elem| elem.num)
            .collect()
    }

    // each recorded neighbor must touch its Elem along the shared face
    fn check_neighbor_continuity(&self) {
        for elem in self.elems.iter() {
            for (face, neighbor_id) in elem.neighbors().iter().enumerate() {
                if let Some(neighbor_id) = neighbor_id {
                    let other = &self.elems[*neighbor_id];
                    assert_eq!(
                        elem.cell.bound(face),
                        other.cell.bound(opposite_face(face)),
                        "{} and its neighbor {} do not touch along dim {}!",
                        elem,
                        other,
                        face_dim(face)
                    );
                }
            }
        }
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        JsonValue::from(
            self.elems
                .iter()
                .map(|elem| elem.to_json())
                .collect::<Vec<_>>(),
        )
    }

    /// Print the Mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let mesh_object = json::object! {
            "Root": self.root.bounds().to_vec(),
            "Extent": self.extent.bounds().to_vec(),
            "Elems": self.to_json(),
        };

        mesh_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::cell::{DOWN, LEFT, RIGHT, UP};
    use super::*;

    fn two_by_two() -> Mesh {
        let mut mesh = Mesh::new(Cell::new_2d(0, 4, 0, 4));
        mesh.split_all_elements_into_4();
        mesh
    }

    #[test]
    fn levels_and_ids() {
        let mut mesh = two_by_two();
        mesh.split_all_into_4(&Cell::new_2d(0, 2, 0, 2));
        mesh.add_corner_vertices(&Cell::new_2d(0, 2, 0, 2));
        let frozen = mesh.freeze();

        let level_ids: Vec<Option<LevelId>> =
            frozen.elems().iter().map(|elem| elem.level_id).collect();

        assert_eq!(frozen.len(), 11);
        assert_eq!(level_ids[0], Some(LevelId { level: 1, id: 1 }));
        assert_eq!(level_ids[3], Some(LevelId { level: 1, id: 4 }));
        assert_eq!(level_ids[4], Some(LevelId { level: 0, id: 1 }));
        assert_eq!(level_ids[6], Some(LevelId { level: 0, id: 3 }));
        assert!(level_ids[7..].iter().all(|lid| lid.is_none()));
    }

    #[test]
    fn elem_ids_are_positions() {
        let frozen = two_by_two().freeze();
        for (i, elem) in frozen.elems().iter().enumerate() {
            assert_eq!(elem.num, i);
        }
    }

    #[test]
    fn neighbors_of_uniform_grid() {
        let frozen = two_by_two().freeze();
        // cells: [0,2]x[0,2], [0,2]x[2,4], [2,4]x[0,2], [2,4]x[2,4]
        assert_eq!(frozen.neighbor(0, RIGHT), Some(2));
        assert_eq!(frozen.neighbor(0, DOWN), Some(1));
        assert_eq!(frozen.neighbor(0, LEFT), None);
        assert_eq!(frozen.neighbor(0, UP), None);
        assert_eq!(frozen.neighbor(3, LEFT), Some(1));
        assert_eq!(frozen.neighbor(3, UP), Some(2));
        assert_eq!(frozen.total_neighbor_count(), 8);
    }

    #[test]
    fn freezing_restores_bounds() {
        let mut mesh = two_by_two();
        mesh.add_edge(X_DIM, &Cell::new_2d(0, 4, 0, 4), 2, 2, false);
        mesh.add_vertex(2, 2);
        let before: Vec<Cell> = mesh.cells().to_vec();

        let frozen = mesh.freeze();

        for (elem, cell) in frozen.elems().iter().zip(before.iter()) {
            assert_eq!(elem.cell.bounds(), cell.bounds());
            assert!(!elem.cell.has_backup());
        }
        assert_eq!(frozen.extent(), &Cell::new_2d(0, 4, 0, 4));
    }

    #[test]
    fn support_cell_extends_to_neighbors() {
        let mut mesh = Mesh::new(Cell::new_2d(0, 6, 0, 6));
        mesh.rewrite(|cell, new_cells| {
            for column in cell.split_thirds(X_DIM) {
                new_cells.extend(column.split_thirds(Y_DIM));
            }
        });
        let frozen = mesh.freeze();

        // the center of the 3x3 grid reaches the whole domain, a corner reaches its 2x2 block
        assert_eq!(frozen.support_cell(4), Cell::new_2d(0, 6, 0, 6));
        assert_eq!(frozen.support_cell(0), Cell::new_2d(0, 4, 0, 4));
    }

    #[test]
    #[should_panic]
    fn overlapping_cells_are_rejected() {
        let root = Cell::new_2d(0, 4, 0, 4);
        Mesh::from_cells(
            root,
            vec![Cell::new_2d(0, 3, 0, 4), Cell::new_2d(2, 4, 0, 4)],
        )
        .freeze();
    }

    #[test]
    fn overlapping_pairs_ignore_degenerate_cells() {
        let root = Cell::new_2d(0, 4, 0, 4);
        let mesh = Mesh::from_cells(
            root,
            vec![
                Cell::new_2d(0, 4, 0, 2),
                Cell::new_2d(0, 4, 2, 4),
                Cell::new_2d(0, 4, 1, 1),
                Cell::new_2d(0, 4, 1, 3),
            ],
        );

        assert_eq!(mesh.overlapping_pairs(), vec![[0, 3], [1, 3]]);
    }

    #[test]
    fn bspline_tags() {
        let mut frozen = two_by_two().freeze();
        assert!(frozen.tag_bspline(1, 0));
        assert!(frozen.tag_bspline(3, 0));
        assert!(!frozen.tag_bspline(3, 0));
        assert_eq!(frozen.bspline_support(0), vec![1, 3]);

        frozen.clear_bspline_tags();
        assert!(frozen.bspline_support(0).is_empty());
    }
}
