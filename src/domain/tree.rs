use super::mesh::{
    cell::{Cell, Coord, X_DIM, Y_DIM},
    FrozenMesh,
};
use super::IdTracker;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use log::{info, trace, warn};
use smallvec::SmallVec;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// A node of an [EliminationTree]: a region of the Mesh whose solid Elems are eliminated together
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: usize,
    pub cell: Cell,
    pub parent: Option<usize>,
    children: SmallVec<[usize; 2]>,
}

impl TreeNode {
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A binary forest over a [FrozenMesh] whose post-order traversal is an elimination order.
///
/// Node ids are assigned in creation order, starting from zero, and double as positions in the node list.
#[derive(Debug, Clone)]
pub struct EliminationTree {
    nodes: Vec<TreeNode>,
    cut_off_cells: Vec<Cell>,
    id_tracker: IdTracker,
}

impl Default for EliminationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EliminationTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            cut_off_cells: Vec::new(),
            id_tracker: IdTracker::new(0),
        }
    }

    /// Peel the refinement levels of a quadratic Mesh off one band at a time.
    ///
    /// On every level, the left, right, upper and lower bands outside the next inner box are cut off, each one
    /// becoming a child of the current remainder alongside the new (smaller) remainder. Each band is subdivided
    /// with [EliminationTree::process_band]: the left band before its remainder node is created, the other three
    /// after. The innermost remainder is finally subdivided with alternating dimensions.
    pub fn for_quadratic(mesh: &FrozenMesh, depth: usize) -> Self {
        let mut tree = Self::new();
        let mut outer = mesh.root().clone();
        let mut edge_offset = outer.size(X_DIM) / 4;
        let mut outer_node = tree.add_node(outer.clone(), None);

        for _ in 1..depth {
            let inner = outer.shrunk(edge_offset);

            let cuts = [
                (X_DIM, inner.left(), true),
                (X_DIM, inner.right(), false),
                (Y_DIM, inner.up(), true),
                (Y_DIM, inner.down(), false),
            ];

            for (slice, (dim, coord, band_first)) in cuts.into_iter().enumerate() {
                let [first, second] = outer.split(dim, coord);
                let (band, main) = if band_first {
                    (first, second)
                } else {
                    (second, first)
                };

                // the left band is subdivided before the remainder node is created
                let band_node = tree.add_node(band.clone(), Some(outer_node));
                if slice == 0 {
                    tree.process_band(mesh, dim ^ 1, band_node, false);
                    outer_node = tree.add_node(main.clone(), Some(outer_node));
                } else {
                    outer_node = tree.add_node(main.clone(), Some(outer_node));
                    tree.process_band(mesh, dim ^ 1, band_node, false);
                }

                tree.cut_off_cells.push(band);
                outer = main;
            }

            edge_offset /= 2;
        }

        tree.process_band(mesh, X_DIM, outer_node, true);

        info!(
            "Built quadratic elimination tree with {} nodes over {} cut-off bands",
            tree.len(),
            tree.cut_off_cells.len()
        );
        tree
    }

    /// Decompose the (trimmed) extent of a rectangular Mesh with [EliminationTree::decompose_alternating]
    pub fn for_rectangular(mesh: &FrozenMesh) -> Self {
        let mut tree = Self::new();
        let edge_offset = mesh.root().size(Y_DIM) / 4;
        tree.decompose_alternating(mesh, None, mesh.extent().clone(), edge_offset);

        info!("Built rectangular elimination tree with {} nodes", tree.len());
        tree
    }

    /// Create a node (and link it under its parent)
    pub fn add_node(&mut self, cell: Cell, parent: Option<usize>) -> usize {
        let id = self.id_tracker.next_id();
        debug_assert_eq!(id, self.nodes.len());

        if let Some(parent_id) = parent {
            self.nodes[parent_id].children.push(id);
        }
        trace!("Tree node {} [{}] (parent: {:?})", id, cell, parent);

        self.nodes.push(TreeNode {
            id,
            cell,
            parent,
            children: SmallVec::new(),
        });
        id
    }

    /// Recursively bisect a band of solid Elems along `dim` until every leaf holds at most one of them.
    ///
    /// An even count is split at the middle of the node; an odd count `k` is split at `from + size * (k / 2) / k`.
    /// A split line never crosses a solid Elem: it is moved to the nearest Elem boundary, and the other dimension
    /// is used when no boundary along `dim` is available. With `toggle_dim`, the split dimension alternates at
    /// every level.
    pub fn process_band(&mut self, mesh: &FrozenMesh, dim: usize, node: usize, toggle_dim: bool) {
        let cell = self.nodes[node].cell.clone();
        let count = mesh.count_elems_within(&cell) as Coord;
        if count <= 1 {
            return;
        }

        let split = [dim, dim ^ 1]
            .into_iter()
            .find_map(|split_dim| {
                band_split_coord(mesh, &cell, split_dim, count).map(|coord| (split_dim, coord))
            });

        let (split_dim, split_at) = match split {
            Some(split) => split,
            None => {
                warn!(
                    "Tree node {} [{}] holds {} Elems but cannot be split without cutting one; keeping it as a leaf",
                    node, cell, count
                );
                return;
            }
        };

        let [first, second] = cell.split(split_dim, split_at);
        let first_node = self.add_node(first, Some(node));
        let second_node = self.add_node(second, Some(node));

        let next_dim = if toggle_dim { split_dim ^ 1 } else { dim };
        self.process_band(mesh, next_dim, first_node, toggle_dim);
        self.process_band(mesh, next_dim, second_node, toggle_dim);
    }

    /// Recursively decompose a rectangular box.
    ///
    /// * A box twice as tall as it is wide is cut into a lower band (`offset` high), a middle box and an upper band
    /// * A square box is bisected along x (halving the offset)
    /// * A box with exactly 2 Elems gets one final bisection across its longer side
    pub fn decompose_alternating(
        &mut self,
        mesh: &FrozenMesh,
        parent: Option<usize>,
        outer: Cell,
        offset: Coord,
    ) {
        let count = mesh.count_elems_within(&outer);
        let node = self.add_node(outer.clone(), parent);
        let (width, height) = (outer.size(X_DIM), outer.size(Y_DIM));

        if 2 * width == height && count != 2 {
            let [first, second] = outer.split(Y_DIM, outer.up() + offset);
            let second_node = self.add_node(second.clone(), Some(node));

            self.decompose_alternating(mesh, Some(node), first, offset);

            let [third, fourth] = second.split(Y_DIM, second.down() - offset);
            self.decompose_alternating(mesh, Some(second_node), third, offset);
            self.decompose_alternating(mesh, Some(second_node), fourth, offset);
        } else if width == height && count != 1 {
            let [first, second] = outer.split_halves(X_DIM);
            self.decompose_alternating(mesh, Some(node), first, offset / 2);
            self.decompose_alternating(mesh, Some(node), second, offset / 2);
        } else if count == 2 {
            let dim = if width >= height { X_DIM } else { Y_DIM };
            let [first, second] = outer.split_halves(dim);
            self.add_node(first, Some(node));
            self.add_node(second, Some(node));
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        assert!(id < self.nodes.len(), "Tree node {} doesn't exist!", id);
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes.iter().filter(|node| node.parent.is_none())
    }

    pub fn leaves(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// The bands cut off by [EliminationTree::for_quadratic], in the order they were cut
    pub fn cut_off_cells(&self) -> &[Cell] {
        &self.cut_off_cells
    }

    /// Node ids in post-order (children before parents, roots in creation order)
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for root in self.roots() {
            self.visit_postorder(root.id, &mut order);
        }
        order
    }

    fn visit_postorder(&self, node: usize, order: &mut Vec<usize>) {
        for child in self.nodes[node].children.iter() {
            self.visit_postorder(*child, order);
        }
        order.push(node);
    }

    /// Walk the tree in post-order and emit each B-spline (by index into `supports`) at the first node that
    /// contains its support. Returns `(node_id, bspline)` pairs in emission order.
    pub fn bspline_schedule(&self, supports: &[Cell]) -> Vec<(usize, usize)> {
        let mut emitted = vec![false; supports.len()];
        let mut schedule = Vec::with_capacity(supports.len());

        for node_id in self.postorder() {
            let cell = &self.nodes[node_id].cell;
            for (bspline, support) in supports.iter().enumerate() {
                if !emitted[bspline] && support.contained_in(cell) {
                    emitted[bspline] = true;
                    schedule.push((node_id, bspline));
                }
            }
        }

        schedule
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        JsonValue::from(
            self.nodes
                .iter()
                .map(|node| {
                    object! {
                        "id": node.id,
                        "bounds": node.cell.bounds().to_vec(),
                        "parent": node.parent,
                        "children": node.children.to_vec(),
                    }
                })
                .collect::<Vec<_>>(),
        )
    }

    /// Print the tree to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let tree_object = object! {
            "Nodes": self.to_json(),
            "CutOffBands": self
                .cut_off_cells
                .iter()
                .map(|cell| cell.bounds().to_vec())
                .collect::<Vec<_>>(),
        };

        tree_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}

/// The Elem boundary strictly inside `cell` along `dim` closest to the preferred split of `count` Elems,
/// skipping coordinates that would cut through a solid Elem
fn band_split_coord(mesh: &FrozenMesh, cell: &Cell, dim: usize, count: Coord) -> Option<Coord> {
    let preferred = if count % 2 == 0 {
        cell.middle(dim)
    } else {
        cell.from(dim) + cell.size(dim) * (count / 2) / count
    };

    let elems: Vec<&Cell> = mesh.solid_elems_within(cell).map(|elem| &elem.cell).collect();

    elems
        .iter()
        .flat_map(|elem| [elem.from(dim), elem.to(dim)])
        .filter(|coord| *coord > cell.from(dim) && *coord < cell.to(dim))
        .filter(|coord| {
            !elems
                .iter()
                .any(|elem| elem.from(dim) < *coord && *coord < elem.to(dim))
        })
        .min_by_key(|coord| ((coord - preferred).abs(), *coord))
}

#[cfg(test)]
mod tests {
    use super::super::mesh::Mesh;
    use super::*;

    fn band_of_five() -> FrozenMesh {
        let root = Cell::new_2d(0, 5, 0, 1);
        let cells = (0..5).map(|x| Cell::new_2d(x, x + 1, 0, 1)).collect();
        Mesh::from_cells(root, cells).freeze()
    }

    // unedged version of the quadratic refinement sequence
    fn graded_quadratic(size: Coord, depth: usize) -> FrozenMesh {
        let root = Cell::new_2d(0, size, 0, size);
        let mut mesh = Mesh::new(root.clone());
        mesh.split_all_elements_into_4();
        mesh.split_all_elements_into_4();

        let mut outer = root;
        let mut edge_offset = size / 4;
        for _ in 1..depth {
            let inner = outer.shrunk(edge_offset);
            mesh.split_all_into_4(&inner);
            edge_offset /= 2;
            outer = inner;
        }
        mesh.freeze()
    }

    fn graded_rectangular(size: Coord, depth: usize) -> FrozenMesh {
        let mut mesh = Mesh::new(Cell::new_2d(0, 3 * size / 2, 0, size));
        mesh.split_all_elements_into_6();
        mesh.split_all_elements_into_4();

        let mut outer = mesh.root().clone();
        let mut edge_offset = size / 4;
        for _ in 1..depth {
            let inner = outer.shrunk(edge_offset);
            mesh.split_all_into_4(&inner);
            edge_offset /= 2;
            outer = inner;
        }
        mesh.remove_not_contained_in(&Cell::new_2d(size / 2, size, 0, size));
        mesh.freeze()
    }

    fn area(cell: &Cell) -> Coord {
        cell.size(X_DIM) * cell.size(Y_DIM)
    }

    fn assert_valid_decomposition(tree: &EliminationTree, mesh: &FrozenMesh) {
        for (i, node) in tree.nodes().iter().enumerate() {
            assert_eq!(node.id, i);

            if node.is_leaf() {
                assert_eq!(mesh.count_elems_within(&node.cell), 1, "leaf {}", node.id);
            } else {
                let children: Vec<&Cell> = node
                    .children()
                    .iter()
                    .map(|child| &tree.node(*child).cell)
                    .collect();

                assert_eq!(children.len(), 2);
                assert!(children.iter().all(|child| child.contained_in(&node.cell)));
                assert!(!children[0].overlaps(children[1]));
                assert_eq!(children.iter().map(|child| area(child)).sum::<Coord>(), area(&node.cell));
                assert!(node.children().iter().all(|child| *child > node.id));
            }
        }
    }

    #[test]
    fn odd_band_split() {
        let mesh = band_of_five();
        let mut tree = EliminationTree::new();
        let root = tree.add_node(mesh.root().clone(), None);
        tree.process_band(&mesh, X_DIM, root, false);

        let first = &tree.node(1).cell;
        let second = &tree.node(2).cell;
        assert_eq!(first, &Cell::new_2d(0, 2, 0, 1));
        assert_eq!(second, &Cell::new_2d(2, 5, 0, 1));
        assert_eq!(mesh.count_elems_within(first), 2);
        assert_eq!(mesh.count_elems_within(second), 3);

        assert_eq!(tree.len(), 9);
        assert_eq!(tree.leaves().count(), 5);
        assert_valid_decomposition(&tree, &mesh);
    }

    #[test]
    fn mixed_band_splits_between_elems() {
        let root = Cell::new_2d(0, 4, 0, 8);
        let cells = vec![
            Cell::new_2d(0, 4, 0, 4),
            Cell::new_2d(0, 4, 4, 6),
            Cell::new_2d(0, 4, 6, 8),
        ];
        let mesh = Mesh::from_cells(root, cells).freeze();

        let mut tree = EliminationTree::new();
        let root = tree.add_node(mesh.root().clone(), None);
        tree.process_band(&mesh, Y_DIM, root, false);

        assert_eq!(tree.node(1).cell, Cell::new_2d(0, 4, 0, 4));
        assert_eq!(tree.node(2).cell, Cell::new_2d(0, 4, 4, 8));
        assert_eq!(tree.leaves().count(), 3);
        assert_valid_decomposition(&tree, &mesh);
    }

    #[test]
    fn band_falls_back_to_the_other_dim() {
        let root = Cell::new_2d(0, 4, 0, 2);
        let cells = vec![Cell::new_2d(0, 2, 0, 2), Cell::new_2d(2, 4, 0, 2)];
        let mesh = Mesh::from_cells(root, cells).freeze();

        let mut tree = EliminationTree::new();
        let root = tree.add_node(mesh.root().clone(), None);
        tree.process_band(&mesh, Y_DIM, root, false);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.node(1).cell, Cell::new_2d(0, 2, 0, 2));
        assert_valid_decomposition(&tree, &mesh);
    }

    #[test]
    fn postorder_and_schedule() {
        let mesh = band_of_five();
        let mut tree = EliminationTree::new();
        let root = tree.add_node(mesh.root().clone(), None);
        tree.process_band(&mesh, X_DIM, root, false);

        assert_eq!(tree.postorder(), vec![3, 4, 1, 5, 7, 8, 6, 2, 0]);

        let supports = [
            Cell::new_2d(0, 1, 0, 1),
            Cell::new_2d(0, 5, 0, 1),
            Cell::new_2d(1, 3, 0, 1),
            Cell::new_2d(3, 5, 0, 1),
        ];
        assert_eq!(
            tree.bspline_schedule(&supports),
            vec![(3, 0), (6, 3), (0, 1), (0, 2)]
        );
    }

    #[test]
    fn quadratic_tree() {
        let mesh = graded_quadratic(32, 3);
        assert_eq!(mesh.count_non_empty(), 40);

        let tree = EliminationTree::for_quadratic(&mesh, 3);

        assert_eq!(tree.roots().count(), 1);
        // the left band of 4 Elems takes ids 1 to 7 before the remainder is created
        assert_eq!(tree.node(0).children(), &[1, 8]);
        assert_eq!(tree.node(8).children(), &[9, 10]);
        assert_eq!(tree.leaves().count(), 40);
        assert_eq!(tree.cut_off_cells().len(), 8);
        assert_eq!(tree.cut_off_cells()[0], Cell::new_2d(0, 8, 0, 32));
        assert_eq!(tree.cut_off_cells()[4], Cell::new_2d(8, 12, 8, 24));
        assert_valid_decomposition(&tree, &mesh);
    }

    #[test]
    fn single_level_quadratic_tree() {
        let mesh = graded_quadratic(8, 1);
        let tree = EliminationTree::for_quadratic(&mesh, 1);

        assert!(tree.cut_off_cells().is_empty());
        assert_eq!(tree.leaves().count(), 16);
        assert_eq!(tree.len(), 31);
        assert_valid_decomposition(&tree, &mesh);
    }

    #[test]
    fn rectangular_tree() {
        for (size, depth, elems) in [(16, 2, 20), (32, 3, 44)] {
            let mesh = graded_rectangular(size, depth);
            assert_eq!(mesh.count_non_empty(), elems);

            let tree = EliminationTree::for_rectangular(&mesh);

            assert_eq!(tree.roots().count(), 1);
            assert_eq!(tree.node(0).cell, Cell::new_2d(size / 2, size, 0, size));
            assert_eq!(tree.leaves().count(), elems);
            assert_valid_decomposition(&tree, &mesh);
        }
    }
}
