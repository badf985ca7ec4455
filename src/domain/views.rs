use super::bspline::BsplineChoice;
use super::mesh::{
    cell::{Cell, X_DIM, Y_DIM},
    FrozenMesh,
};
use super::tree::EliminationTree;

use std::io::{self, Write};

// ---------------------------------------------------------------------------------------------------------------------
// Element lists
// ---------------------------------------------------------------------------------------------------------------------

/// The number of Cells, followed by the bounds of every Cell contained in `region` (one per line)
pub fn write_cells<W: Write>(w: &mut W, cells: &[Cell], region: &Cell) -> io::Result<()> {
    writeln!(w, "{}", cells.len())?;
    for cell in cells.iter().filter(|cell| cell.contained_in(region)) {
        writeln!(w, "{}", cell)?;
    }
    Ok(())
}

/// [write_cells] over the Elems of a Mesh
pub fn write_elems<W: Write>(w: &mut W, mesh: &FrozenMesh) -> io::Result<()> {
    let cells: Vec<Cell> = mesh.elems().iter().map(|elem| elem.cell.clone()).collect();
    write_cells(w, &cells, mesh.root())
}

// ---------------------------------------------------------------------------------------------------------------------
// Neighbors, supports and knots
// ---------------------------------------------------------------------------------------------------------------------

/// The total number of neighbor relations, followed by one line segment per relation: `x_a y_a x_b y_b`,
/// joining the midpoints of the two related Cells.
///
/// `cells` holds the geometry to draw with (one Cell per Elem).
pub fn write_neighbors<W: Write>(w: &mut W, mesh: &FrozenMesh, cells: &[Cell]) -> io::Result<()> {
    assert_eq!(
        cells.len(),
        mesh.len(),
        "Neighbor segments need one Cell per Elem!"
    );

    writeln!(w, "{}", mesh.total_neighbor_count())?;
    for elem in mesh.elems() {
        let that = &cells[elem.num];
        for other_id in elem.neighbors().iter().flatten() {
            let other = &cells[*other_id];
            writeln!(
                w,
                "{} {} {} {}",
                that.middle(X_DIM),
                that.middle(Y_DIM),
                other.middle(X_DIM),
                other.middle(Y_DIM)
            )?;
        }
    }
    Ok(())
}

/// The perturbed Elems (as used for neighbor discovery) followed by their neighbor segments
pub fn write_tweaked_neighbors<W: Write>(w: &mut W, mesh: &FrozenMesh) -> io::Result<()> {
    let (cells, extent) = mesh.tweaked_cells();
    write_cells(w, &cells, &extent)?;
    write_neighbors(w, mesh, &cells)
}

/// For each B-spline (centered on the Elem with the same index): `x_mid y_mid count elem_ids...`
pub fn write_supports<W: Write>(w: &mut W, mesh: &FrozenMesh) -> io::Result<()> {
    let mut supports: Vec<Vec<usize>> = vec![Vec::new(); mesh.len()];
    for elem in mesh.elems() {
        for bspline in elem.bsplines() {
            supports[*bspline].push(elem.num);
        }
    }

    writeln!(w, "{}", mesh.len())?;
    for (elem, support) in mesh.elems().iter().zip(supports.iter()) {
        write!(
            w,
            "{} {} {}",
            elem.cell.middle(X_DIM),
            elem.cell.middle(Y_DIM),
            support.len()
        )?;
        for elem_id in support {
            write!(w, " {}", elem_id)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// The number of B-splines, followed by the knots (or gnomon parameters) of each one
pub fn write_knots<W: Write>(w: &mut W, bsplines: &[BsplineChoice]) -> io::Result<()> {
    writeln!(w, "{}", bsplines.len())?;
    for bspline in bsplines {
        writeln!(w, "{}", bspline)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------------------------------------------------
// Elimination tree
// ---------------------------------------------------------------------------------------------------------------------

/// Input for a frontal solver. B-spline and tree node ids are 1-based.
///
/// 1. The number of B-splines, then `bspline 1` for each one
/// 2. The number of solid Elems, then `level id count bsplines...` for each one
/// 3. The number of tree nodes, then `node count level id ... children...` for each one, where the
///    `level id` pairs identify the solid Elems contained in the node
pub fn write_galois<W: Write>(
    w: &mut W,
    mesh: &FrozenMesh,
    tree: &EliminationTree,
) -> io::Result<()> {
    writeln!(w, "{}", mesh.len())?;
    for elem in mesh.elems() {
        writeln!(w, "{} 1", elem.num + 1)?;
    }

    writeln!(w, "{}", mesh.count_non_empty())?;
    for elem in mesh.solid_elems() {
        if let Some(level_id) = elem.level_id {
            write!(
                w,
                "{} {} {}",
                level_id.level,
                level_id.id,
                elem.bsplines().len()
            )?;
            for bspline in elem.bsplines() {
                write!(w, " {}", bspline + 1)?;
            }
            writeln!(w)?;
        }
    }

    writeln!(w, "{}", tree.len())?;
    for node in tree.nodes() {
        write!(
            w,
            "{} {}",
            node.id + 1,
            mesh.count_elems_within(&node.cell)
        )?;
        for elem in mesh.solid_elems_within(&node.cell) {
            if let Some(level_id) = elem.level_id {
                write!(w, " {} {}", level_id.level, level_id.id)?;
            }
        }
        for child in node.children() {
            write!(w, " {}", child + 1)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// The number of cut-off bands, followed by `bounds... index level` for each band
pub fn write_cut_off_bands<W: Write>(
    w: &mut W,
    mesh: &FrozenMesh,
    tree: &EliminationTree,
) -> io::Result<()> {
    writeln!(w, "{}", tree.cut_off_cells().len())?;
    for (i, band) in tree.cut_off_cells().iter().enumerate() {
        writeln!(w, "{} {} {}", band, i, mesh.level_of(band))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeshType;
    use crate::domain::bspline::compute_bspline_supports;
    use crate::domain::mesh::Mesh;

    fn two_by_two() -> FrozenMesh {
        let mut mesh = Mesh::new(Cell::new_2d(0, 4, 0, 4));
        mesh.split_all_elements_into_4();
        mesh.freeze()
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn element_list() {
        let mesh = two_by_two();
        let output = render(|w| write_elems(w, &mesh));

        assert_eq!(output, "4\n0 2 0 2\n0 2 2 4\n2 4 0 2\n2 4 2 4\n");
    }

    #[test]
    fn cells_outside_the_region_are_counted_but_not_listed() {
        let cells = vec![Cell::new_2d(0, 2, 0, 2), Cell::new_2d(2, 4, 0, 2)];
        let output = render(|w| write_cells(w, &cells, &Cell::new_2d(0, 2, 0, 4)));

        assert_eq!(output, "2\n0 2 0 2\n");
    }

    #[test]
    fn neighbor_segments() {
        let mesh = two_by_two();
        let cells: Vec<Cell> = mesh.elems().iter().map(|elem| elem.cell.clone()).collect();
        let output = render(|w| write_neighbors(w, &mesh, &cells));
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "8");
        assert_eq!(lines.len(), 9);
        // Elem 0: right neighbor (Elem 2), then lower neighbor (Elem 1)
        assert_eq!(lines[1], "1 1 3 1");
        assert_eq!(lines[2], "1 1 1 3");
    }

    #[test]
    fn tweaked_neighbor_view() {
        let mesh = two_by_two();
        let output = render(|w| write_tweaked_neighbors(w, &mesh));
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "4");
        assert_eq!(lines[5], "8");
        assert_eq!(lines.len(), 14);
        // the Mesh itself keeps its original geometry
        assert_eq!(mesh.elem(0).cell, Cell::new_2d(0, 2, 0, 2));
    }

    #[test]
    fn support_and_knot_views() {
        let mut mesh = two_by_two();
        let bsplines = compute_bspline_supports(&mut mesh, MeshType::Unedged, 2);

        let supports = render(|w| write_supports(w, &mesh));
        let lines: Vec<&str> = supports.lines().collect();
        assert_eq!(lines[0], "4");
        assert_eq!(lines[1], "1 1 4 0 1 2 3");
        assert_eq!(lines[4], "3 3 4 0 1 2 3");

        let knots = render(|w| write_knots(w, &bsplines));
        let lines: Vec<&str> = knots.lines().collect();
        assert_eq!(lines[0], "4");
        assert_eq!(lines[1], "Regular 0 0 2 4 0 0 2 4");
    }

    #[test]
    fn galois_view() {
        let mut mesh = two_by_two();
        compute_bspline_supports(&mut mesh, MeshType::Unedged, 2);

        let mut tree = EliminationTree::new();
        let root = tree.add_node(mesh.root().clone(), None);
        tree.process_band(&mesh, X_DIM, root, true);

        let output = render(|w| write_galois(w, &mesh, &tree));
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(&lines[0..5], &["4", "1 1", "2 1", "3 1", "4 1"]);
        assert_eq!(lines[5], "4");
        assert_eq!(lines[6], "0 1 4 1 2 3 4");
        assert_eq!(lines[10], "7");
        assert_eq!(lines[11], "1 4 0 1 0 2 0 3 0 4 2 3");
        assert_eq!(lines[12], "2 2 0 1 0 2 4 5");
        assert_eq!(lines[14], "4 1 0 1");
        assert_eq!(lines.len(), 18);
    }

    #[test]
    fn cut_off_band_view() {
        let mut mesh = Mesh::new(Cell::new_2d(0, 32, 0, 32));
        mesh.split_all_elements_into_4();
        mesh.split_all_elements_into_4();
        mesh.split_all_into_4(&Cell::new_2d(8, 24, 8, 24));
        mesh.split_all_into_4(&Cell::new_2d(12, 20, 12, 20));
        let mesh = mesh.freeze();

        let tree = EliminationTree::for_quadratic(&mesh, 3);
        let output = render(|w| write_cut_off_bands(w, &mesh, &tree));

        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec![
                "8",
                "0 8 0 32 0 0",
                "24 32 0 32 1 0",
                "8 24 0 8 2 0",
                "8 24 24 32 3 0",
                "8 12 8 24 4 0",
                "20 24 8 24 5 0",
                "12 20 8 12 6 1",
                "12 20 20 24 7 1",
            ]
        );
    }
}
