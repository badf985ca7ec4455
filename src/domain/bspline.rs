use super::mesh::{
    cell::{Cell, Coord, LEFT, X_DIM, Y_DIM},
    FrozenMesh,
};
use crate::config::MeshType;

use log::{info, warn};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// A tensor-product B-spline described by one knot sequence per axis
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorBspline {
    x_knots: SmallVec<[Coord; 4]>,
    y_knots: SmallVec<[Coord; 4]>,
}

impl TensorBspline {
    pub fn new(x_knots: &[Coord], y_knots: &[Coord]) -> Self {
        for knots in [x_knots, y_knots] {
            assert!(
                knots.len() >= 2 && knots.windows(2).all(|pair| pair[0] <= pair[1]),
                "B-spline knots must be a non-decreasing sequence of at least 2 values; got {:?}",
                knots
            );
        }

        Self {
            x_knots: SmallVec::from_slice(x_knots),
            y_knots: SmallVec::from_slice(y_knots),
        }
    }

    /// Knots `[support.from, center.from, center.to, support.to]` along each axis
    pub fn from_support(center: &Cell, support: &Cell) -> Self {
        let knots = |dim: usize| -> [Coord; 4] {
            [
                support.from(dim),
                center.from(dim),
                center.to(dim),
                support.to(dim),
            ]
        };

        Self::new(&knots(X_DIM), &knots(Y_DIM))
    }

    pub fn x_knots(&self) -> &[Coord] {
        &self.x_knots
    }

    pub fn y_knots(&self) -> &[Coord] {
        &self.y_knots
    }

    pub fn support(&self) -> Cell {
        let (x_from, x_to) = first_and_last(&self.x_knots);
        let (y_from, y_to) = first_and_last(&self.y_knots);
        Cell::new_2d(x_from, x_to, y_from, y_to)
    }
}

fn first_and_last(knots: &[Coord]) -> (Coord, Coord) {
    (knots[0], knots[knots.len() - 1])
}

/// An L-shaped B-spline centered on a vertex at a grading transition.
///
/// ```text
///   +-----------+-----------+
///   |           |           |
///   |   trunk   |  y-shift  |
///   |           |           |
///   +-----------+-----+-----+
///   |           |glue |     |
///   |  x-shift  +-----+     |
///   |           |  refined  |
///   +-----------+-----------+
/// ```
/// (shown for positive shifts: the refined quadrant lies towards `+x, +y` of the center)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GnomonBspline {
    pub x_mid: Coord,
    pub y_mid: Coord,
    pub shift_x: Coord,
    pub shift_y: Coord,
}

impl GnomonBspline {
    pub fn new(x_mid: Coord, y_mid: Coord, shift_x: Coord, shift_y: Coord) -> Self {
        Self {
            x_mid,
            y_mid,
            shift_x,
            shift_y,
        }
    }

    /// Bounding box of all four pieces
    pub fn support(&self) -> Cell {
        let (dx, dy) = (2 * self.shift_x.abs(), 2 * self.shift_y.abs());
        Cell::new_2d(
            self.x_mid - dx,
            self.x_mid + dx,
            self.y_mid - dy,
            self.y_mid + dy,
        )
    }

    /// The quadrant of the support that the shifts point into
    pub fn refined_quadrant(&self) -> Cell {
        self.quadrant(1, 1)
    }

    pub fn trunk_support(&self) -> Cell {
        self.quadrant(-1, -1)
    }

    pub fn x_shifted_support(&self) -> Cell {
        self.quadrant(1, -1)
    }

    pub fn y_shifted_support(&self) -> Cell {
        self.quadrant(-1, 1)
    }

    pub fn glue_support(&self) -> Cell {
        let (x_from, x_to) = ordered(self.x_mid, self.x_mid + self.shift_x);
        let (y_from, y_to) = ordered(self.y_mid, self.y_mid + self.shift_y);
        Cell::new_2d(x_from, x_to, y_from, y_to)
    }

    // quadrant reached by moving 2 * shift * dir from the center along each axis
    fn quadrant(&self, x_dir: Coord, y_dir: Coord) -> Cell {
        let (x_from, x_to) = ordered(self.x_mid, self.x_mid + 2 * x_dir * self.shift_x);
        let (y_from, y_to) = ordered(self.y_mid, self.y_mid + 2 * y_dir * self.shift_y);
        Cell::new_2d(x_from, x_to, y_from, y_to)
    }
}

fn ordered(a: Coord, b: Coord) -> (Coord, Coord) {
    (a.min(b), a.max(b))
}

/// The B-spline associated with one Elem
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BsplineChoice {
    Regular(TensorBspline),
    Gnomon(GnomonBspline),
}

impl BsplineChoice {
    pub fn support(&self) -> Cell {
        match self {
            Self::Regular(bspline) => bspline.support(),
            Self::Gnomon(bspline) => bspline.support(),
        }
    }

    pub fn is_gnomon(&self) -> bool {
        matches!(self, Self::Gnomon(_))
    }
}

impl fmt::Display for BsplineChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Regular(bspline) => {
                write!(f, "Regular")?;
                for knot in bspline.x_knots().iter().chain(bspline.y_knots().iter()) {
                    write!(f, " {}", knot)?;
                }
                Ok(())
            }
            Self::Gnomon(bspline) => write!(
                f,
                "Gnomon {} {} {} {}",
                bspline.x_mid, bspline.y_mid, bspline.shift_x, bspline.shift_y
            ),
        }
    }
}

// ---------------------------------------------------------------------------------------------------------------------
// Support computation
// ---------------------------------------------------------------------------------------------------------------------

/// Compute one B-spline per Elem (B-spline `i` is centered on Elem `i`) and tag every Elem with the B-splines
/// whose support covers it.
///
/// The support of a B-spline of order 2 is made of the solid Elems contained in [FrozenMesh::support_cell] of its
/// center. Each higher order repeats the search around every Elem found on the previous order.
///
/// On 4-edged meshes, a vertex whose support holds Elems narrower than half of its left neighbor produces a
/// [GnomonBspline]; those narrow Elems are left out of the support.
pub fn compute_bspline_supports(
    mesh: &mut FrozenMesh,
    mesh_type: MeshType,
    order: usize,
) -> Vec<BsplineChoice> {
    assert!(order >= 2, "B-spline order must be at least 2; got {}", order);
    mesh.clear_bspline_tags();

    let bsplines: Vec<BsplineChoice> = (0..mesh.len())
        .map(|elem_id| compute_bspline_support(mesh, mesh_type, order, elem_id))
        .collect();

    info!(
        "Computed {} order-{} B-splines ({} gnomons)",
        bsplines.len(),
        order,
        bsplines.iter().filter(|bspline| bspline.is_gnomon()).count()
    );

    bsplines
}

fn compute_bspline_support(
    mesh: &mut FrozenMesh,
    mesh_type: MeshType,
    order: usize,
    elem_id: usize,
) -> BsplineChoice {
    let center = mesh.elem(elem_id).cell.clone();
    let support = mesh.support_cell(elem_id);
    let min_elem_size = gnomon_threshold(mesh, mesh_type, elem_id);

    let candidates: Vec<usize> = mesh
        .solid_elems_within(&support)
        .map(|elem| elem.num)
        .collect();

    let mut gnomon: Option<GnomonBspline> = None;
    let mut explored: BTreeMap<usize, usize> = BTreeMap::new();

    for candidate in candidates {
        let candidate_cell = &mesh.elem(candidate).cell;

        if let Some(min_size) = min_elem_size {
            if candidate_cell.size(X_DIM) < min_size {
                if gnomon.is_none() {
                    gnomon = Some(GnomonBspline::new(
                        center.left(),
                        center.down(),
                        (candidate_cell.middle(X_DIM) - center.left()).signum() * min_size,
                        (candidate_cell.middle(Y_DIM) - center.down()).signum() * min_size,
                    ));
                }
                continue;
            }
        }

        tag_support(mesh, order, candidate, elem_id, &mut explored);
    }

    match gnomon {
        Some(gnomon) => BsplineChoice::Gnomon(gnomon),
        None => BsplineChoice::Regular(TensorBspline::from_support(&center, &support)),
    }
}

// tag `elem_id` and (for orders above 2) the supports of order - 1 around it
fn tag_support(
    mesh: &mut FrozenMesh,
    order: usize,
    elem_id: usize,
    bspline: usize,
    explored: &mut BTreeMap<usize, usize>,
) {
    mesh.tag_bspline(elem_id, bspline);

    if order <= 2 {
        return;
    }
    // a center explored with at least this order already tagged everything this call would
    if explored.get(&elem_id).map_or(false, |done| *done >= order) {
        return;
    }
    explored.insert(elem_id, order);

    let support = mesh.support_cell(elem_id);
    let candidates: SmallVec<[usize; 16]> = mesh
        .solid_elems_within(&support)
        .map(|elem| elem.num)
        .collect();

    for candidate in candidates {
        tag_support(mesh, order - 1, candidate, bspline, explored);
    }
}

// half of the left neighbor's width, if the gnomon test applies to this Elem
fn gnomon_threshold(mesh: &FrozenMesh, mesh_type: MeshType, elem_id: usize) -> Option<Coord> {
    let elem = mesh.elem(elem_id);
    if mesh_type != MeshType::Edged4 || !elem.cell.is_point() {
        return None;
    }

    match elem.neighbor(LEFT) {
        Some(neighbor_id) => {
            let min_size = mesh.elem(neighbor_id).cell.size(X_DIM) / 2;
            if min_size > 1 {
                Some(min_size)
            } else {
                None
            }
        }
        None => {
            warn!(
                "{} has no left neighbor; building a regular B-spline around it",
                elem
            );
            None
        }
    }
}

/// The quadrant of `support` that faces the center of `root`, as seen from `elem`.
///
/// A B-spline centered near a singularity is not defined over this region of its support.
pub fn undefined_quadrant(elem: &Cell, support: &Cell, root: &Cell) -> Cell {
    let (mid_x, mid_y) = (support.middle(X_DIM), support.middle(Y_DIM));

    let x_range: [Coord; 2] = if elem.left() < root.middle(X_DIM) {
        [mid_x, support.right()]
    } else {
        [support.left(), mid_x]
    };
    let y_range: [Coord; 2] = if elem.up() < root.middle(Y_DIM) {
        [mid_y, support.down()]
    } else {
        [support.up(), mid_y]
    };

    Cell::new_2d(x_range[0], x_range[1], y_range[0], y_range[1])
}
