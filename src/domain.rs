/// B-spline supports (regular tensor-product splines and gnomons)
pub mod bspline;
/// The internal geometric structure of a Domain
pub mod mesh;
/// Elimination trees over a frozen Mesh
pub mod tree;
/// Line-oriented textual output of a Domain
pub mod views;

use crate::config::{ConfigError, MeshConfig, MeshShape, MeshType, OutputView};
use bspline::{compute_bspline_supports, BsplineChoice};
use mesh::{
    cell::{Cell, Coord, X_DIM, Y_DIM},
    FrozenMesh, Mesh,
};
use tree::EliminationTree;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use log::info;
use std::fmt;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;
use std::io::Write;

/// A graded Mesh around a point singularity, along with its B-splines and elimination tree
pub struct Domain {
    pub config: MeshConfig,
    pub mesh: FrozenMesh,
    /// One B-spline per Elem (empty unless the output view needs them)
    pub bsplines: Vec<BsplineChoice>,
    pub tree: EliminationTree,
}

impl Domain {
    /// Run the whole pipeline for a configuration: refine, freeze (resolving neighbors), compute B-spline supports
    /// and build the elimination tree.
    ///
    /// Returns an error if the configuration is invalid; nothing is constructed in that case.
    pub fn build(config: MeshConfig) -> Result<Self, DomainError> {
        config.validate()?;
        info!("Building {}", config);

        let mut mesh = Self::refine(&config).freeze();

        let bsplines = if needs_bsplines(config.view) {
            compute_bspline_supports(&mut mesh, config.mesh_type, config.order)
        } else {
            Vec::new()
        };

        let tree = match config.shape {
            MeshShape::Quadratic => EliminationTree::for_quadratic(&mesh, config.depth),
            MeshShape::Rectangular => EliminationTree::for_rectangular(&mesh),
        };

        Ok(Self {
            config,
            mesh,
            bsplines,
            tree,
        })
    }

    /// Produce the graded (not yet frozen) Mesh described by a configuration.
    ///
    /// A 4x4 (quadratic) or 6x4 (rectangular) grid is refined `depth - 1` times towards the center of the domain.
    /// On every level, edges and corner vertices are inserted around the refined box (unless the mesh is unedged).
    /// Rectangular meshes are finally trimmed down to `[S/2, S] x [0, S]`.
    pub fn refine(config: &MeshConfig) -> Mesh {
        let size = config.domain_size();
        let mesh = match config.shape {
            MeshShape::Quadratic => refine_quadratic(config, size),
            MeshShape::Rectangular => refine_rectangular(config, size),
        };

        info!(
            "Refined a {} {} domain of size {}: {} Cells ({} solid)",
            config.shape,
            config.mesh_type,
            size,
            mesh.len(),
            mesh.count_non_empty()
        );
        mesh
    }

    /// Print the view selected by the configuration
    pub fn write_view<W: Write>(&self, w: &mut W) -> Result<(), DomainError> {
        match self.config.view {
            OutputView::DrawNeighbors => views::write_tweaked_neighbors(w, &self.mesh)?,
            OutputView::DrawPlain | OutputView::Gnuplot => views::write_elems(w, &self.mesh)?,
            OutputView::DrawSupports => {
                views::write_elems(w, &self.mesh)?;
                views::write_supports(w, &self.mesh)?;
            }
            OutputView::Knots => {
                views::write_elems(w, &self.mesh)?;
                views::write_knots(w, &self.bsplines)?;
            }
            OutputView::Galois => views::write_galois(w, &self.mesh, &self.tree)?,
            OutputView::DrawTree => views::write_cut_off_bands(w, &self.mesh, &self.tree)?,
        }
        Ok(())
    }

    /// Support box of each B-spline
    pub fn bspline_supports(&self) -> Vec<Cell> {
        self.bsplines.iter().map(|bspline| bspline.support()).collect()
    }

    /// `(tree node, B-spline)` pairs in the order a frontal solver can assemble them
    pub fn bspline_schedule(&self) -> Vec<(usize, usize)> {
        self.tree.bspline_schedule(&self.bspline_supports())
    }

    #[cfg(feature = "json_export")]
    fn bsplines_to_json(&self) -> JsonValue {
        JsonValue::from(
            self.bsplines
                .iter()
                .enumerate()
                .map(|(i, choice)| {
                    let support = choice.support();
                    let undefined = bspline::undefined_quadrant(
                        &self.mesh.elem(i).cell,
                        &support,
                        self.mesh.root(),
                    );

                    let mut entry = match choice {
                        BsplineChoice::Regular(regular) => object! {
                            "kind": "regular",
                            "x_knots": regular.x_knots().to_vec(),
                            "y_knots": regular.y_knots().to_vec(),
                        },
                        BsplineChoice::Gnomon(gnomon) => object! {
                            "kind": "gnomon",
                            "x_mid": gnomon.x_mid,
                            "y_mid": gnomon.y_mid,
                            "shift_x": gnomon.shift_x,
                            "shift_y": gnomon.shift_y,
                        },
                    };
                    entry["support"] = support.bounds().to_vec().into();
                    entry["undefined_quadrant"] = undefined.bounds().to_vec().into();
                    entry
                })
                .collect::<Vec<_>>(),
        )
    }

    /// Print the Domain (Mesh, B-splines and elimination tree) to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> Result<(), DomainError> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let domain_object = object! {
            "Config": object! {
                "shape": self.config.shape.to_string(),
                "mesh_type": self.config.mesh_type.to_string(),
                "depth": self.config.depth,
                "order": self.config.order,
            },
            "Root": self.mesh.root().bounds().to_vec(),
            "Extent": self.mesh.extent().bounds().to_vec(),
            "Elems": self.mesh.to_json(),
            "BSplines": self.bsplines_to_json(),
            "Tree": self.tree.to_json(),
        };

        domain_object.write_pretty(&mut w, 4)?;
        w.flush()?;

        Ok(())
    }
}

fn needs_bsplines(view: OutputView) -> bool {
    matches!(
        view,
        OutputView::DrawSupports | OutputView::Knots | OutputView::Galois
    )
}

fn refine_quadratic(config: &MeshConfig, size: Coord) -> Mesh {
    let root = Cell::new_2d(0, size, 0, size);
    let mut mesh = Mesh::new(root.clone());
    let edged_8 = config.mesh_type == MeshType::Edged8;

    // 1 -> 4 -> 16 Cells
    mesh.split_all_elements_into_4();
    mesh.split_all_elements_into_4();
    if edged_8 && config.depth > 1 {
        mesh.split_eight_sides(&root);
    }

    let middle = size / 2;
    let mut edge_offset = size / 4;
    let mut outer = root;

    for i in 1..config.depth {
        let inner = Cell::new_2d(
            middle - edge_offset,
            middle + edge_offset,
            middle - edge_offset,
            middle + edge_offset,
        );

        if config.mesh_type != MeshType::Unedged {
            mesh.add_edge(X_DIM, &outer, inner.up(), 4, edged_8);
            mesh.add_edge(X_DIM, &outer, inner.down(), 4, edged_8);
            mesh.add_edge(Y_DIM, &outer, inner.left(), 4, edged_8);
            mesh.add_edge(Y_DIM, &outer, inner.right(), 4, edged_8);
            mesh.add_corner_vertices(&inner);
        }

        mesh.split_all_into_4(&inner);
        if edged_8 && i + 1 < config.depth {
            mesh.split_eight_sides(&inner);
        }

        edge_offset /= 2;
        outer = inner;
    }

    mesh
}

fn refine_rectangular(config: &MeshConfig, size: Coord) -> Mesh {
    let root = Cell::new_2d(0, 3 * size / 2, 0, size);
    let mut mesh = Mesh::new(root.clone());

    // 1 -> 6 -> 24 Cells
    mesh.split_all_elements_into_6();
    mesh.split_all_elements_into_4();

    let mut edge_offset = size / 4;
    let mut horizontal_segments = 6;
    let mut outer = root;

    for _ in 1..config.depth {
        let inner = outer.shrunk(edge_offset);

        mesh.add_edge(X_DIM, &outer, inner.up(), horizontal_segments, false);
        mesh.add_edge(X_DIM, &outer, inner.down(), horizontal_segments, false);
        mesh.add_edge(Y_DIM, &outer, inner.left(), 4, false);
        mesh.add_edge(Y_DIM, &outer, inner.right(), 4, false);
        mesh.add_corner_vertices(&inner);

        mesh.split_all_into_4(&inner);

        horizontal_segments = (horizontal_segments - 2) * 2;
        edge_offset /= 2;
        outer = inner;
    }

    mesh.remove_not_contained_in(&Cell::new_2d(size / 2, size, 0, size));
    mesh
}

/// The Error Type for building and printing a Domain
#[derive(Debug)]
pub enum DomainError {
    Config(ConfigError),
    Io(std::io::Error),
}

impl std::error::Error for DomainError {}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{}; Cannot build Domain!", err),
            Self::Io(err) => write!(f, "Unable to write Domain output: {}", err),
        }
    }
}

impl From<ConfigError> for DomainError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct IdTracker {
    next_id: usize,
}

impl IdTracker {
    pub fn new(start: usize) -> Self {
        Self { next_id: start }
    }

    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id - 1
    }
}
