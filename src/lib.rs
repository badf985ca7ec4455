//! Graded rectangular meshes around point singularities.
//!
//! A [Domain] is built from a [MeshConfig] in four steps:
//! * the root box is refined towards its center ([domain::mesh::refinement])
//! * the Mesh is frozen, resolving the neighbors of every Cell ([domain::mesh::adjacency])
//! * one B-spline is computed per Elem, regular or gnomon ([domain::bspline])
//! * an elimination tree is built over the solid Elems ([domain::tree])
//!
//! The result can be printed in several line-oriented formats ([domain::views]) or exported to JSON.

/// Mesh, B-spline and output configuration
pub mod config;
/// The Domain pipeline and its components
pub mod domain;

pub use config::{ConfigError, MeshConfig, MeshShape, MeshType, OutputView};
pub use domain::{
    bspline::{BsplineChoice, GnomonBspline, TensorBspline},
    mesh::{cell::Cell, elem::Elem, FrozenMesh, Mesh},
    tree::{EliminationTree, TreeNode},
    Domain, DomainError,
};
