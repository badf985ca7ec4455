use crate::domain::mesh::cell::Coord;

use json::JsonValue;
use std::fmt;
use std::fs::read_to_string;
use std::str::FromStr;

/// Deepest supported refinement. The domain size grows as `2^depth`
pub const MAX_REFINEMENT_DEPTH: usize = 16;
/// Highest supported B-spline order
pub const MAX_BSPLINE_ORDER: usize = 6;

/// Shape of the root domain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshShape {
    /// `[0, S] x [0, S]`, refined towards its center
    Quadratic,
    /// `[0, 3S/2] x [0, S]`, refined towards its center then trimmed to `[S/2, S] x [0, S]`
    Rectangular,
}

/// Pattern of edges and vertices inserted between refinement levels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshType {
    /// no edges or vertices
    Unedged,
    /// 4 edge segments per side of every inner box, plus its corner vertices
    Edged4,
    /// like `Edged4`, with the middle segments bisected and the rings around the midlines refined
    Edged8,
}

/// The textual view printed once the Domain is built
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputView {
    DrawNeighbors,
    DrawPlain,
    DrawSupports,
    Galois,
    Gnuplot,
    Knots,
    DrawTree,
}

macro_rules! keyword_enum {
    ($name:ident, $err:ident, { $($variant:ident => $keyword:literal),+ $(,)? }) => {
        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($keyword => Ok(Self::$variant),)+
                    _ => Err(ConfigError::$err(s.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $keyword),)+
                }
            }
        }
    };
}

keyword_enum!(MeshShape, UnknownShape, {
    Quadratic => "quadratic",
    Rectangular => "rectangular",
});

keyword_enum!(MeshType, UnknownMeshType, {
    Unedged => "unedged",
    Edged4 => "edged-4",
    Edged8 => "edged-8",
});

keyword_enum!(OutputView, UnknownView, {
    DrawNeighbors => "draw-neighbors",
    DrawPlain => "draw-plain",
    DrawSupports => "draw-supports",
    Galois => "galois",
    Gnuplot => "gnuplot",
    Knots => "knots",
    DrawTree => "draw-tree",
});

/// Everything needed to build a Domain and choose its output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshConfig {
    pub shape: MeshShape,
    pub mesh_type: MeshType,
    /// number of refinement levels (at least 1)
    pub depth: usize,
    /// B-spline order (at least 2)
    pub order: usize,
    pub view: OutputView,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            shape: MeshShape::Quadratic,
            mesh_type: MeshType::Edged4,
            depth: 3,
            order: 2,
            view: OutputView::Galois,
        }
    }
}

impl MeshConfig {
    /// Reject configurations that the Domain cannot be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 || self.depth > MAX_REFINEMENT_DEPTH {
            return Err(ConfigError::InvalidDepth(self.depth));
        }
        if self.order < 2 || self.order > MAX_BSPLINE_ORDER {
            return Err(ConfigError::InvalidOrder(self.order));
        }
        if self.shape == MeshShape::Rectangular && self.mesh_type != MeshType::Edged4 {
            return Err(ConfigError::UnsupportedCombination {
                shape: self.shape,
                mesh_type: self.mesh_type,
            });
        }
        Ok(())
    }

    /// Side length `S` of the root domain; chosen so that the smallest Cells are 1x1 (2x2 for the galois view)
    pub fn domain_size(&self) -> Coord {
        let base: Coord = match self.view {
            OutputView::Galois => 4,
            _ => 2,
        };
        base << self.depth
    }

    /// Load a configuration from a JSON file.
    ///
    /// All keys are optional; missing keys keep their default values:
    /// ```JSON
    /// {
    ///     "shape": "quadratic",
    ///     "mesh_type": "edged-4",
    ///     "depth": 3,
    ///     "order": 2,
    ///     "view": "galois"
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        let contents = read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        let config = Self::from_json(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let parsed = json::parse(contents).map_err(|err| ConfigError::Json(err.to_string()))?;
        let mut config = Self::default();

        if let Some(shape) = keyword(&parsed, "shape")? {
            config.shape = shape.parse()?;
        }
        if let Some(mesh_type) = keyword(&parsed, "mesh_type")? {
            config.mesh_type = mesh_type.parse()?;
        }
        if let Some(depth) = number(&parsed, "depth")? {
            config.depth = depth;
        }
        if let Some(order) = number(&parsed, "order")? {
            config.order = order;
        }
        if let Some(view) = keyword(&parsed, "view")? {
            config.view = view.parse()?;
        }

        Ok(config)
    }
}

fn keyword<'a>(parsed: &'a JsonValue, key: &str) -> Result<Option<&'a str>, ConfigError> {
    let value = &parsed[key];
    if value.is_null() {
        Ok(None)
    } else {
        value
            .as_str()
            .map(Some)
            .ok_or_else(|| ConfigError::Json(format!("\"{}\" must be a string", key)))
    }
}

fn number(parsed: &JsonValue, key: &str) -> Result<Option<usize>, ConfigError> {
    let value = &parsed[key];
    if value.is_null() {
        Ok(None)
    } else {
        value
            .as_usize()
            .map(Some)
            .ok_or_else(|| ConfigError::Json(format!("\"{}\" must be a non-negative integer", key)))
    }
}

impl fmt::Display for MeshConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} mesh (depth: {}, order: {}, view: {})",
            self.shape, self.mesh_type, self.depth, self.order, self.view
        )
    }
}

/// The Error Type for invalid configurations
#[derive(Debug)]
pub enum ConfigError {
    InvalidDepth(usize),
    InvalidOrder(usize),
    UnsupportedCombination {
        shape: MeshShape,
        mesh_type: MeshType,
    },
    UnknownShape(String),
    UnknownMeshType(String),
    UnknownView(String),
    Io(std::io::Error),
    Json(String),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidDepth(depth) => write!(
                f,
                "Refinement depth must be between 1 and {}; got {}!",
                MAX_REFINEMENT_DEPTH, depth
            ),
            Self::InvalidOrder(order) => write!(
                f,
                "B-spline order must be between 2 and {}; got {}!",
                MAX_BSPLINE_ORDER, order
            ),
            Self::UnsupportedCombination { shape, mesh_type } => write!(
                f,
                "Cannot build a {} mesh with the {} pattern!",
                shape, mesh_type
            ),
            Self::UnknownShape(s) => write!(
                f,
                "Unknown mesh shape \"{}\" (expected quadratic or rectangular)",
                s
            ),
            Self::UnknownMeshType(s) => write!(
                f,
                "Unknown mesh type \"{}\" (expected unedged, edged-4 or edged-8)",
                s
            ),
            Self::UnknownView(s) => write!(f, "Unknown output view \"{}\"", s),
            Self::Io(err) => write!(f, "Unable to read config file: {}", err),
            Self::Json(msg) => write!(f, "Invalid config file: {}", msg),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
