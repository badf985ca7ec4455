use super::cell::Cell;
#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use smallvec::SmallVec;
use std::fmt;

/// The expected number of B-splines whose support covers a single `Elem`. Determines the stack allocation size of the tag list
pub const EXPECTED_BSPLINES_PER_ELEM: usize = 16;

/// Refinement level of a solid `Elem` and its (1-based) id within that level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelId {
    pub level: usize,
    pub id: usize,
}

/// `Elem`s are the entries of a frozen Mesh
///
/// Each `Elem` wraps the [Cell] produced by refinement and keeps track of:
/// * Its sequence number (position in the Mesh)
/// * Its refinement level and id within that level (solid `Elem`s only)
/// * The neighboring `Elem` across each face (if any)
/// * The B-splines whose support covers it
#[derive(Debug, Clone)]
pub struct Elem {
    pub num: usize,
    pub cell: Cell,
    pub level_id: Option<LevelId>,
    pub(crate) neighbors: SmallVec<[Option<usize>; 4]>,
    pub(crate) bsplines: SmallVec<[usize; EXPECTED_BSPLINES_PER_ELEM]>,
}

impl Elem {
    pub(crate) fn new(
        num: usize,
        cell: Cell,
        level_id: Option<LevelId>,
        neighbors: SmallVec<[Option<usize>; 4]>,
    ) -> Self {
        assert_eq!(
            neighbors.len(),
            cell.face_count(),
            "Elem {} needs one neighbor slot per face!",
            num
        );

        Self {
            num,
            cell,
            level_id,
            neighbors,
            bsplines: SmallVec::new(),
        }
    }

    /// Id of the neighboring `Elem` across `face`
    pub fn neighbor(&self, face: usize) -> Option<usize> {
        self.neighbors[face]
    }

    pub fn neighbors(&self) -> &[Option<usize>] {
        &self.neighbors
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.iter().flatten().count()
    }

    /// Indices of the B-splines whose support covers this `Elem`
    pub fn bsplines(&self) -> &[usize] {
        &self.bsplines
    }

    // returns false if the B-spline was already present
    pub(crate) fn add_bspline(&mut self, bspline: usize) -> bool {
        if self.bsplines.contains(&bspline) {
            false
        } else {
            self.bsplines.push(bspline);
            true
        }
    }

    pub(crate) fn clear_bsplines(&mut self) {
        self.bsplines.clear();
    }

    pub fn non_empty(&self) -> bool {
        self.cell.non_empty()
    }

    /// Produce a Json Object that describes this Elem
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "num": self.num,
            "bounds": self.cell.bounds().to_vec(),
            "level": self.level_id.map(|lid| lid.level),
            "id": self.level_id.map(|lid| lid.id),
            "neighbors": self.neighbors.to_vec(),
            "bsplines": self.bsplines.to_vec(),
        }
    }
}

impl fmt::Display for Elem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Elem {} [{}]", self.num, self.cell)?;
        if let Some(LevelId { level, id }) = self.level_id {
            write!(f, " (level {}, id {})", level, id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn bspline_tags_are_duplicate_safe() {
        let mut elem = Elem::new(0, Cell::new_2d(0, 1, 0, 1), None, smallvec![None; 4]);

        assert!(elem.add_bspline(3));
        assert!(elem.add_bspline(1));
        assert!(!elem.add_bspline(3));
        assert_eq!(elem.bsplines(), &[3, 1]);

        elem.clear_bsplines();
        assert!(elem.bsplines().is_empty());
    }

    #[test]
    fn neighbor_slots() {
        let elem = Elem::new(
            2,
            Cell::new_2d(0, 1, 0, 1),
            Some(LevelId { level: 1, id: 1 }),
            smallvec![None, Some(4), Some(0), None],
        );

        assert_eq!(elem.neighbor_count(), 2);
        assert_eq!(elem.neighbor(1), Some(4));
        assert_eq!(elem.to_string(), "Elem 2 [0 1 0 1] (level 1, id 1)");
    }

    #[test]
    #[should_panic]
    fn missing_neighbor_slots() {
        Elem::new(0, Cell::new_2d(0, 1, 0, 1), None, smallvec![None; 2]);
    }
}
