// Core types shared across the simulation.
//
// Defines grid coordinates (`Location`), organism identifiers, the closed
// `Species` catalogue, and the `Occupant` handle the field stores per cell.
// All types derive `Serialize` and `Deserialize` so configs can name species
// and whole simulation states can be cloned through a serializer.
//
// **Critical constraint: determinism.** `OrganismId`s are allocated from a
// monotonic counter, never from randomness or addresses, so roster order is
// a pure function of the order organisms were created.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A cell coordinate in the field. Row 0 is the top edge, column 0 the left.
///
/// Signed so that neighbor arithmetic at the edges can step to -1 and be
/// rejected by `Field::in_bounds` instead of wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub row: i32,
    pub col: i32,
}

impl Location {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Offset by `(d_row, d_col)`. The result may lie outside any field.
    pub const fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }

    /// True if `other` is one of the 8 cells surrounding `self`.
    pub fn is_adjacent_to(self, other: Self) -> bool {
        self != other && (self.row - other.row).abs() <= 1 && (self.col - other.col).abs() <= 1
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// Organism identity
// ---------------------------------------------------------------------------

/// Stable handle to an organism in the roster. Allocated in increasing
/// order, so sorting by id is sorting by creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismId(pub u64);

impl fmt::Display for OrganismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrganismId({})", self.0)
    }
}

/// The species catalogue. Closed: every behavioral difference between
/// species is data (see `species.rs` and the predation graph in
/// `config.rs`), so adding a species means adding a variant and its
/// defaults, not new code paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    /// Grazing prey.
    Rabbit,
    /// Small predator.
    Fox,
    /// Large predator.
    Bear,
    /// Apex hunter.
    Hunter,
}

impl Species {
    /// Every species, in catalogue order.
    pub const ALL: [Species; 4] = [Species::Rabbit, Species::Fox, Species::Bear, Species::Hunter];

    pub fn name(self) -> &'static str {
        match self {
            Species::Rabbit => "Rabbit",
            Species::Fox => "Fox",
            Species::Bear => "Bear",
            Species::Hunter => "Hunter",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the field records for an occupied cell: who is there and what they
/// are. The species rides along so census and prey scans never have to
/// consult the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: OrganismId,
    pub species: Species,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_equality_is_by_coordinates() {
        assert_eq!(Location::new(3, 4), Location::new(3, 4));
        assert_ne!(Location::new(3, 4), Location::new(4, 3));
    }

    #[test]
    fn location_ordering_is_row_major() {
        assert!(Location::new(0, 9) < Location::new(1, 0));
        assert!(Location::new(1, 0) < Location::new(1, 1));
    }

    #[test]
    fn adjacency_covers_eight_neighbors() {
        let center = Location::new(5, 5);
        let mut neighbors = 0;
        for row in 3..=7 {
            for col in 3..=7 {
                if center.is_adjacent_to(Location::new(row, col)) {
                    neighbors += 1;
                }
            }
        }
        assert_eq!(neighbors, 8);
        assert!(!center.is_adjacent_to(center));
    }

    #[test]
    fn species_catalogue_order() {
        let mut sorted = Species::ALL;
        sorted.sort();
        assert_eq!(sorted, Species::ALL);
        assert_eq!(Species::Hunter.to_string(), "Hunter");
    }

    #[test]
    fn species_serializes_by_name() {
        let json = serde_json::to_string(&Species::Bear).unwrap();
        assert_eq!(json, "\"Bear\"");
    }
}
