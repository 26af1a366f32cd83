// Dense 2D occupancy grid: the simulation's spatial truth.
//
// The field is stored as a flat `Vec<Option<Occupant>>` indexed by
// `row * width + col`, giving O(1) reads and writes. Each cell holds at most
// one `Occupant` (an `OrganismId` plus its species). The field never owns
// organisms; the roster in `organism.rs` does. An entry exists only while the
// organism is alive and standing there: every death and every move vacates
// the old cell in the same operation.
//
// Neighborhoods are the 8 surrounding cells, clipped at the edges (the field
// does not wrap). Random neighbor choice filters first and then makes a
// single draw over the survivors, so every eligible cell is equally likely.
//
// See also: `organism.rs` for the act step that moves organisms through the
// field, `stats.rs` for the census sweep.
//
// **Critical constraint: determinism.** Neighbor candidates are always
// enumerated in the same fixed order (row-major offsets), so a given RNG
// state always selects the same cell.

use crate::prng::SimRng;
use crate::types::{Location, Occupant, OrganismId, Species};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Up to 8 neighbor cells, kept inline.
pub type Neighbors = SmallVec<[Location; 8]>;

/// Row-major offsets of the 8-neighborhood.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Contract violations on field writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("cell {location} is already occupied by {occupant}")]
    OccupiedCell {
        location: Location,
        occupant: OrganismId,
    },
    #[error("location {location} lies outside the {depth}x{width} field")]
    OutOfBounds {
        location: Location,
        depth: u32,
        width: u32,
    },
}

/// The rectangular grid of single-occupant cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Flat storage: index = row * width + col.
    cells: Vec<Option<Occupant>>,
    depth: u32,
    width: u32,
}

impl Field {
    /// Create an empty field.
    pub fn new(depth: u32, width: u32) -> Self {
        let total = (depth as usize) * (width as usize);
        Self {
            cells: vec![None; total],
            depth,
            width,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn in_bounds(&self, loc: Location) -> bool {
        loc.row >= 0 && loc.col >= 0 && (loc.row as u32) < self.depth && (loc.col as u32) < self.width
    }

    fn index(&self, loc: Location) -> Option<usize> {
        self.in_bounds(loc)
            .then(|| loc.row as usize * self.width as usize + loc.col as usize)
    }

    /// The occupant of `loc`, or `None` for empty and out-of-bounds cells.
    pub fn occupant_at(&self, loc: Location) -> Option<Occupant> {
        self.index(loc).and_then(|i| self.cells[i])
    }

    /// True for in-bounds cells with no occupant.
    pub fn is_free(&self, loc: Location) -> bool {
        self.index(loc).is_some_and(|i| self.cells[i].is_none())
    }

    /// Record `occupant` at `loc`. Fails without side effects if the cell is
    /// taken or out of bounds.
    pub fn place(&mut self, occupant: Occupant, loc: Location) -> Result<(), FieldError> {
        let i = self.index(loc).ok_or(FieldError::OutOfBounds {
            location: loc,
            depth: self.depth,
            width: self.width,
        })?;
        if let Some(existing) = self.cells[i] {
            return Err(FieldError::OccupiedCell {
                location: loc,
                occupant: existing.id,
            });
        }
        self.cells[i] = Some(occupant);
        Ok(())
    }

    /// Clear `loc`, returning whoever was there. Idempotent; no-op out of
    /// bounds.
    pub fn vacate(&mut self, loc: Location) -> Option<Occupant> {
        self.index(loc).and_then(|i| self.cells[i].take())
    }

    /// Clear `loc` only if `id` is the one standing there.
    pub fn vacate_occupant(&mut self, loc: Location, id: OrganismId) -> bool {
        match self.index(loc) {
            Some(i) if self.cells[i].is_some_and(|o| o.id == id) => {
                self.cells[i] = None;
                true
            }
            _ => false,
        }
    }

    /// Empty every cell. Organisms themselves are untouched; the caller
    /// clears the roster.
    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// In-bounds neighbors of `loc`, in row-major order.
    pub fn adjacent_locations(&self, loc: Location) -> Neighbors {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dr, dc)| loc.offset(dr, dc))
            .filter(|&n| self.in_bounds(n))
            .collect()
    }

    /// Free in-bounds neighbors of `loc`, in row-major order.
    pub fn free_adjacent_locations(&self, loc: Location) -> Neighbors {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dr, dc)| loc.offset(dr, dc))
            .filter(|&n| self.is_free(n))
            .collect()
    }

    /// One free neighbor chosen uniformly at random, or `None` if every
    /// neighbor is taken or off the field. Draws from `rng` only when there
    /// is a choice to make.
    pub fn free_adjacent_location(&self, loc: Location, rng: &mut SimRng) -> Option<Location> {
        let free = self.free_adjacent_locations(loc);
        rng.pick(free.as_slice()).copied()
    }

    /// Neighbors of `loc` whose occupant's species satisfies `matches`.
    ///
    /// Lazy and stateless: each call rescans the neighborhood.
    pub fn adjacent_occupants_of<'a, F>(
        &'a self,
        loc: Location,
        matches: F,
    ) -> impl Iterator<Item = (Location, Occupant)> + 'a
    where
        F: Fn(Species) -> bool + 'a,
    {
        NEIGHBOR_OFFSETS.iter().filter_map(move |&(dr, dc)| {
            let n = loc.offset(dr, dc);
            self.occupant_at(n)
                .filter(|o| matches(o.species))
                .map(|o| (n, o))
        })
    }

    /// One full sweep in row-major order: every cell with the species
    /// standing there, if any. This is the renderer's only view of the grid.
    pub fn cells(&self) -> impl Iterator<Item = (Location, Option<Species>)> + '_ {
        let width = self.width.max(1) as usize;
        self.cells.iter().enumerate().map(move |(i, cell)| {
            let loc = Location::new((i / width) as i32, (i % width) as i32);
            (loc, cell.map(|o| o.species))
        })
    }

    /// Occupied cells with their occupants, in row-major order.
    pub fn occupants(&self) -> impl Iterator<Item = (Location, Occupant)> + '_ {
        self.cells()
            .zip(self.cells.iter())
            .filter_map(|((loc, _), cell)| cell.map(|o| (loc, o)))
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant(id: u64, species: Species) -> Occupant {
        Occupant {
            id: OrganismId(id),
            species,
        }
    }

    #[test]
    fn new_field_is_empty() {
        let field = Field::new(4, 6);
        assert_eq!(field.occupied_count(), 0);
        assert_eq!(field.cells().count(), 24);
        assert!(field.cells().all(|(_, s)| s.is_none()));
    }

    #[test]
    fn place_and_lookup() {
        let mut field = Field::new(8, 8);
        let loc = Location::new(3, 5);
        field.place(occupant(1, Species::Fox), loc).unwrap();
        assert_eq!(field.occupant_at(loc), Some(occupant(1, Species::Fox)));
        assert_eq!(field.occupant_at(Location::new(3, 6)), None);
    }

    #[test]
    fn place_on_occupied_cell_fails() {
        let mut field = Field::new(4, 4);
        let loc = Location::new(1, 1);
        field.place(occupant(1, Species::Rabbit), loc).unwrap();
        let err = field.place(occupant(2, Species::Fox), loc).unwrap_err();
        assert_eq!(
            err,
            FieldError::OccupiedCell {
                location: loc,
                occupant: OrganismId(1)
            }
        );
        // The original occupant is untouched.
        assert_eq!(field.occupant_at(loc).unwrap().id, OrganismId(1));
    }

    #[test]
    fn place_out_of_bounds_fails() {
        let mut field = Field::new(4, 4);
        let err = field
            .place(occupant(1, Species::Rabbit), Location::new(4, 0))
            .unwrap_err();
        assert!(matches!(err, FieldError::OutOfBounds { .. }));
        assert!(field.place(occupant(1, Species::Rabbit), Location::new(-1, 0)).is_err());
    }

    #[test]
    fn vacate_is_idempotent() {
        let mut field = Field::new(4, 4);
        let loc = Location::new(2, 2);
        field.place(occupant(1, Species::Bear), loc).unwrap();
        assert!(field.vacate(loc).is_some());
        assert!(field.vacate(loc).is_none());
        assert!(field.vacate(Location::new(99, 99)).is_none());
        assert!(field.is_free(loc));
    }

    #[test]
    fn vacate_occupant_checks_identity() {
        let mut field = Field::new(4, 4);
        let loc = Location::new(0, 0);
        field.place(occupant(7, Species::Fox), loc).unwrap();
        assert!(!field.vacate_occupant(loc, OrganismId(8)));
        assert!(field.occupant_at(loc).is_some());
        assert!(field.vacate_occupant(loc, OrganismId(7)));
        assert!(field.is_free(loc));
    }

    #[test]
    fn corner_has_three_neighbors() {
        let field = Field::new(10, 10);
        assert_eq!(field.adjacent_locations(Location::new(0, 0)).len(), 3);
        assert_eq!(field.adjacent_locations(Location::new(9, 9)).len(), 3);
        assert_eq!(field.adjacent_locations(Location::new(0, 5)).len(), 5);
        assert_eq!(field.adjacent_locations(Location::new(5, 5)).len(), 8);
    }

    #[test]
    fn free_adjacent_location_respects_occupancy() {
        let mut field = Field::new(3, 3);
        let center = Location::new(1, 1);
        let mut id = 0;
        for loc in field.adjacent_locations(center) {
            if loc != Location::new(2, 2) {
                id += 1;
                field.place(occupant(id, Species::Rabbit), loc).unwrap();
            }
        }
        let mut rng = SimRng::new(5);
        for _ in 0..20 {
            assert_eq!(
                field.free_adjacent_location(center, &mut rng),
                Some(Location::new(2, 2))
            );
        }
        field.place(occupant(99, Species::Rabbit), Location::new(2, 2)).unwrap();
        assert_eq!(field.free_adjacent_location(center, &mut rng), None);
    }

    #[test]
    fn free_adjacent_location_covers_all_candidates() {
        let field = Field::new(5, 5);
        let center = Location::new(2, 2);
        let mut rng = SimRng::new(11);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            let loc = field.free_adjacent_location(center, &mut rng).unwrap();
            assert!(center.is_adjacent_to(loc));
            seen.insert(loc);
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn free_adjacent_location_is_seed_deterministic() {
        let field = Field::new(5, 5);
        let center = Location::new(2, 2);
        let mut a = SimRng::new(77);
        let mut b = SimRng::new(77);
        for _ in 0..50 {
            assert_eq!(
                field.free_adjacent_location(center, &mut a),
                field.free_adjacent_location(center, &mut b)
            );
        }
    }

    #[test]
    fn adjacent_occupants_filter_by_species() {
        let mut field = Field::new(5, 5);
        let center = Location::new(2, 2);
        field.place(occupant(1, Species::Rabbit), Location::new(1, 1)).unwrap();
        field.place(occupant(2, Species::Fox), Location::new(1, 2)).unwrap();
        field.place(occupant(3, Species::Rabbit), Location::new(3, 3)).unwrap();
        // Not adjacent.
        field.place(occupant(4, Species::Rabbit), Location::new(0, 0)).unwrap();

        let rabbits: Vec<_> = field
            .adjacent_occupants_of(center, |s| s == Species::Rabbit)
            .map(|(_, o)| o.id)
            .collect();
        assert_eq!(rabbits, vec![OrganismId(1), OrganismId(3)]);

        // Restartable: a second call sees the same thing.
        assert_eq!(
            field
                .adjacent_occupants_of(center, |s| s == Species::Rabbit)
                .count(),
            2
        );
        assert_eq!(field.adjacent_occupants_of(center, |_| false).count(), 0);
    }

    #[test]
    fn clear_empties_every_cell() {
        let mut field = Field::new(3, 3);
        field.place(occupant(1, Species::Fox), Location::new(0, 0)).unwrap();
        field.place(occupant(2, Species::Bear), Location::new(2, 2)).unwrap();
        field.clear();
        assert_eq!(field.occupied_count(), 0);
        assert_eq!((field.depth(), field.width()), (3, 3));
    }

    #[test]
    fn cells_sweep_is_row_major() {
        let mut field = Field::new(2, 3);
        field.place(occupant(1, Species::Hunter), Location::new(1, 2)).unwrap();
        let sweep: Vec<_> = field.cells().collect();
        assert_eq!(sweep[0].0, Location::new(0, 0));
        assert_eq!(sweep[3].0, Location::new(1, 0));
        assert_eq!(sweep[5], (Location::new(1, 2), Some(Species::Hunter)));
        let occupied: Vec<_> = field.occupants().collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].0, Location::new(1, 2));
    }
}
