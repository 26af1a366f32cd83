// Organisms, the roster that owns them, and the per-step act.
//
// An `Organism` is plain data: id, species, age, alive flag, location and
// an optional food level. It holds no reference to the field; the field
// holds `Occupant` handles back to it. The `Roster` is the arena that owns
// every organism, keyed by `OrganismId` in a `BTreeMap` so iteration order is
// creation order.
//
// ## Act
//
// `act()` advances one living organism through one step. It is the same code
// for every species; the species table and predation graph in `SimConfig`
// supply the differences:
//
//   1. Age. `age += 1`; past `max_age` the organism dies and stops. If the
//      species has `starvation_steps`, the food level then drops by one and
//      the organism starves at zero.
//   2. Hunt. If the species has prey, collect every adjacent prey occupant
//      and kill one chosen with a single draw. The kill refills hunger.
//   3. Move. Into the cell just emptied by the kill, otherwise into a random
//      free neighbor, otherwise stay put. Crowding never kills.
//   4. Breed. At or past `breeding_age`, a Bernoulli roll with
//      `breeding_probability`; on success a litter of `0..=max_litter_size`
//      is placed one by one into free neighbors until space runs out.
//      Newborns are placed in the field immediately but go into the caller's
//      newborn buffer, not the roster, so they cannot act this step.
//
// Dead organisms stay in the roster (with `alive == false`) until the engine
// sweeps them at the end of the step; their field cell is vacated at the
// moment of death. A newborn eaten in the step it was born is dropped from
// the newborn buffer instead.
//
// See also: `field.rs` for neighborhood queries, `sim.rs` for the step loop
// that drives `act()` and merges the newborn buffer.
//
// **Critical constraint: determinism.** The order of RNG draws inside
// `act()` is fixed: neighbor choice for the hunt, neighbor choice for the
// move, breeding roll, litter size, one neighbor choice per offspring.

use crate::config::SimConfig;
use crate::field::{Field, FieldError};
use crate::prng::SimRng;
use crate::species::SpeciesParams;
use crate::types::{Location, Occupant, OrganismId, Species};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::{error, trace};

/// Why an organism died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    OldAge,
    Starvation,
    Eaten,
    Disease,
}

/// A single simulated individual.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    pub id: OrganismId,
    pub species: Species,
    pub age: u32,
    pub alive: bool,
    pub location: Location,
    /// Acts left before starvation. `None` for species without hunger.
    pub food_level: Option<u32>,
}

impl Organism {
    /// A newly created organism, age 0, with a full stomach if its species
    /// tracks hunger. Not yet placed in any field.
    pub fn new(id: OrganismId, species: Species, location: Location, params: &SpeciesParams) -> Self {
        Self {
            id,
            species,
            age: 0,
            alive: true,
            location,
            food_level: params.starvation_steps,
        }
    }

    pub fn occupant(&self) -> Occupant {
        Occupant {
            id: self.id,
            species: self.species,
        }
    }

    /// Mark dead and clear this organism's cell. Idempotent.
    pub fn set_dead(&mut self, field: &mut Field) {
        if self.alive {
            self.alive = false;
            field.vacate_occupant(self.location, self.id);
        }
    }

    /// Age by one step and burn one unit of food. Returns the cause of death
    /// if either limit was crossed; the caller then kills the organism.
    fn grow_older(&mut self, params: &SpeciesParams) -> Option<DeathCause> {
        self.age += 1;
        if self.age > params.max_age {
            return Some(DeathCause::OldAge);
        }
        if let Some(food) = self.food_level.as_mut() {
            *food = food.saturating_sub(1);
            if *food == 0 {
                return Some(DeathCause::Starvation);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Owns every organism. Ids are handed out in increasing order and never
/// reused, so iterating the map visits organisms oldest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    organisms: BTreeMap<OrganismId, Organism>,
    next_id: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id. The organism need not be inserted immediately.
    pub fn allocate_id(&mut self) -> OrganismId {
        let id = OrganismId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, organism: Organism) {
        self.organisms.insert(organism.id, organism);
    }

    pub fn get(&self, id: OrganismId) -> Option<&Organism> {
        self.organisms.get(&id)
    }

    pub fn get_mut(&mut self, id: OrganismId) -> Option<&mut Organism> {
        self.organisms.get_mut(&id)
    }

    /// Snapshot of current ids in roster order.
    pub fn ids(&self) -> Vec<OrganismId> {
        self.organisms.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Organism> {
        self.organisms.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Organism> {
        self.organisms.values_mut()
    }

    /// Drop dead organisms. Returns how many were removed.
    pub fn remove_dead(&mut self) -> usize {
        let before = self.organisms.len();
        self.organisms.retain(|_, o| o.alive);
        before - self.organisms.len()
    }

    /// Remove every organism. Ids keep counting up.
    pub fn clear(&mut self) {
        self.organisms.clear();
    }

    pub fn len(&self) -> usize {
        self.organisms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organisms.is_empty()
    }
}

impl Extend<Organism> for Roster {
    fn extend<I: IntoIterator<Item = Organism>>(&mut self, iter: I) {
        for organism in iter {
            self.insert(organism);
        }
    }
}

// ---------------------------------------------------------------------------
// Act
// ---------------------------------------------------------------------------

/// Everything an organism's act may read or mutate, borrowed from the engine
/// for the duration of one step.
pub struct ActContext<'a> {
    pub field: &'a mut Field,
    pub roster: &'a mut Roster,
    pub rng: &'a mut SimRng,
    pub config: &'a SimConfig,
    /// Organisms born this step. Merged into the roster after every act.
    pub newborns: &'a mut Vec<Organism>,
}

/// Run one step of the organism `id`. Dead or unknown organisms are skipped.
///
/// An `Err` means the field's single-occupancy invariant was found broken;
/// the organism's turn ends at that point.
pub fn act(id: OrganismId, ctx: &mut ActContext<'_>) -> Result<(), FieldError> {
    let Some(organism) = ctx.roster.get_mut(id) else {
        return Ok(());
    };
    if !organism.alive {
        return Ok(());
    }
    let species = organism.species;
    let params = ctx.config.params(species);

    if let Some(cause) = organism.grow_older(&params) {
        organism.set_dead(ctx.field);
        trace!(%id, %species, ?cause, age = organism.age, "organism died");
        return Ok(());
    }
    let location = organism.location;

    let vacated = hunt(id, species, location, &params, ctx);

    let target = match vacated {
        Some(cell) => Some(cell),
        None => ctx.field.free_adjacent_location(location, ctx.rng),
    };
    let location = match target {
        Some(target) => relocate(id, species, location, target, ctx)?,
        None => location,
    };

    breed(id, species, location, &params, ctx)?;
    Ok(())
}

/// Kill one adjacent prey, if any, and return the cell it occupied.
fn hunt(
    id: OrganismId,
    species: Species,
    location: Location,
    params: &SpeciesParams,
    ctx: &mut ActContext<'_>,
) -> Option<Location> {
    let config = ctx.config;
    let prey = config.prey_of(species)?;
    let candidates: SmallVec<[(Location, Occupant); 8]> = ctx
        .field
        .adjacent_occupants_of(location, |s| prey.contains(&s))
        .collect();
    let &(prey_location, victim) = ctx.rng.pick(candidates.as_slice())?;

    match ctx.roster.get_mut(victim.id) {
        Some(prey) => prey.set_dead(ctx.field),
        None => {
            // Born earlier this step: not in the roster yet, so it must
            // leave the buffer or it would be merged back in.
            ctx.newborns.retain(|o| o.id != victim.id);
            ctx.field.vacate_occupant(prey_location, victim.id);
        }
    }
    if let Some(hunter) = ctx.roster.get_mut(id) {
        hunter.food_level = params.starvation_steps;
    }
    trace!(%id, %species, victim = %victim.id, prey = %victim.species, "organism eaten");
    Some(prey_location)
}

/// Move `id` from `from` to `to`, keeping field and organism in agreement.
fn relocate(
    id: OrganismId,
    species: Species,
    from: Location,
    to: Location,
    ctx: &mut ActContext<'_>,
) -> Result<Location, FieldError> {
    ctx.field.vacate_occupant(from, id);
    if let Err(err) = ctx.field.place(Occupant { id, species }, to) {
        if let Err(restore) = ctx.field.place(Occupant { id, species }, from) {
            // No cell to stand on; it leaves the run.
            error!(%id, %species, %restore, "organism could not be restored; removed");
            if let Some(organism) = ctx.roster.get_mut(id) {
                organism.alive = false;
            }
        }
        return Err(err);
    }
    if let Some(organism) = ctx.roster.get_mut(id) {
        organism.location = to;
    }
    Ok(to)
}

/// Roll for a litter and place each offspring into a free neighbor.
/// Returns the number born.
fn breed(
    id: OrganismId,
    species: Species,
    location: Location,
    params: &SpeciesParams,
    ctx: &mut ActContext<'_>,
) -> Result<usize, FieldError> {
    let age = ctx.roster.get(id).map_or(0, |o| o.age);
    if !params.can_breed(age) || !ctx.rng.random_bool(params.breeding_probability) {
        return Ok(0);
    }
    let litter = ctx
        .rng
        .range_usize_inclusive(0, params.max_litter_size as usize);

    let mut born = 0;
    for _ in 0..litter {
        let Some(spot) = ctx.field.free_adjacent_location(location, ctx.rng) else {
            break;
        };
        let child = Organism::new(ctx.roster.allocate_id(), species, spot, params);
        ctx.field.place(child.occupant(), spot)?;
        ctx.newborns.push(child);
        born += 1;
    }
    if born > 0 {
        trace!(%id, %species, born, "litter born");
    }
    Ok(born)
}
