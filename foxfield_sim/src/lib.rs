// foxfield_sim: grid-based predator/prey simulation library.
//
// This crate contains all simulation logic for Foxfield: the rectangular
// field, the organisms that live on it, the per-step act cycle, population
// statistics, disease events, and the command interface. It has no UI
// dependencies and can be tested, benchmarked, and run headless; a front
// end only reads `Simulation::cells()`/`stats()` and issues commands.
//
// Module overview:
// - `sim.rs`:      Top-level Simulation, step loop, administrative operations.
// - `field.rs`:    Dense 2D grid of occupant handles (the spatial truth).
// - `organism.rs`: Organism data, the Roster arena, and the per-step act.
// - `stats.rs`:    PopulationStats census and viability.
// - `command.rs`:  SimCommand: serializable form of every mutation.
// - `config.rs`:   SimConfig: dimensions, seeding table, predation graph.
// - `species.rs`:  SpeciesParams: data-driven life-history parameters.
// - `prng`:        Re-exported from `foxfield_prng`: xoshiro256++ PRNG with SplitMix64 seeding.
// - `types.rs`:    Location, OrganismId, Species, Occupant.
//
// **Critical constraint: determinism.** A seeded simulation is a pure
// function of its seed and the calls made on it. All randomness comes from
// one `SimRng`. No `HashMap`, no system time outside entropy seeding. Use
// `BTreeMap` for ordered collections.

pub mod command;
pub mod config;
pub mod field;
pub mod organism;
pub use foxfield_prng as prng;
pub mod sim;
pub mod species;
pub mod stats;
pub mod types;
