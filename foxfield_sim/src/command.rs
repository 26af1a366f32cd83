// Commands that mutate simulation state.
//
// `SimCommand` is the serializable form of every administrative call on
// `Simulation`: stepping, seeding, stocking, disease, and species tuning.
// A front end (GUI, script, replay file) can build a list of commands,
// persist it as JSON, and feed it back through `Simulation::apply()` to
// reproduce a session exactly.
//
// Each variant maps one-to-one onto a `Simulation` method; `apply()` in
// `sim.rs` is the dispatcher and adds no behavior of its own.
//
// See also: `sim.rs` for `Simulation::apply()`, `species.rs` for the
// parameters `SetSpeciesParam` edits.
//
// **Critical constraint: determinism.** Given the same starting seed, the
// same command list yields the same state.

use crate::config::CreationProbability;
use crate::sim::StepOutcome;
use crate::types::{Location, OrganismId, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One editable life-history parameter, with its new value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpeciesParam {
    BreedingAge(u32),
    MaxAge(u32),
    /// Out-of-range values fall back to the species default.
    BreedingProbability(f64),
    MaxLitterSize(u32),
    StarvationSteps(Option<u32>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimCommand {
    Step,
    /// Step until `max_steps` or until the population stops being viable.
    RunFor { max_steps: u64 },
    RunLong,
    Reset,
    Repopulate,
    Nuke,
    Seed {
        depth: u32,
        width: u32,
        probabilities: Vec<CreationProbability>,
    },
    Stock { species: Species, count: usize },
    SpawnAt { species: Species, location: Location },
    TriggerDisease {
        kill_probability: f64,
        name: String,
        duration_steps: u32,
    },
    SetSpeciesParam { species: Species, param: SpeciesParam },
    SetPrey { species: Species, prey: BTreeSet<Species> },
}

/// What applying a command produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Administrative change with nothing to report.
    Applied,
    /// Result of the last step taken, or the current state if none ran.
    Stepped(StepOutcome),
    /// Number of organisms actually placed by `Stock`.
    Stocked(usize),
    Spawned(OrganismId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serialization_roundtrip() {
        let commands = vec![
            SimCommand::Seed {
                depth: 10,
                width: 12,
                probabilities: vec![CreationProbability::new(Species::Fox, 0.1)],
            },
            SimCommand::TriggerDisease {
                kill_probability: 0.25,
                name: "myxomatosis".into(),
                duration_steps: 3,
            },
            SimCommand::SetSpeciesParam {
                species: Species::Bear,
                param: SpeciesParam::StarvationSteps(Some(8)),
            },
            SimCommand::SetPrey {
                species: Species::Rabbit,
                prey: BTreeSet::new(),
            },
            SimCommand::RunFor { max_steps: 50 },
        ];

        let json = serde_json::to_string(&commands).unwrap();
        let restored: Vec<SimCommand> = serde_json::from_str(&json).unwrap();
        assert_eq!(commands, restored);
    }
}
