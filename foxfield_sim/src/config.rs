// Data-driven simulation configuration.
//
// Every tunable of a run lives in `SimConfig`: field dimensions, the RNG
// seed, initial creation probabilities (in priority order), the per-species
// parameter table, the predation graph, and the stocking policy. It can be
// built in code (`SimConfig::default()`) or loaded from JSON
// (`SimConfig::from_json`).
//
// Invalid values never abort a run. `validated()` replaces each bad value
// with its documented default and logs a warning: zero dimensions fall back
// to 80x120, out-of-range probabilities fall back to the species default,
// and missing species entries are filled in.
//
// See also: `species.rs` for `SpeciesParams`, `sim.rs` which owns the
// validated config for the lifetime of a `Simulation`.
//
// **Critical constraint: determinism.** Two simulations with equal configs
// and equal seeds produce identical runs. Collections here are `BTreeMap`/
// `BTreeSet` so iteration order never depends on hashing.

use crate::species::SpeciesParams;
use crate::types::Species;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_DEPTH: u32 = 80;
pub const DEFAULT_WIDTH: u32 = 120;

/// Step count for `Simulation::run_long_simulation`.
pub const LONG_RUN_STEPS: u64 = 4000;

/// Kill probability substituted when a disease is triggered with an invalid one.
pub const DEFAULT_DISEASE_KILL_PROBABILITY: f64 = 0.05;

/// Errors from loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse simulation config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Probability that seeding places `species` in a given cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreationProbability {
    pub species: Species,
    pub probability: f64,
}

impl CreationProbability {
    pub const fn new(species: Species, probability: f64) -> Self {
        Self {
            species,
            probability,
        }
    }
}

/// The built-in seeding table. Order is priority: for each cell the entries
/// are tried in turn and the first success claims the cell.
pub fn default_creation_probabilities() -> Vec<CreationProbability> {
    vec![
        CreationProbability::new(Species::Fox, 0.04),
        CreationProbability::new(Species::Rabbit, 0.08),
        CreationProbability::new(Species::Bear, 0.03),
        CreationProbability::new(Species::Hunter, 0.02),
    ]
}

fn default_creation_probability(species: Species) -> f64 {
    default_creation_probabilities()
        .into_iter()
        .find(|c| c.species == species)
        .map_or(0.0, |c| c.probability)
}

/// The built-in predation graph: foxes eat rabbits, bears eat rabbits and
/// foxes, hunters eat everything else, rabbits graze.
pub fn default_predation() -> BTreeMap<Species, BTreeSet<Species>> {
    let mut graph = BTreeMap::new();
    graph.insert(Species::Rabbit, BTreeSet::new());
    graph.insert(Species::Fox, BTreeSet::from([Species::Rabbit]));
    graph.insert(Species::Bear, BTreeSet::from([Species::Rabbit, Species::Fox]));
    graph.insert(
        Species::Hunter,
        BTreeSet::from([Species::Rabbit, Species::Fox, Species::Bear]),
    );
    graph
}

/// What `stock` does when the random cell it picked is already taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockingPolicy {
    /// Give up on that individual.
    #[default]
    Skip,
    /// Draw a new random cell, up to `attempts` draws per individual.
    Retry { attempts: u32 },
}

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of rows in the field.
    pub depth: u32,

    /// Number of columns in the field.
    pub width: u32,

    /// Seed for the simulation PRNG. `None` seeds from entropy, so the run
    /// will not be reproducible.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Seeding table used by `reset()` and `repopulate()`, in priority order.
    pub creation_probabilities: Vec<CreationProbability>,

    /// Per-species life-history parameters.
    pub species: BTreeMap<Species, SpeciesParams>,

    /// Predation graph: for each species, the species it may eat.
    pub predation: BTreeMap<Species, BTreeSet<Species>>,

    #[serde(default)]
    pub stocking: StockingPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        let species = Species::ALL
            .into_iter()
            .map(|s| (s, SpeciesParams::defaults_for(s)))
            .collect();
        Self {
            depth: DEFAULT_DEPTH,
            width: DEFAULT_WIDTH,
            rng_seed: None,
            creation_probabilities: default_creation_probabilities(),
            species,
            predation: default_predation(),
            stocking: StockingPolicy::Skip,
        }
    }
}

impl SimConfig {
    /// Default config with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Parse a config from JSON. The result is not yet validated; the
    /// simulation validates on construction.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parameters for `species`, falling back to the built-in defaults if
    /// the table has no entry.
    pub fn params(&self, species: Species) -> SpeciesParams {
        self.species
            .get(&species)
            .copied()
            .unwrap_or_else(|| SpeciesParams::defaults_for(species))
    }

    /// The species `predator` may eat. Empty for grazers and for species
    /// missing from the graph.
    pub fn prey_of(&self, predator: Species) -> Option<&BTreeSet<Species>> {
        self.predation.get(&predator).filter(|set| !set.is_empty())
    }

    pub fn preys_on(&self, predator: Species, prey: Species) -> bool {
        self.prey_of(predator).is_some_and(|set| set.contains(&prey))
    }

    /// Replace every invalid value with its default, logging each fallback.
    pub fn validated(mut self) -> Self {
        let (depth, width) = validated_dimensions(self.depth, self.width);
        self.depth = depth;
        self.width = width;
        self.creation_probabilities = validated_creation_probabilities(&self.creation_probabilities);

        for species in Species::ALL {
            let params = self
                .species
                .entry(species)
                .or_insert_with(|| SpeciesParams::defaults_for(species));
            if !SpeciesParams::is_valid_probability(params.breeding_probability) {
                let fallback = SpeciesParams::defaults_for(species).breeding_probability;
                warn!(
                    %species,
                    value = params.breeding_probability,
                    fallback,
                    "breeding probability outside [0, 1]; using default"
                );
                params.breeding_probability = fallback;
            }
            self.predation.entry(species).or_default();
        }
        self
    }
}

/// Dimensions must both be non-zero; otherwise both fall back to the
/// defaults together so the field keeps its intended aspect.
pub fn validated_dimensions(depth: u32, width: u32) -> (u32, u32) {
    if depth == 0 || width == 0 {
        warn!(
            depth,
            width,
            "field dimensions must be greater than zero; using {DEFAULT_DEPTH}x{DEFAULT_WIDTH}"
        );
        (DEFAULT_DEPTH, DEFAULT_WIDTH)
    } else {
        (depth, width)
    }
}

/// Creation probabilities outside [0, 1] fall back to the species' built-in
/// creation probability. Order is preserved.
pub fn validated_creation_probabilities(
    probabilities: &[CreationProbability],
) -> Vec<CreationProbability> {
    probabilities
        .iter()
        .map(|entry| {
            if SpeciesParams::is_valid_probability(entry.probability) {
                *entry
            } else {
                let fallback = default_creation_probability(entry.species);
                warn!(
                    species = %entry.species,
                    value = entry.probability,
                    fallback,
                    "creation probability outside [0, 1]; using default"
                );
                CreationProbability::new(entry.species, fallback)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = SimConfig::seeded(1111);
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = SimConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "depth": 20,
            "width": 30,
            "rng_seed": 99,
            "creation_probabilities": [
                { "species": "Rabbit", "probability": 0.2 },
                { "species": "Fox", "probability": 0.05 }
            ],
            "species": {
                "Rabbit": {
                    "breeding_age": 2,
                    "max_age": 20,
                    "breeding_probability": 0.3,
                    "max_litter_size": 5
                },
                "Fox": {
                    "breeding_age": 10,
                    "max_age": 90,
                    "breeding_probability": 0.1,
                    "max_litter_size": 2,
                    "starvation_steps": 9
                }
            },
            "predation": {
                "Fox": ["Rabbit"]
            },
            "stocking": { "Retry": { "attempts": 5 } }
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!((config.depth, config.width), (20, 30));
        assert_eq!(config.rng_seed, Some(99));
        assert_eq!(config.creation_probabilities[0].species, Species::Rabbit);
        assert_eq!(config.species[&Species::Fox].starvation_steps, Some(9));
        assert!(config.preys_on(Species::Fox, Species::Rabbit));
        assert_eq!(config.stocking, StockingPolicy::Retry { attempts: 5 });

        // Missing species are filled in by validation.
        let config = config.validated();
        assert_eq!(
            config.params(Species::Bear),
            SpeciesParams::defaults_for(Species::Bear)
        );
        assert!(config.prey_of(Species::Bear).is_none());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SimConfig::from_json("{ \"depth\": ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("failed to parse"));
    }

    #[test]
    fn zero_dimensions_fall_back_to_defaults() {
        assert_eq!(validated_dimensions(0, 50), (DEFAULT_DEPTH, DEFAULT_WIDTH));
        assert_eq!(validated_dimensions(50, 0), (DEFAULT_DEPTH, DEFAULT_WIDTH));
        assert_eq!(validated_dimensions(5, 7), (5, 7));
    }

    #[test]
    fn invalid_probabilities_fall_back() {
        let mut config = SimConfig::default();
        config.creation_probabilities = vec![
            CreationProbability::new(Species::Fox, 1.5),
            CreationProbability::new(Species::Rabbit, 0.5),
        ];
        config
            .species
            .get_mut(&Species::Hunter)
            .unwrap()
            .breeding_probability = -0.2;

        let config = config.validated();
        assert_eq!(config.creation_probabilities[0].probability, 0.04);
        assert_eq!(config.creation_probabilities[1].probability, 0.5);
        assert_eq!(
            config.params(Species::Hunter).breeding_probability,
            SpeciesParams::defaults_for(Species::Hunter).breeding_probability
        );
    }

    #[test]
    fn default_predation_graph() {
        let config = SimConfig::default();
        assert!(config.prey_of(Species::Rabbit).is_none());
        assert!(config.preys_on(Species::Fox, Species::Rabbit));
        assert!(!config.preys_on(Species::Fox, Species::Bear));
        assert!(config.preys_on(Species::Bear, Species::Fox));
        for prey in [Species::Rabbit, Species::Fox, Species::Bear] {
            assert!(config.preys_on(Species::Hunter, prey));
        }
        assert!(!config.preys_on(Species::Hunter, Species::Hunter));
    }
}
