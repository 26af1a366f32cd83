// Species parameters: data-driven life-history configuration.
//
// All behavioral differences between species are expressed as data: the
// life-history numbers in `SpeciesParams` (this file) and the prey sets in
// the predation graph (`config.rs`). The act step in `organism.rs` is
// species-agnostic and reads both tables at runtime.
//
// Parameters are shared by every instance of a species. The engine owns the
// table; changing a value through `Simulation::set_*` affects all current
// and future organisms of that species from their next act onward.

use crate::types::Species;
use serde::{Deserialize, Serialize};

/// Life-history parameters for one species.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    /// Minimum age (in steps) at which an organism may breed.
    pub breeding_age: u32,

    /// An organism dies during the act in which its age first exceeds this.
    pub max_age: u32,

    /// Chance per act that an organism of breeding age produces a litter.
    pub breeding_probability: f64,

    /// Litter size is drawn uniformly from `0..=max_litter_size`, then capped
    /// by the free cells around the parent.
    pub max_litter_size: u32,

    /// If set, an organism dies after this many consecutive acts without a
    /// kill. `None` disables hunger for the species.
    #[serde(default)]
    pub starvation_steps: Option<u32>,
}

impl SpeciesParams {
    /// Built-in defaults for a species.
    pub fn defaults_for(species: Species) -> Self {
        match species {
            Species::Rabbit => Self {
                breeding_age: 5,
                max_age: 40,
                breeding_probability: 0.12,
                max_litter_size: 4,
                starvation_steps: None,
            },
            Species::Fox => Self {
                breeding_age: 15,
                max_age: 150,
                breeding_probability: 0.08,
                max_litter_size: 2,
                starvation_steps: None,
            },
            Species::Bear => Self {
                breeding_age: 20,
                max_age: 200,
                breeding_probability: 0.05,
                max_litter_size: 2,
                starvation_steps: None,
            },
            Species::Hunter => Self {
                breeding_age: 18,
                max_age: 180,
                breeding_probability: 0.04,
                max_litter_size: 1,
                starvation_steps: None,
            },
        }
    }

    pub fn can_breed(&self, age: u32) -> bool {
        age >= self.breeding_age
    }

    /// True if a probability lies in [0, 1] (NaN is rejected).
    pub fn is_valid_probability(p: f64) -> bool {
        (0.0..=1.0).contains(&p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        for species in Species::ALL {
            let params = SpeciesParams::defaults_for(species);
            assert!(SpeciesParams::is_valid_probability(params.breeding_probability));
            assert!(params.breeding_age < params.max_age, "{species} never breeds");
        }
    }

    #[test]
    fn probability_validation() {
        assert!(SpeciesParams::is_valid_probability(0.0));
        assert!(SpeciesParams::is_valid_probability(1.0));
        assert!(!SpeciesParams::is_valid_probability(-0.01));
        assert!(!SpeciesParams::is_valid_probability(1.01));
        assert!(!SpeciesParams::is_valid_probability(f64::NAN));
    }

    #[test]
    fn breeding_age_boundary() {
        let params = SpeciesParams::defaults_for(Species::Rabbit);
        assert!(!params.can_breed(params.breeding_age - 1));
        assert!(params.can_breed(params.breeding_age));
    }

    #[test]
    fn starvation_defaults_to_none_in_json() {
        let json = r#"{
            "breeding_age": 1,
            "max_age": 10,
            "breeding_probability": 0.5,
            "max_litter_size": 2
        }"#;
        let params: SpeciesParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.starvation_steps, None);
        assert_eq!(params.max_litter_size, 2);
    }
}
