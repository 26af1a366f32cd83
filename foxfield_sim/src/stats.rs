// Population census and viability.
//
// `PopulationStats` is recomputed from the field after every step (and after
// any administrative change). It is a snapshot: counts per species plus the
// derived viability flag. Every species in the catalogue appears in the
// counts, with zero when absent, so renderers can draw a stable legend.

use crate::field::Field;
use crate::types::Species;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationStats {
    counts: BTreeMap<Species, usize>,
}

impl Default for PopulationStats {
    fn default() -> Self {
        Self {
            counts: Species::ALL.into_iter().map(|s| (s, 0)).collect(),
        }
    }
}

impl PopulationStats {
    /// Tally the occupants of `field`, one sweep.
    pub fn census(field: &Field) -> Self {
        let mut stats = Self::default();
        for (_, occupant) in field.occupants() {
            *stats.counts.entry(occupant.species).or_insert(0) += 1;
        }
        stats
    }

    pub fn count(&self, species: Species) -> usize {
        self.counts.get(&species).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<Species, usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Number of species with at least one living member.
    pub fn living_species(&self) -> usize {
        self.counts.values().filter(|&&n| n > 0).count()
    }

    /// True while more than one species survives. Extinction and monoculture
    /// both end a run.
    pub fn is_viable(&self) -> bool {
        self.living_species() > 1
    }
}

/// `"Rabbit: 40 Fox: 12"`: present species only, catalogue order.
impl fmt::Display for PopulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (species, count) in self.counts.iter().filter(|(_, n)| **n > 0) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{species}: {count}")?;
            first = false;
        }
        Ok(())
    }
}
