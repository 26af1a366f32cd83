// Core simulation state and step loop.
//
// `Simulation` is the single source of truth for a run. It owns the field,
// the roster, the PRNG, the validated config, the disease state, the step
// counter, and the cached census. Nothing else mutates the field or roster;
// presentation code reads through `cells()`/`stats()` and writes only
// through the administrative methods below (or `SimCommand`, see
// `command.rs`).
//
// ## Step
//
// `step()` is atomic with respect to callers:
//
//   1. Disease cull. If a disease is active, every living organism rolls
//      against its kill probability; losers die and leave the field
//      immediately. The remaining duration drops by one, and when it reaches
//      zero the disease's name moves to `last_disease`.
//   2. Act phase. Every roster organism acts in id order (see
//      `organism::act`). Newborns are placed on the field but held in a
//      buffer, so they neither act nor age this step.
//   3. Sweep. Dead organisms leave the roster; the newborn buffer joins it.
//   4. The step counter advances and the census is recomputed.
//
// ## Administrative operations
//
// - `seed(depth, width, table)`: fresh field, fresh roster, one pass over the
//   cells in row-major order trying each table entry in priority order.
//   Resets the step counter and any disease marker.
// - `reset()`: `seed` with the configured dimensions and table.
// - `repopulate()`: re-seed in place without touching the step counter.
// - `nuke()`: empty field and roster; no reseeding.
// - `stock(species, n)`: drop `n` organisms at random cells. Occupied picks
//   are skipped or retried per `StockingPolicy`; never overwritten.
// - `trigger_disease(p, name, steps)`: arm a disease for the next `steps`
//   steps.
//
// Viability is reported, never enforced: `step()` runs on a collapsed
// population; `run_for` is the loop that stops on it.
//
// See also: `organism.rs` for the act step and roster, `field.rs` for the
// grid, `stats.rs` for the census, `config.rs` for `SimConfig`.
//
// **Critical constraint: determinism.** All randomness comes from the one
// `SimRng` owned here, and every loop walks the roster or the field in a
// fixed order, so equal seeds and equal calls give equal runs.

use crate::command::{CommandOutcome, SimCommand, SpeciesParam};
use crate::config::{
    self, CreationProbability, DEFAULT_DISEASE_KILL_PROBABILITY, LONG_RUN_STEPS, SimConfig,
    StockingPolicy,
};
use crate::field::{Field, FieldError};
use crate::organism::{self, ActContext, Organism, Roster};
use crate::prng::SimRng;
use crate::species::SpeciesParams;
use crate::stats::PopulationStats;
use crate::types::{Location, OrganismId, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, error, trace, warn};

/// A disease currently culling the population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveDisease {
    pub name: String,
    pub kill_probability: f64,
    /// Steps (including the next one) that will still be culled.
    pub remaining_steps: u32,
}

/// What one step did, for the caller to render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// The step number just completed.
    pub step: u64,
    pub stats: PopulationStats,
    /// Newborns merged into the roster. A newborn eaten in the step it was
    /// born counts in neither `births` nor `deaths`.
    pub births: usize,
    /// Organisms removed from the roster this step, disease kills included.
    pub deaths: usize,
    pub disease_kills: usize,
    /// Name of the disease still active after this step, if any.
    pub active_disease: Option<String>,
}

/// Top-level simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Simulation {
    step: u64,
    rng: SimRng,
    config: SimConfig,
    field: Field,
    roster: Roster,
    active_disease: Option<ActiveDisease>,
    /// Name of the most recent disease to run its course.
    last_disease: Option<String>,
    /// Kills by every disease since construction. Survives `reset`.
    disease_kill_count: u64,
    stats: PopulationStats,
}

impl Simulation {
    /// A default-configured simulation with a fixed seed, already populated.
    pub fn new(seed: u64) -> Self {
        Self::with_config(SimConfig::seeded(seed))
    }

    /// Validate `config`, seed the PRNG from it, and populate the field.
    pub fn with_config(config: SimConfig) -> Self {
        let config = config.validated();
        let rng = SimRng::from_optional_seed(config.rng_seed);
        let field = Field::new(config.depth, config.width);
        let mut sim = Self {
            step: 0,
            rng,
            config,
            field,
            roster: Roster::new(),
            active_disease: None,
            last_disease: None,
            disease_kill_count: 0,
            stats: PopulationStats::default(),
        };
        sim.reset();
        sim
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read-only access to the grid.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Census as of the last completed operation.
    pub fn stats(&self) -> &PopulationStats {
        &self.stats
    }

    pub fn is_viable(&self) -> bool {
        self.stats.is_viable()
    }

    pub fn disease_kill_count(&self) -> u64 {
        self.disease_kill_count
    }

    pub fn active_disease(&self) -> Option<&ActiveDisease> {
        self.active_disease.as_ref()
    }

    pub fn last_disease(&self) -> Option<&str> {
        self.last_disease.as_deref()
    }

    pub fn organism_count(&self) -> usize {
        self.roster.len()
    }

    pub fn organism(&self, id: OrganismId) -> Option<&Organism> {
        self.roster.get(id)
    }

    /// Living organisms in roster order.
    pub fn organisms(&self) -> impl Iterator<Item = &Organism> {
        self.roster.iter()
    }

    /// One full sweep of the field for rendering.
    pub fn cells(&self) -> impl Iterator<Item = (Location, Option<Species>)> + '_ {
        self.field.cells()
    }

    pub fn species_params(&self, species: Species) -> SpeciesParams {
        self.config.params(species)
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance one generation.
    pub fn step(&mut self) -> StepOutcome {
        let disease_kills = self.apply_disease();

        let mut newborns = Vec::new();
        let ids = self.roster.ids();
        let mut ctx = ActContext {
            field: &mut self.field,
            roster: &mut self.roster,
            rng: &mut self.rng,
            config: &self.config,
            newborns: &mut newborns,
        };
        for id in ids {
            if let Err(err) = organism::act(id, &mut ctx) {
                error!(%id, %err, "field occupancy invariant broken; turn abandoned");
            }
        }

        let deaths = self.roster.remove_dead() + disease_kills;
        let births = newborns.len();
        self.roster.extend(newborns);

        self.step += 1;
        self.refresh_stats();
        trace!(step = self.step, births, deaths, stats = %self.stats, "step complete");

        StepOutcome {
            step: self.step,
            stats: self.stats.clone(),
            births,
            deaths,
            disease_kills,
            active_disease: self.active_disease.as_ref().map(|d| d.name.clone()),
        }
    }

    /// Step up to `max_steps` times, stopping before any step taken while the
    /// population is not viable. Returns the outcome of the last step run;
    /// if none ran, an empty outcome for the current step and census.
    pub fn run_for(&mut self, max_steps: u64) -> StepOutcome {
        let mut last = None;
        for _ in 0..max_steps {
            if !self.is_viable() {
                debug!(step = self.step, stats = %self.stats, "population no longer viable");
                break;
            }
            last = Some(self.step());
        }
        last.unwrap_or_else(|| self.idle_outcome())
    }

    /// `run_for` with the long-run step count.
    pub fn run_long_simulation(&mut self) -> StepOutcome {
        self.run_for(LONG_RUN_STEPS)
    }

    /// Outcome describing the current state when no step was taken.
    fn idle_outcome(&self) -> StepOutcome {
        StepOutcome {
            step: self.step,
            stats: self.stats.clone(),
            births: 0,
            deaths: 0,
            disease_kills: 0,
            active_disease: self.active_disease.as_ref().map(|d| d.name.clone()),
        }
    }

    // -----------------------------------------------------------------------
    // Administrative operations
    // -----------------------------------------------------------------------

    /// Replace the field with a fresh `depth` x `width` one and populate it
    /// from `probabilities`. Invalid inputs fall back to defaults.
    pub fn seed(&mut self, depth: u32, width: u32, probabilities: &[CreationProbability]) {
        let (depth, width) = config::validated_dimensions(depth, width);
        let probabilities = config::validated_creation_probabilities(probabilities);
        self.field = Field::new(depth, width);
        self.populate(&probabilities);
        self.step = 0;
        self.last_disease = None;
        self.refresh_stats();
        debug!(depth, width, population = self.roster.len(), "field seeded");
    }

    /// Re-seed with the configured dimensions and creation table.
    pub fn reset(&mut self) {
        let probabilities = self.config.creation_probabilities.clone();
        self.seed(self.config.depth, self.config.width, &probabilities);
    }

    /// Re-seed the current field from the configured table, keeping the step
    /// counter.
    pub fn repopulate(&mut self) {
        let probabilities = self.config.creation_probabilities.clone();
        self.populate(&probabilities);
        self.last_disease = None;
        self.refresh_stats();
        debug!(step = self.step, population = self.roster.len(), "field repopulated");
    }

    /// Remove every organism. The simulation carries on from empty.
    pub fn nuke(&mut self) {
        self.field.clear();
        self.roster.clear();
        self.refresh_stats();
        debug!(step = self.step, "field cleared");
    }

    /// Release `count` organisms of `species` at random cells. Returns how
    /// many were actually placed.
    pub fn stock(&mut self, species: Species, count: usize) -> usize {
        let attempts = match self.config.stocking {
            StockingPolicy::Skip => 1,
            StockingPolicy::Retry { attempts } => attempts.max(1),
        };
        let depth = self.field.depth() as usize;
        let width = self.field.width() as usize;
        let mut placed = 0;
        for _ in 0..count {
            for _ in 0..attempts {
                let loc = Location::new(
                    self.rng.range_usize(0, depth) as i32,
                    self.rng.range_usize(0, width) as i32,
                );
                if self.field.is_free(loc) && self.insert_new(species, loc).is_ok() {
                    placed += 1;
                    break;
                }
            }
        }
        self.refresh_stats();
        debug!(%species, requested = count, placed, "stocked");
        placed
    }

    /// Place one new organism of `species` at `loc`.
    pub fn spawn_at(&mut self, species: Species, loc: Location) -> Result<OrganismId, FieldError> {
        let id = self.insert_new(species, loc)?;
        self.refresh_stats();
        Ok(id)
    }

    /// Arm a disease for the next `duration_steps` steps. A disease already
    /// running is replaced. A zero duration is recorded as having occurred
    /// without culling anything.
    pub fn trigger_disease(&mut self, kill_probability: f64, name: impl Into<String>, duration_steps: u32) {
        let name = name.into();
        let kill_probability = if SpeciesParams::is_valid_probability(kill_probability) {
            kill_probability
        } else {
            warn!(
                value = kill_probability,
                fallback = DEFAULT_DISEASE_KILL_PROBABILITY,
                "disease kill probability outside [0, 1]; using default"
            );
            DEFAULT_DISEASE_KILL_PROBABILITY
        };
        if let Some(previous) = self.active_disease.take() {
            debug!(previous = %previous.name, "active disease replaced");
        }
        debug!(%name, kill_probability, duration_steps, "disease triggered");
        if duration_steps == 0 {
            self.last_disease = Some(name);
            return;
        }
        self.active_disease = Some(ActiveDisease {
            name,
            kill_probability,
            remaining_steps: duration_steps,
        });
    }

    // -----------------------------------------------------------------------
    // Species configuration
    // -----------------------------------------------------------------------

    pub fn set_breeding_age(&mut self, species: Species, breeding_age: u32) {
        self.params_mut(species).breeding_age = breeding_age;
    }

    /// Organisms already older than the new limit die at their next act.
    pub fn set_max_age(&mut self, species: Species, max_age: u32) {
        self.params_mut(species).max_age = max_age;
    }

    /// Out-of-range values fall back to the species default.
    pub fn set_breeding_probability(&mut self, species: Species, probability: f64) {
        let probability = if SpeciesParams::is_valid_probability(probability) {
            probability
        } else {
            let fallback = SpeciesParams::defaults_for(species).breeding_probability;
            warn!(%species, value = probability, fallback, "breeding probability outside [0, 1]; using default");
            fallback
        };
        self.params_mut(species).breeding_probability = probability;
    }

    pub fn set_max_litter_size(&mut self, species: Species, max_litter_size: u32) {
        self.params_mut(species).max_litter_size = max_litter_size;
    }

    /// Enable or disable hunger. Organisms alive at the time keep their
    /// current food level (or lack of one) until they next feed.
    pub fn set_starvation_steps(&mut self, species: Species, starvation_steps: Option<u32>) {
        self.params_mut(species).starvation_steps = starvation_steps;
    }

    /// Replace the set of species `species` may eat.
    pub fn set_prey(&mut self, species: Species, prey: BTreeSet<Species>) {
        self.config.predation.insert(species, prey);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Dispatch one `SimCommand` to the matching method.
    pub fn apply(&mut self, command: &SimCommand) -> Result<CommandOutcome, FieldError> {
        let outcome = match command {
            SimCommand::Step => CommandOutcome::Stepped(self.step()),
            SimCommand::RunFor { max_steps } => CommandOutcome::Stepped(self.run_for(*max_steps)),
            SimCommand::RunLong => CommandOutcome::Stepped(self.run_long_simulation()),
            SimCommand::Reset => {
                self.reset();
                CommandOutcome::Applied
            }
            SimCommand::Repopulate => {
                self.repopulate();
                CommandOutcome::Applied
            }
            SimCommand::Nuke => {
                self.nuke();
                CommandOutcome::Applied
            }
            SimCommand::Seed {
                depth,
                width,
                probabilities,
            } => {
                self.seed(*depth, *width, probabilities);
                CommandOutcome::Applied
            }
            SimCommand::Stock { species, count } => {
                CommandOutcome::Stocked(self.stock(*species, *count))
            }
            SimCommand::SpawnAt { species, location } => {
                CommandOutcome::Spawned(self.spawn_at(*species, *location)?)
            }
            SimCommand::TriggerDisease {
                kill_probability,
                name,
                duration_steps,
            } => {
                self.trigger_disease(*kill_probability, name.clone(), *duration_steps);
                CommandOutcome::Applied
            }
            SimCommand::SetSpeciesParam { species, param } => {
                match *param {
                    SpeciesParam::BreedingAge(v) => self.set_breeding_age(*species, v),
                    SpeciesParam::MaxAge(v) => self.set_max_age(*species, v),
                    SpeciesParam::BreedingProbability(v) => self.set_breeding_probability(*species, v),
                    SpeciesParam::MaxLitterSize(v) => self.set_max_litter_size(*species, v),
                    SpeciesParam::StarvationSteps(v) => self.set_starvation_steps(*species, v),
                }
                CommandOutcome::Applied
            }
            SimCommand::SetPrey { species, prey } => {
                self.set_prey(*species, prey.clone());
                CommandOutcome::Applied
            }
        };
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn params_mut(&mut self, species: Species) -> &mut SpeciesParams {
        self.config
            .species
            .entry(species)
            .or_insert_with(|| SpeciesParams::defaults_for(species))
    }

    fn refresh_stats(&mut self) {
        self.stats = PopulationStats::census(&self.field);
    }

    fn insert_new(&mut self, species: Species, loc: Location) -> Result<OrganismId, FieldError> {
        let params = self.config.params(species);
        let id = self.roster.allocate_id();
        let organism = Organism::new(id, species, loc, &params);
        self.field.place(organism.occupant(), loc)?;
        self.roster.insert(organism);
        Ok(id)
    }

    /// Clear field and roster, then one row-major pass trying each entry of
    /// `probabilities` in order with an independent draw.
    fn populate(&mut self, probabilities: &[CreationProbability]) {
        self.field.clear();
        self.roster.clear();
        self.active_disease = None;
        for row in 0..self.field.depth() as i32 {
            for col in 0..self.field.width() as i32 {
                let winner = probabilities
                    .iter()
                    .find(|entry| self.rng.random_bool(entry.probability));
                if let Some(entry) = winner {
                    let loc = Location::new(row, col);
                    if let Err(err) = self.insert_new(entry.species, loc) {
                        error!(%err, "seeding hit an occupied cell");
                    }
                }
            }
        }
    }

    /// Cull for the active disease, if any. Returns the number killed.
    fn apply_disease(&mut self) -> usize {
        let Some(disease) = self.active_disease.as_mut() else {
            return 0;
        };
        let mut killed = 0;
        for organism in self.roster.iter_mut() {
            if organism.alive && self.rng.random_bool(disease.kill_probability) {
                organism.set_dead(&mut self.field);
                killed += 1;
            }
        }
        self.roster.remove_dead();
        self.disease_kill_count += killed as u64;
        trace!(disease = %disease.name, killed, "disease cull");

        disease.remaining_steps -= 1;
        if disease.remaining_steps == 0 {
            debug!(disease = %disease.name, total_kills = self.disease_kill_count, "disease ran its course");
            self.last_disease = self.active_disease.take().map(|d| d.name);
        }
        killed
    }
}
