//! Per-component evolving state shared across workers.
//!
//! Synthetic component ids exercise attribute-churn behavior in systems under
//! test: each trace picks a component, and that component's state value may
//! advance with a configured probability. The table is the only mutable
//! resource shared by all workers; access goes through the single narrow
//! [`sample`](ComponentStateTracker::sample) operation, never raw shared
//! memory.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

/// A component id paired with its current state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSample {
    pub id: u64,
    pub state: u64,
}

/// Tracks one evolving state value per synthetic component id.
///
/// State lives for one run; a fresh tracker is built at run start. A single
/// mutex guards the table; cardinality is `component_id_attr_max`, so
/// contention is low.
#[derive(Debug)]
pub struct ComponentStateTracker {
    max_component_id: u64,
    change_probability: u64,
    states: Mutex<HashMap<u64, u64>>,
}

impl ComponentStateTracker {
    pub fn new(max_component_id: u64, change_probability: u64) -> Self {
        Self {
            max_component_id,
            change_probability,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` when component attributes are generated at all.
    pub fn is_enabled(&self) -> bool {
        self.max_component_id > 0
    }

    /// Picks a component id uniformly in `[0, max)`, possibly advances its
    /// state, and returns the pair to stamp on the trace's spans.
    ///
    /// Returns `None` when the feature is disabled (`max == 0`).
    ///
    /// With `change_probability == N > 0`, the state advances iff a uniform
    /// draw in `[1, N]` lands on 1. With `change_probability == 0` state
    /// evolution is disabled outright: the id is still attached but its state
    /// value stays at the initial value for the whole run. The two branches
    /// are distinct so no probability draw ever divides by zero.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<ComponentSample> {
        if self.max_component_id == 0 {
            return None;
        }

        let id = rng.gen_range(0..self.max_component_id);
        let mut states = self.states.lock().unwrap();
        let state = states.entry(id).or_insert(0);
        if self.change_probability > 0 && rng.gen_range(1..=self.change_probability) == 1 {
            *state += 1;
        }
        Some(ComponentSample { id, state: *state })
    }

    /// Number of component ids observed so far.
    pub fn tracked_components(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}
