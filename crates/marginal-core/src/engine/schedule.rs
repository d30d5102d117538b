//! The dependency-scoped phase graph.
//!
//! A compiled inference program is an ordered list of recomputation units.
//! Each unit is tagged with the observed inputs it depends on and whether it
//! participates in the iteration loop, and carries a done marker so work that
//! is already up to date is never redone:
//!
//! - **Constant** units run at most once per process lifetime.
//! - **Observed** units (initialization) run once per input version; setting
//!   a depended-on input clears the marker. Units flagged
//!   `reinit_on_execute` also re-run on a cold start, which is how
//!   warm-start state gets reset.
//! - **Iteration** units resume: a request for iteration `n` runs only the
//!   iterations past the unit's marker, never restarting from zero unless
//!   the marker was invalidated.
//!
//! The compiler emits units in dependency order, so registration order is
//! both the deterministic tie-break between unordered units and the order of
//! the one-pass forward invalidation walk.

use std::ops::Range;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::errors::RuntimeError;
use crate::engine::observed::ObservedStore;

/// The body of a recomputation unit.
///
/// Once-units receive an empty iteration range and ignore it; iteration
/// units receive the half-open range of iterations to run and must execute
/// exactly those.
pub type UnitBody<S> =
    Box<dyn FnMut(&mut S, &ObservedStore, Range<usize>) -> Result<(), RuntimeError>>;

/// What a recomputation unit's freshness depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyScope {
    /// No dependencies: computed at most once per process lifetime.
    Constant,
    /// Depends on a fixed set of observed inputs.
    Observed { inputs: SmallVec<[Arc<str>; 2]> },
    /// Depends on the iteration count (and possibly observed inputs).
    Iteration { inputs: SmallVec<[Arc<str>; 2]> },
}

impl DependencyScope {
    fn inputs(&self) -> &[Arc<str>] {
        match self {
            DependencyScope::Constant => &[],
            DependencyScope::Observed { inputs } | DependencyScope::Iteration { inputs } => inputs,
        }
    }

    fn is_iterative(&self) -> bool {
        matches!(self, DependencyScope::Iteration { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DoneMarker {
    Once { done: bool },
    Iterations { done: usize },
}

struct PhaseUnit<S> {
    name: Arc<str>,
    scope: DependencyScope,
    /// Indices of earlier units whose outputs this unit reads.
    reads: SmallVec<[usize; 4]>,
    /// Re-run this once-unit on a cold start even if its inputs are unchanged.
    reinit_on_execute: bool,
    marker: DoneMarker,
    runs: u64,
    body: UnitBody<S>,
}

/// Per-unit body execution counts, for invalidation-scope diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub runs: Vec<(Arc<str>, u64)>,
}

impl ScheduleStats {
    pub fn runs_for(&self, name: &str) -> u64 {
        self.runs
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, r)| *r)
            .unwrap_or(0)
    }
}

/// The ordered phase graph of one compiled program.
pub struct Schedule<S> {
    units: Vec<PhaseUnit<S>>,
    by_name: FxHashMap<Arc<str>, usize>,
    iterations_done: usize,
}

impl<S> Default for Schedule<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Schedule<S> {
    pub fn new() -> Self {
        Schedule {
            units: Vec::new(),
            by_name: FxHashMap::default(),
            iterations_done: 0,
        }
    }

    /// Registers a recomputation unit.
    ///
    /// `reads` names earlier units only (the compiler emits units in
    /// dependency order); a forward or unknown reference is an argument
    /// error. Constant units may read only constant units, since nothing is
    /// allowed to invalidate them.
    pub fn register(
        &mut self,
        name: &str,
        scope: DependencyScope,
        reads: &[&str],
        reinit_on_execute: bool,
        body: impl FnMut(&mut S, &ObservedStore, Range<usize>) -> Result<(), RuntimeError> + 'static,
    ) -> Result<(), RuntimeError> {
        if self.by_name.contains_key(name) {
            return Err(RuntimeError::Argument(format!(
                "recomputation unit '{name}' is already registered"
            )));
        }
        let mut read_indices = SmallVec::new();
        for read in reads {
            let &idx = self.by_name.get(*read).ok_or_else(|| {
                RuntimeError::Argument(format!(
                    "unit '{name}' reads '{read}', which is not registered yet"
                ))
            })?;
            if scope == DependencyScope::Constant
                && self.units[idx].scope != DependencyScope::Constant
            {
                return Err(RuntimeError::Argument(format!(
                    "constant unit '{name}' may not read non-constant unit '{read}'"
                )));
            }
            read_indices.push(idx);
        }
        let marker = if scope.is_iterative() {
            DoneMarker::Iterations { done: 0 }
        } else {
            DoneMarker::Once { done: false }
        };
        let name: Arc<str> = Arc::from(name);
        self.by_name.insert(name.clone(), self.units.len());
        self.units.push(PhaseUnit {
            name,
            scope,
            reads: read_indices,
            reinit_on_execute,
            marker,
            runs: 0,
            body: Box::new(body),
        });
        Ok(())
    }

    /// Registers a unit with no dependencies, computed at most once.
    pub fn register_constant(
        &mut self,
        name: &str,
        body: impl FnMut(&mut S, &ObservedStore, Range<usize>) -> Result<(), RuntimeError> + 'static,
    ) -> Result<(), RuntimeError> {
        self.register(name, DependencyScope::Constant, &[], false, body)
    }

    /// Registers an initialization unit tied to a set of observed inputs.
    pub fn register_init(
        &mut self,
        name: &str,
        inputs: &[&str],
        reads: &[&str],
        reinit_on_execute: bool,
        body: impl FnMut(&mut S, &ObservedStore, Range<usize>) -> Result<(), RuntimeError> + 'static,
    ) -> Result<(), RuntimeError> {
        self.register(
            name,
            DependencyScope::Observed {
                inputs: inputs.iter().map(|&i| Arc::from(i)).collect(),
            },
            reads,
            reinit_on_execute,
            body,
        )
    }

    /// Registers a unit driven by the iteration count.
    pub fn register_iterative(
        &mut self,
        name: &str,
        inputs: &[&str],
        reads: &[&str],
        body: impl FnMut(&mut S, &ObservedStore, Range<usize>) -> Result<(), RuntimeError> + 'static,
    ) -> Result<(), RuntimeError> {
        self.register(
            name,
            DependencyScope::Iteration {
                inputs: inputs.iter().map(|&i| Arc::from(i)).collect(),
            },
            reads,
            false,
            body,
        )
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// The highest iteration count this schedule has completed.
    pub fn iterations_done(&self) -> usize {
        self.iterations_done
    }

    /// Clears the done markers of every unit that transitively depends on
    /// `input`, in one forward pass over the (topologically ordered) units.
    pub fn invalidate_input(&mut self, input: &str) {
        let mut dirty = vec![false; self.units.len()];
        for idx in 0..self.units.len() {
            let depends = self.units[idx]
                .scope
                .inputs()
                .iter()
                .any(|i| i.as_ref() == input)
                || self.units[idx].reads.iter().any(|&r| dirty[r]);
            if !depends {
                continue;
            }
            dirty[idx] = true;
            match &mut self.units[idx].marker {
                DoneMarker::Once { done } => *done = false,
                DoneMarker::Iterations { done } => *done = 0,
            }
        }
    }

    /// Brings every unit up to `target` iterations.
    ///
    /// With `initialise` set (cold start), iteration markers are cleared and
    /// `reinit_on_execute` init units re-run; otherwise units resume from
    /// their markers. `progress` fires once per completed iteration in which
    /// any unit ran. A failing body propagates immediately, leaving its
    /// marker unadvanced.
    pub fn request(
        &mut self,
        state: &mut S,
        observed: &ObservedStore,
        target: usize,
        initialise: bool,
        progress: &mut dyn FnMut(usize),
    ) -> Result<(), RuntimeError> {
        if initialise {
            self.iterations_done = 0;
            for unit in &mut self.units {
                match &mut unit.marker {
                    DoneMarker::Once { done } => {
                        if unit.reinit_on_execute && unit.scope != DependencyScope::Constant {
                            *done = false;
                        }
                    }
                    DoneMarker::Iterations { done } => *done = 0,
                }
            }
        }

        // Stale once-units first, in registration order.
        for unit in &mut self.units {
            if let DoneMarker::Once { done } = unit.marker {
                if !done {
                    (unit.body)(state, observed, 0..0)?;
                    unit.marker = DoneMarker::Once { done: true };
                    unit.runs += 1;
                }
            }
        }

        // Iteration units advance one iteration at a time, interleaved, so
        // units exchanging messages within an iteration see each other's
        // current values exactly as an unpartitioned single loop would.
        let iterative: Vec<usize> = (0..self.units.len())
            .filter(|&i| self.units[i].scope.is_iterative())
            .collect();
        for iter in 0..target {
            let mut advanced = false;
            for &idx in &iterative {
                let unit = &mut self.units[idx];
                if let DoneMarker::Iterations { done } = unit.marker {
                    if done <= iter {
                        (unit.body)(state, observed, iter..iter + 1)?;
                        unit.marker = DoneMarker::Iterations { done: iter + 1 };
                        unit.runs += 1;
                        advanced = true;
                    }
                }
            }
            if advanced {
                progress(iter);
            }
        }

        if target > self.iterations_done {
            self.iterations_done = target;
        }
        Ok(())
    }

    pub fn stats(&self) -> ScheduleStats {
        ScheduleStats {
            runs: self.units.iter().map(|u| (u.name.clone(), u.runs)).collect(),
        }
    }

    pub fn reset_stats(&mut self) {
        for unit in &mut self.units {
            unit.runs = 0;
        }
    }
}
