//! The population collaborator: identifier allocation and seed topology size.
//!
//! The registry does not own any counters. It asks a [`Population`] for fresh
//! neuron and innovation ids, which keeps ids unique across every registry and
//! thread sharing that population.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::InnovationError;

/// Capability the registry needs from the surrounding population.
///
/// Implementations must hand out each id at most once, in increasing order,
/// even when called from several threads at the same time.
pub trait Population: Send + Sync {
    /// Allocate a fresh neuron id.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::IdentifierOverflow`] once the id space is exhausted.
    fn next_neuron_id(&self) -> Result<u64, InnovationError>;

    /// Allocate a fresh innovation id.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::IdentifierOverflow`] once the id space is exhausted.
    fn next_innovation_id(&self) -> Result<u64, InnovationError>;

    /// Number of input neurons (excluding bias).
    fn input_count(&self) -> usize;

    /// Number of output neurons.
    fn output_count(&self) -> usize;
}

/// Size of the minimal seed topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Number of input neurons (excluding bias).
    pub num_inputs: usize,
    /// Number of output neurons.
    pub num_outputs: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 1,
        }
    }
}

impl TopologyConfig {
    /// Config for `num_inputs` inputs and `num_outputs` outputs.
    #[must_use]
    pub fn minimal(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
        }
    }

    /// Neuron ids used by the seed topology: bias, inputs and outputs.
    #[must_use]
    pub fn seed_neuron_count(&self) -> u64 {
        1 + self.num_inputs as u64 + self.num_outputs as u64
    }
}

/// Lock-free [`Population`] backed by two atomic counters.
#[derive(Debug)]
pub struct PopulationCounters {
    config: TopologyConfig,
    next_neuron: AtomicU64,
    next_innovation: AtomicU64,
}

impl PopulationCounters {
    /// Counters for a fresh population.
    ///
    /// Neuron ids start right after the seed topology (bias `0`, inputs, outputs);
    /// innovation ids start at `0`.
    #[must_use]
    pub fn new(config: TopologyConfig) -> Self {
        Self::resume(config, config.seed_neuron_count(), 0)
    }

    /// Counters continuing from previously allocated ids, e.g. after reloading
    /// a registry snapshot.
    #[must_use]
    pub fn resume(config: TopologyConfig, next_neuron: u64, next_innovation: u64) -> Self {
        Self {
            config,
            next_neuron: AtomicU64::new(next_neuron),
            next_innovation: AtomicU64::new(next_innovation),
        }
    }

    /// Topology these counters were created for.
    #[must_use]
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Peek at the next neuron id without allocating it.
    #[must_use]
    pub fn peek_neuron_id(&self) -> u64 {
        self.next_neuron.load(Ordering::Acquire)
    }

    /// Peek at the next innovation id without allocating it.
    #[must_use]
    pub fn peek_innovation_id(&self) -> u64 {
        self.next_innovation.load(Ordering::Acquire)
    }
}

/// `u64::MAX` is never handed out, so the counter itself can hold the
/// "exhausted" state without wrapping.
fn allocate(counter: &AtomicU64, name: &'static str) -> Result<u64, InnovationError> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            current.checked_add(1)
        })
        .map_err(|_| InnovationError::IdentifierOverflow { counter: name })
}

impl Population for PopulationCounters {
    fn next_neuron_id(&self) -> Result<u64, InnovationError> {
        allocate(&self.next_neuron, "neuron")
    }

    fn next_innovation_id(&self) -> Result<u64, InnovationError> {
        allocate(&self.next_innovation, "innovation")
    }

    fn input_count(&self) -> usize {
        self.config.num_inputs
    }

    fn output_count(&self) -> usize {
        self.config.num_outputs
    }
}
