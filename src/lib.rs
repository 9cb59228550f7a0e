//! # NEAT Innovation
//!
//! The innovation registry of a `NeuroEvolution` of Augmenting Topologies (NEAT)
//! engine: it hands out stable historical markings for structural mutations.
//!
//! ## Features
//!
//! - **Canonical Keys**: every mutation (seed neuron, link, link split) maps to a
//!   collision-free [`InnovationKey`]; equal keys mean homologous genes
//! - **Lazy Allocation**: ids are drawn from the population only the first time
//!   a mutation is seen; every later genome applying it gets the same record
//! - **Thread-Safe**: one short critical section per lookup, so parallel mutation
//!   operators never allocate two ids for the same mutation
//! - **Persistable**: [`InnovationSnapshot`] keeps canonical keys and ids intact
//!   through Serde
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use neat_innovation::{InnovationRegistry, PopulationCounters, TopologyConfig};
//!
//! // Two inputs, one output: bias + 2 inputs + 1 output, fully connected
//! let population = Arc::new(PopulationCounters::new(TopologyConfig::minimal(2, 1)));
//! let registry = InnovationRegistry::new(population).unwrap();
//! assert_eq!(registry.len(), 7);
//!
//! // Split the bias -> output link
//! let split = registry.find_split_innovation(0, 0).unwrap();
//! let hidden = split.neuron_id.unwrap();
//!
//! // The replacement links already exist and are shared by every genome
//! let into = registry.find_link_innovation(0, hidden).unwrap();
//! let again = registry.find_link_innovation(0, hidden).unwrap();
//! assert_eq!(into.innovation_id, again.innovation_id);
//! assert_eq!(registry.len(), 10);
//! ```
//!
//! ## Architecture
//!
//! ### Population-Owned Counters
//!
//! The registry owns no counters. Fresh neuron and innovation ids come from a
//! [`Population`], so several registries (or a restored one) can share one id
//! space. [`PopulationCounters`] is a lock-free implementation.
//!
//! ### Key Families
//!
//! - **Neurons**: `n:<neuron>`
//! - **Splits**: `ns:<from>:<to>`
//! - **Links**: `l:<from>:<to>`
//!
//! A split and a link over the same endpoints live under different keys.

pub mod error;
pub mod gene;
pub mod innovation;
pub mod population;
pub mod registry;

// Re-exports for convenience
pub use error::InnovationError;
pub use gene::{InnovationKind, NeuronType};
pub use innovation::{Innovation, InnovationKey};
pub use population::{Population, PopulationCounters, TopologyConfig};
pub use registry::{InnovationRegistry, InnovationSnapshot, NextIds};
