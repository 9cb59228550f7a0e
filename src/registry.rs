//! The innovation registry: one record per structural mutation.
//!
//! [`InnovationRegistry`] maps each [`InnovationKey`] to exactly one
//! [`Innovation`]. Lookups either return the existing record or allocate fresh
//! ids from the attached [`Population`] and insert a new one. The check,
//! the allocation and the insert happen under a single lock, so concurrent
//! mutation operators asking for the same key always agree on the result.
//!
//! ## Splits
//!
//! Splitting the link `from -> to` introduces a hidden neuron plus the links
//! `from -> neuron` and `neuron -> to`. The neuron record is inserted first,
//! the lock is released, and the two links are then registered as ordinary,
//! independently idempotent link lookups. Only the call that created the
//! split registers its links; later hits return the stored neuron record.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::InnovationError;
use crate::gene::NeuronType;
use crate::innovation::{Innovation, InnovationKey};
use crate::population::Population;

/// Population-wide store of innovations.
pub struct InnovationRegistry {
    population: Option<Arc<dyn Population>>,
    store: RwLock<HashMap<InnovationKey, Innovation>>,
    /// Lowest ids a fresh allocation may return; nonzero only after `restore`.
    floors: NextIds,
}

impl fmt::Debug for InnovationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnovationRegistry")
            .field("attached", &self.population.is_some())
            .field("innovations", &self.len())
            .finish()
    }
}

impl InnovationRegistry {
    /// Create a registry seeded with the minimal topology of `population`:
    /// the bias neuron, every input and output neuron, and a link from the
    /// bias and every input to every output.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::IdentifierOverflow`] if the population runs
    /// out of ids while seeding.
    pub fn new(population: Arc<dyn Population>) -> Result<Self, InnovationError> {
        let registry = Self {
            population: Some(population),
            store: RwLock::new(HashMap::new()),
            floors: NextIds::default(),
        };
        registry.seed()?;
        Ok(registry)
    }

    /// Create an empty registry with no population.
    ///
    /// Every lookup fails with [`InnovationError::Configuration`] until
    /// [`attach_population`](Self::attach_population) is called.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            population: None,
            store: RwLock::new(HashMap::new()),
            floors: NextIds::default(),
        }
    }

    /// Rebuild a registry from a snapshot without re-seeding.
    ///
    /// The population's counters must already be past every id in the
    /// snapshot; see [`InnovationSnapshot::next_free_ids`]. Creating a record
    /// with an id the snapshot already covers fails with
    /// [`InnovationError::Configuration`] and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::InvalidArgument`] if a record is stored
    /// under a key other than its own, or if two records share an
    /// innovation id.
    pub fn restore(
        snapshot: InnovationSnapshot,
        population: Arc<dyn Population>,
    ) -> Result<Self, InnovationError> {
        let mut seen = HashSet::with_capacity(snapshot.innovations.len());
        for (key, innovation) in &snapshot.innovations {
            let derived = innovation.key()?;
            if derived != *key {
                return Err(InnovationError::InvalidArgument(format!(
                    "innovation {} stored under `{key}` but belongs under `{derived}`",
                    innovation.innovation_id
                )));
            }
            if !seen.insert(innovation.innovation_id) {
                return Err(InnovationError::InvalidArgument(format!(
                    "innovation id {} appears more than once",
                    innovation.innovation_id
                )));
            }
        }

        let floors = snapshot.next_free_ids();
        debug!(
            "restored {} innovations, next free neuron {} innovation {}",
            snapshot.innovations.len(),
            floors.neuron,
            floors.innovation
        );
        Ok(Self {
            population: Some(population),
            store: RwLock::new(snapshot.innovations.into_iter().collect()),
            floors,
        })
    }

    /// Supply (or replace) the population that allocates ids.
    pub fn attach_population(&mut self, population: Arc<dyn Population>) {
        self.population = Some(population);
    }

    fn population(&self) -> Result<&dyn Population, InnovationError> {
        self.population
            .as_deref()
            .ok_or_else(|| InnovationError::Configuration("no population attached".into()))
    }

    /// Find or create the innovation for a neuron introduced without a split
    /// (bias, input or output).
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::Configuration`] if no population is attached,
    /// or [`InnovationError::IdentifierOverflow`] if a new id cannot be allocated.
    pub fn find_neuron_innovation(
        &self,
        neuron_id: u64,
        neuron_type: NeuronType,
    ) -> Result<Innovation, InnovationError> {
        let (innovation, _) =
            self.insert_if_absent(InnovationKey::Neuron(neuron_id), |population| {
                Ok(Innovation::neuron(
                    population.next_innovation_id()?,
                    neuron_id,
                    neuron_type,
                ))
            })?;
        Ok(innovation)
    }

    /// Find or create the innovation for a link `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::Configuration`] if no population is attached,
    /// or [`InnovationError::IdentifierOverflow`] if a new id cannot be allocated.
    pub fn find_link_innovation(&self, from: u64, to: u64) -> Result<Innovation, InnovationError> {
        let (innovation, _) =
            self.insert_if_absent(InnovationKey::Link { from, to }, |population| {
                Ok(Innovation::link(population.next_innovation_id()?, from, to))
            })?;
        Ok(innovation)
    }

    /// Find or create the hidden-neuron innovation for splitting `from -> to`.
    ///
    /// On creation a fresh neuron id is allocated and the links
    /// `from -> neuron` and `neuron -> to` are registered as well.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::Configuration`] if no population is attached,
    /// or [`InnovationError::IdentifierOverflow`] if a new id cannot be allocated.
    pub fn find_split_innovation(&self, from: u64, to: u64) -> Result<Innovation, InnovationError> {
        let (innovation, created) =
            self.insert_if_absent(InnovationKey::Split { from, to }, |population| {
                let neuron_id = population.next_neuron_id()?;
                Ok(Innovation::split(
                    population.next_innovation_id()?,
                    neuron_id,
                    from,
                    to,
                ))
            })?;

        // Lock is released here; the links are separate lookups.
        if created {
            if let Some(neuron_id) = innovation.neuron_id {
                self.find_link_innovation(from, neuron_id)?;
                self.find_link_innovation(neuron_id, to)?;
            }
        }
        Ok(innovation)
    }

    /// Return the record stored under `key`, creating it with `create` if absent.
    ///
    /// The flag is `true` only for the call that created the record.
    fn insert_if_absent<F>(
        &self,
        key: InnovationKey,
        create: F,
    ) -> Result<(Innovation, bool), InnovationError>
    where
        F: FnOnce(&dyn Population) -> Result<Innovation, InnovationError>,
    {
        let population = self.population()?;
        if let Some(existing) = self.store.read().get(&key).copied() {
            trace!("innovation hit for {key}");
            return Ok((existing, false));
        }

        let (innovation, created) = {
            let mut store = self.store.write();
            match store.entry(key) {
                Entry::Occupied(entry) => (*entry.get(), false),
                Entry::Vacant(entry) => {
                    let innovation = create(population)?;
                    self.check_floors(&innovation)?;
                    entry.insert(innovation);
                    (innovation, true)
                }
            }
        };

        if created {
            debug!(
                "new innovation {} for {key} ({:?})",
                innovation.innovation_id, innovation.kind
            );
        } else {
            trace!("innovation hit for {key}");
        }
        Ok((innovation, created))
    }

    /// Reject ids a restored snapshot already uses.
    fn check_floors(&self, innovation: &Innovation) -> Result<(), InnovationError> {
        if innovation.innovation_id < self.floors.innovation {
            return Err(InnovationError::Configuration(format!(
                "population allocated innovation id {} but ids below {} are already in use",
                innovation.innovation_id, self.floors.innovation
            )));
        }
        if innovation.from_neuron.is_some() {
            if let Some(neuron_id) = innovation.neuron_id {
                if neuron_id < self.floors.neuron {
                    return Err(InnovationError::Configuration(format!(
                        "population allocated neuron id {neuron_id} but ids below {} are already in use",
                        self.floors.neuron
                    )));
                }
            }
        }
        Ok(())
    }

    /// Register the seed topology. Already present records are left alone.
    fn seed(&self) -> Result<(), InnovationError> {
        let population = self.population()?;
        let inputs = population.input_count() as u64;
        let outputs = population.output_count() as u64;

        self.find_neuron_innovation(0, NeuronType::Bias)?;
        for i in 0..inputs {
            self.find_neuron_innovation(1 + i, NeuronType::Input)?;
        }
        for i in 0..outputs {
            self.find_neuron_innovation(1 + inputs + i, NeuronType::Output)?;
        }

        // Targets are output positions, not offset into the neuron id space.
        for from in 0..=inputs {
            for to in 0..outputs {
                self.find_link_innovation(from, to)?;
            }
        }

        debug!(
            "seeded {} innovations for {inputs} inputs and {outputs} outputs",
            self.len()
        );
        Ok(())
    }

    /// Look up a record without creating it.
    #[must_use]
    pub fn get(&self, key: &InnovationKey) -> Option<Innovation> {
        self.store.read().get(key).copied()
    }

    /// Number of known innovations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// `true` if no innovation has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Copy of every known innovation, ordered by key.
    #[must_use]
    pub fn innovations(&self) -> BTreeMap<InnovationKey, Innovation> {
        self.store
            .read()
            .iter()
            .map(|(key, innovation)| (*key, *innovation))
            .collect()
    }

    /// Serializable copy of the registry contents.
    #[must_use]
    pub fn snapshot(&self) -> InnovationSnapshot {
        InnovationSnapshot {
            innovations: self.innovations(),
        }
    }
}

/// Serializable registry contents, keyed by canonical key strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnovationSnapshot {
    /// Every record, under its canonical key.
    pub innovations: BTreeMap<InnovationKey, Innovation>,
}

/// First ids not used by any record in a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NextIds {
    /// First unused neuron id.
    pub neuron: u64,
    /// First unused innovation id.
    pub innovation: u64,
}

impl InnovationSnapshot {
    /// Number of recorded innovations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.innovations.len()
    }

    /// `true` if the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.innovations.is_empty()
    }

    /// Ids a population should resume from so new allocations never collide
    /// with recorded ones. Bootstrap link targets are output positions, so
    /// endpoints count towards the neuron id as well.
    #[must_use]
    pub fn next_free_ids(&self) -> NextIds {
        let records = self.innovations.values();
        let neuron = records
            .clone()
            .flat_map(|i| [i.neuron_id, i.from_neuron, i.to_neuron])
            .flatten()
            .max()
            .map_or(0, |max| max.saturating_add(1));
        let innovation = records
            .map(|i| i.innovation_id)
            .max()
            .map_or(0, |max| max.saturating_add(1));
        NextIds { neuron, innovation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::InnovationKind;
    use crate::population::{PopulationCounters, TopologyConfig};

    fn seeded(inputs: usize, outputs: usize) -> (Arc<PopulationCounters>, InnovationRegistry) {
        let counters = Arc::new(PopulationCounters::new(TopologyConfig::minimal(
            inputs, outputs,
        )));
        let registry = InnovationRegistry::new(counters.clone()).unwrap();
        (counters, registry)
    }

    #[test]
    fn test_seed_counts() {
        let (_, registry) = seeded(2, 1);
        let all = registry.innovations();
        let neurons = all.values().filter(|i| i.kind.is_neuron()).count();
        let links = all.values().filter(|i| !i.kind.is_neuron()).count();
        assert_eq!(neurons, 4);
        assert_eq!(links, 3);
        assert_eq!(registry.len(), 7);

        let (_, registry) = seeded(3, 2);
        assert_eq!(registry.len(), (1 + 3 + 2) + (3 + 1) * 2);
    }

    #[test]
    fn test_seed_neuron_roles() {
        let (_, registry) = seeded(2, 1);
        let role = |id| registry.get(&InnovationKey::Neuron(id)).unwrap().neuron_type;
        assert_eq!(role(0), NeuronType::Bias);
        assert_eq!(role(1), NeuronType::Input);
        assert_eq!(role(2), NeuronType::Input);
        assert_eq!(role(3), NeuronType::Output);
        assert!(registry.get(&InnovationKey::Neuron(4)).is_none());

        for from in 0..=2 {
            assert!(registry.get(&InnovationKey::Link { from, to: 0 }).is_some());
        }
    }

    #[test]
    fn test_neuron_idempotent() {
        let (_, registry) = seeded(1, 1);
        let a = registry.find_neuron_innovation(50, NeuronType::Output).unwrap();
        let b = registry.find_neuron_innovation(50, NeuronType::Output).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.from_neuron, None);
        assert_eq!(a.to_neuron, None);
        assert_eq!(a.neuron_id, Some(50));
    }

    #[test]
    fn test_link_direction_matters() {
        let (_, registry) = seeded(1, 1);
        let forward = registry.find_link_innovation(5, 9).unwrap();
        let again = registry.find_link_innovation(5, 9).unwrap();
        let reverse = registry.find_link_innovation(9, 5).unwrap();
        assert_eq!(forward, again);
        assert_ne!(forward.innovation_id, reverse.innovation_id);
        assert_eq!(forward.kind, InnovationKind::NewLink);
        assert_eq!(forward.neuron_id, None);
    }

    #[test]
    fn test_split_registers_links_once() {
        let (counters, registry) = seeded(2, 1);
        let before = registry.len();

        let split = registry.find_split_innovation(1, 0).unwrap();
        let neuron = split.neuron_id.unwrap();
        assert_eq!(split.neuron_type, NeuronType::Hidden);
        assert_eq!(split.kind, InnovationKind::NewNeuron);
        assert_eq!((split.from_neuron, split.to_neuron), (Some(1), Some(0)));
        assert_eq!(registry.len(), before + 3);

        let innovation_mark = counters.peek_innovation_id();
        let neuron_mark = counters.peek_neuron_id();
        let again = registry.find_split_innovation(1, 0).unwrap();
        assert_eq!(split, again);
        assert_eq!(registry.len(), before + 3);
        assert_eq!(counters.peek_innovation_id(), innovation_mark);
        assert_eq!(counters.peek_neuron_id(), neuron_mark);

        let into = registry.get(&InnovationKey::Link { from: 1, to: neuron }).unwrap();
        let out = registry.get(&InnovationKey::Link { from: neuron, to: 0 }).unwrap();
        let original = registry.get(&InnovationKey::Link { from: 1, to: 0 }).unwrap();
        assert_ne!(into.innovation_id, out.innovation_id);
        assert_ne!(into.innovation_id, original.innovation_id);
        assert_ne!(out.innovation_id, original.innovation_id);
    }

    #[test]
    fn test_split_and_link_do_not_collide() {
        let (_, registry) = seeded(1, 1);
        let link = registry.find_link_innovation(7, 8).unwrap();
        let split = registry.find_split_innovation(7, 8).unwrap();
        assert_eq!(link.kind, InnovationKind::NewLink);
        assert_eq!(split.kind, InnovationKind::NewNeuron);
        assert_ne!(link.innovation_id, split.innovation_id);
    }

    #[test]
    fn test_ids_increase_in_creation_order() {
        let (_, registry) = seeded(1, 1);
        let mut last = None;
        for n in 10..40 {
            let created = if n % 3 == 0 {
                registry.find_split_innovation(n, n + 1).unwrap()
            } else {
                registry.find_link_innovation(n, n + 1).unwrap()
            };
            if let Some(prev) = last {
                assert!(created.innovation_id > prev);
            }
            last = Some(created.innovation_id);
        }
    }

    #[test]
    fn test_detached_registry_requires_population() {
        let mut registry = InnovationRegistry::detached();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.find_link_innovation(0, 1),
            Err(InnovationError::Configuration(_))
        ));
        assert!(matches!(
            registry.find_split_innovation(0, 1),
            Err(InnovationError::Configuration(_))
        ));
        assert!(matches!(
            registry.find_neuron_innovation(0, NeuronType::Bias),
            Err(InnovationError::Configuration(_))
        ));

        registry.attach_population(Arc::new(PopulationCounters::new(TopologyConfig::default())));
        let link = registry.find_link_innovation(0, 1).unwrap();
        assert_eq!(link.innovation_id, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overflow_propagates_without_inserting() {
        let counters = Arc::new(PopulationCounters::resume(
            TopologyConfig::minimal(0, 0),
            0,
            u64::MAX,
        ));
        let mut registry = InnovationRegistry::detached();
        registry.attach_population(counters);
        assert_eq!(
            registry.find_link_innovation(1, 2),
            Err(InnovationError::IdentifierOverflow {
                counter: "innovation"
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_same_link_allocates_once() {
        let (counters, registry) = seeded(2, 2);
        let mark = counters.peek_innovation_id();
        let results: Vec<Innovation> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| registry.find_link_innovation(40, 41).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|r| *r == results[0]));
        assert_eq!(counters.peek_innovation_id(), mark + 1);
    }

    #[test]
    fn test_snapshot_next_free_ids() {
        let (counters, registry) = seeded(2, 1);
        registry.find_split_innovation(0, 0).unwrap();
        let ids = registry.snapshot().next_free_ids();
        assert_eq!(ids.neuron, counters.peek_neuron_id());
        assert_eq!(ids.innovation, counters.peek_innovation_id());

        let empty = InnovationSnapshot::default().next_free_ids();
        assert_eq!(empty, NextIds { neuron: 0, innovation: 0 });
    }

    #[test]
    fn test_restore_rejects_misfiled_record() {
        let mut snapshot = InnovationSnapshot::default();
        snapshot
            .innovations
            .insert(InnovationKey::Link { from: 1, to: 2 }, Innovation::link(0, 2, 1));
        let counters = Arc::new(PopulationCounters::new(TopologyConfig::default()));
        assert!(matches!(
            InnovationRegistry::restore(snapshot, counters),
            Err(InnovationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_restore_rejects_duplicate_ids() {
        let mut snapshot = InnovationSnapshot::default();
        snapshot
            .innovations
            .insert(InnovationKey::Link { from: 1, to: 2 }, Innovation::link(3, 1, 2));
        snapshot
            .innovations
            .insert(InnovationKey::Link { from: 2, to: 1 }, Innovation::link(3, 2, 1));
        let counters = Arc::new(PopulationCounters::new(TopologyConfig::default()));
        assert!(matches!(
            InnovationRegistry::restore(snapshot, counters),
            Err(InnovationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_restore_with_fresh_counters_refuses_reused_ids() {
        let config = TopologyConfig::minimal(2, 1);
        let (_, original) = seeded(2, 1);
        let snapshot = original.snapshot();

        // Counters that were never resumed would hand out id 0 again
        let stale = Arc::new(PopulationCounters::new(config));
        let restored = InnovationRegistry::restore(snapshot.clone(), stale).unwrap();
        assert!(matches!(
            restored.find_link_innovation(40, 41),
            Err(InnovationError::Configuration(_))
        ));
        assert!(matches!(
            restored.find_split_innovation(1, 0),
            Err(InnovationError::Configuration(_))
        ));
        assert_eq!(restored.len(), snapshot.len());

        // Existing records are still served
        let bias = restored.find_neuron_innovation(0, NeuronType::Bias).unwrap();
        assert_eq!(bias, snapshot.innovations[&InnovationKey::Neuron(0)]);

        let next = snapshot.next_free_ids();
        let resumed = Arc::new(PopulationCounters::resume(config, next.neuron, next.innovation));
        let restored = InnovationRegistry::restore(snapshot, resumed).unwrap();
        let fresh = restored.find_link_innovation(40, 41).unwrap();
        assert_eq!(fresh.innovation_id, next.innovation);
    }

    #[test]
    fn test_restore_refuses_reused_split_neuron() {
        let config = TopologyConfig::minimal(1, 1);
        let (_, original) = seeded(1, 1);
        original.find_split_innovation(0, 0).unwrap();
        let snapshot = original.snapshot();
        let next = snapshot.next_free_ids();

        // Innovation ids are past the snapshot, neuron ids are not
        let counters = Arc::new(PopulationCounters::resume(
            config,
            config.seed_neuron_count(),
            next.innovation,
        ));
        let restored = InnovationRegistry::restore(snapshot, counters).unwrap();
        assert!(matches!(
            restored.find_split_innovation(1, 0),
            Err(InnovationError::Configuration(_))
        ));
        assert!(restored.get(&InnovationKey::Split { from: 1, to: 0 }).is_none());
    }

    #[test]
    fn test_reads_run_alongside_writers() {
        let (_, registry) = seeded(2, 1);
        std::thread::scope(|s| {
            s.spawn(|| {
                for n in 100..400 {
                    registry.find_link_innovation(n, n + 1).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..300 {
                    assert!(registry.len() >= 7);
                    assert!(registry.get(&InnovationKey::Neuron(0)).is_some());
                }
            });
        });
        assert_eq!(registry.len(), 7 + 300);
    }
}
