//! Canonical innovation keys and innovation records.
//!
//! Every structural mutation is described by an [`InnovationKey`]. Two genomes
//! that apply the same mutation produce equal keys, so the registry hands both
//! the same [`Innovation`]. Keys render to a canonical string form:
//!
//! - single neuron: `n:<neuron>`
//! - neuron from a split: `ns:<from>:<to>`
//! - link: `l:<from>:<to>`
//!
//! Each family has its own prefix, so a split and a link over the same
//! endpoints never share a store entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InnovationError;
use crate::gene::{InnovationKind, NeuronType};

/// Canonical description of a structural mutation.
///
/// Endpoints are ordered: `Link { from: 1, to: 2 }` and `Link { from: 2, to: 1 }`
/// are distinct mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum InnovationKey {
    /// A neuron introduced without a split (bias, input, output).
    Neuron(u64),
    /// A hidden neuron introduced by splitting the link `from -> to`.
    Split { from: u64, to: u64 },
    /// A link `from -> to`.
    Link { from: u64, to: u64 },
}

impl InnovationKey {
    const NEURON_PREFIX: &'static str = "n";
    const SPLIT_PREFIX: &'static str = "ns";
    const LINK_PREFIX: &'static str = "l";
}

impl fmt::Display for InnovationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neuron(id) => write!(f, "{}:{id}", Self::NEURON_PREFIX),
            Self::Split { from, to } => write!(f, "{}:{from}:{to}", Self::SPLIT_PREFIX),
            Self::Link { from, to } => write!(f, "{}:{from}:{to}", Self::LINK_PREFIX),
        }
    }
}

impl FromStr for InnovationKey {
    type Err = InnovationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || InnovationError::InvalidArgument(format!("malformed innovation key `{s}`"));
        let parse_id = |part: &str| -> Result<u64, InnovationError> {
            // u64::from_str accepts a leading '+', which would break canonical form
            if part.starts_with('+') {
                return Err(malformed());
            }
            part.parse::<u64>().map_err(|_| malformed())
        };

        let mut parts = s.split(':');
        let prefix = parts.next().ok_or_else(malformed)?;
        let ids = parts.map(parse_id).collect::<Result<Vec<_>, _>>()?;

        match (prefix, ids.as_slice()) {
            (Self::NEURON_PREFIX, &[id]) => Ok(Self::Neuron(id)),
            (Self::SPLIT_PREFIX, &[from, to]) => Ok(Self::Split { from, to }),
            (Self::LINK_PREFIX, &[from, to]) => Ok(Self::Link { from, to }),
            _ => Err(malformed()),
        }
    }
}

impl From<InnovationKey> for String {
    fn from(key: InnovationKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for InnovationKey {
    type Error = InnovationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A historical marking for one structural mutation.
///
/// Records are created once by the registry and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Innovation {
    /// Population-wide unique id, assigned in creation order.
    pub innovation_id: u64,
    /// Whether this innovation introduced a neuron or a link.
    pub kind: InnovationKind,
    /// Source endpoint. For split neurons, the source of the split link.
    pub from_neuron: Option<u64>,
    /// Target endpoint. For split neurons, the target of the split link.
    pub to_neuron: Option<u64>,
    /// The neuron introduced by this innovation; `None` for links.
    pub neuron_id: Option<u64>,
    /// Role of the introduced neuron. Links carry `Hidden`.
    pub neuron_type: NeuronType,
}

impl Innovation {
    /// Create a record for a neuron introduced without a split.
    #[must_use]
    pub fn neuron(innovation_id: u64, neuron_id: u64, neuron_type: NeuronType) -> Self {
        Self {
            innovation_id,
            kind: InnovationKind::NewNeuron,
            from_neuron: None,
            to_neuron: None,
            neuron_id: Some(neuron_id),
            neuron_type,
        }
    }

    /// Create a record for a hidden neuron that splits the link `from -> to`.
    #[must_use]
    pub fn split(innovation_id: u64, neuron_id: u64, from: u64, to: u64) -> Self {
        Self {
            innovation_id,
            kind: InnovationKind::NewNeuron,
            from_neuron: Some(from),
            to_neuron: Some(to),
            neuron_id: Some(neuron_id),
            neuron_type: NeuronType::Hidden,
        }
    }

    /// Create a record for a new link `from -> to`.
    #[must_use]
    pub fn link(innovation_id: u64, from: u64, to: u64) -> Self {
        Self {
            innovation_id,
            kind: InnovationKind::NewLink,
            from_neuron: Some(from),
            to_neuron: Some(to),
            neuron_id: None,
            neuron_type: NeuronType::Hidden,
        }
    }

    /// The canonical key this record belongs under.
    ///
    /// # Errors
    ///
    /// Returns [`InnovationError::InvalidArgument`] if the fields are
    /// inconsistent with the record's kind, which can only happen for records
    /// built by hand or loaded from outside.
    pub fn key(&self) -> Result<InnovationKey, InnovationError> {
        match (self.kind, self.from_neuron, self.to_neuron, self.neuron_id) {
            (InnovationKind::NewNeuron, None, None, Some(id)) => Ok(InnovationKey::Neuron(id)),
            (InnovationKind::NewNeuron, Some(from), Some(to), Some(_))
                if self.neuron_type == NeuronType::Hidden =>
            {
                Ok(InnovationKey::Split { from, to })
            }
            (InnovationKind::NewLink, Some(from), Some(to), None) => {
                Ok(InnovationKey::Link { from, to })
            }
            _ => Err(InnovationError::InvalidArgument(format!(
                "innovation {} has fields inconsistent with its kind",
                self.innovation_id
            ))),
        }
    }
}
