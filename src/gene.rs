//! Gene classification types shared by innovation records.
//!
//! - [`NeuronType`]: the role a neuron plays in the network
//! - [`InnovationKind`]: whether an innovation introduced a neuron or a link

use serde::{Deserialize, Serialize};

/// The type/role of a neuron in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronType {
    /// Bias neuron - always outputs 1.0, occupies neuron id 0.
    Bias,
    /// Input neuron - receives external values.
    Input,
    /// Hidden neuron - introduced by splitting a link.
    Hidden,
    /// Output neuron - produces final network output.
    Output,
}

/// The structural mutation an innovation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InnovationKind {
    /// A neuron was added, either as part of the seed topology or by a split.
    NewNeuron,
    /// A link was added between two existing neurons.
    NewLink,
}

impl InnovationKind {
    /// `true` for innovations that introduced a neuron.
    #[must_use]
    pub fn is_neuron(self) -> bool {
        self == Self::NewNeuron
    }
}
