//! The distinct multiplexers found while elaborating a fabric.

use serde::{Deserialize, Serialize};

use crate::circuit_library::{CircuitLibrary, CircuitModelId, MuxStructure};
use crate::error::Result;
use crate::mux_graph::MuxGraph;

/// Index of a multiplexer in a [`MuxLibrary`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MuxId(pub usize);

/// One distinct multiplexer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MuxEntry {
    /// Model it is built from.
    pub circuit_model: CircuitModelId,
    /// Its connectivity.
    pub graph: MuxGraph,
}

/// Multiplexers keyed by circuit model and graph shape, in discovery order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MuxLibrary {
    muxes: Vec<MuxEntry>,
}

impl MuxLibrary {
    /// An empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a multiplexer, returning the id of an identical one if it was seen before.
    pub fn add_mux(&mut self, circuit_model: CircuitModelId, graph: MuxGraph) -> MuxId {
        if let Some(index) = self
            .muxes
            .iter()
            .position(|entry| entry.circuit_model == circuit_model && entry.graph == graph)
        {
            return MuxId(index);
        }

        self.muxes.push(MuxEntry { circuit_model, graph });
        MuxId(self.muxes.len() - 1)
    }

    /// Record a `size`:1 multiplexer laid out the way its circuit model asks for.
    ///
    /// # Errors
    ///
    /// Fails if `circuit_model` is not in `circuit_lib`.
    pub fn add_mux_of_size(&mut self, circuit_lib: &CircuitLibrary, circuit_model: CircuitModelId, size: usize) -> Result<MuxId> {
        let graph = match circuit_lib.model(circuit_model)?.structure {
            MuxStructure::OneLevel => MuxGraph::one_level(size),
            MuxStructure::Tree => MuxGraph::tree(size),
            MuxStructure::MultiLevel { levels } => MuxGraph::multi_level(size, levels),
        };
        Ok(self.add_mux(circuit_model, graph))
    }

    /// Every multiplexer in insertion order.
    pub fn muxes(&self) -> impl Iterator<Item = MuxId> {
        (0..self.muxes.len()).map(MuxId)
    }

    /// Graph of `mux`.
    #[must_use]
    pub fn mux_graph(&self, mux: MuxId) -> &MuxGraph {
        &self.muxes[mux.0].graph
    }

    /// Model `mux` is built from.
    #[must_use]
    pub fn mux_circuit_model(&self, mux: MuxId) -> CircuitModelId {
        self.muxes[mux.0].circuit_model
    }

    /// Number of distinct multiplexers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.muxes.len()
    }

    /// True if no multiplexer was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.muxes.is_empty()
    }

    /// Largest input count of any multiplexer, zero for an empty library.
    #[must_use]
    pub fn max_mux_size(&self) -> usize {
        self.muxes.iter().map(|entry| entry.graph.num_inputs()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{MuxId, MuxLibrary};
    use crate::circuit_library::{CircuitLibrary, CircuitModel, CircuitModelKind, MuxStructure};
    use crate::mux_graph::MuxGraph;

    #[test]
    fn identical_muxes_are_stored_once() {
        let mut circuit_lib = CircuitLibrary::new();
        let tree = circuit_lib.add_model(CircuitModel::new("mux_tree", CircuitModelKind::Mux));
        let mut one_level = CircuitModel::new("mux_1level", CircuitModelKind::Mux);
        one_level.structure = MuxStructure::OneLevel;
        let one_level = circuit_lib.add_model(one_level);

        let mut mux_lib = MuxLibrary::new();
        let first = mux_lib.add_mux_of_size(&circuit_lib, tree, 8).unwrap();
        let second = mux_lib.add_mux_of_size(&circuit_lib, tree, 8).unwrap();
        let other_model = mux_lib.add_mux_of_size(&circuit_lib, one_level, 8).unwrap();
        let other_size = mux_lib.add_mux_of_size(&circuit_lib, tree, 4).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other_model);
        assert_ne!(first, other_size);
        assert_eq!(mux_lib.len(), 3);
        assert_eq!(mux_lib.muxes().collect::<Vec<_>>(), vec![MuxId(0), MuxId(1), MuxId(2)]);
        assert_eq!(mux_lib.mux_graph(other_model), &MuxGraph::one_level(8));
        assert_eq!(mux_lib.mux_circuit_model(other_model), one_level);
    }

    #[test]
    fn max_size() {
        let mut circuit_lib = CircuitLibrary::new();
        let tree = circuit_lib.add_model(CircuitModel::new("mux_tree", CircuitModelKind::Mux));

        let mut mux_lib = MuxLibrary::new();
        assert_eq!(mux_lib.max_mux_size(), 0);

        for size in [4, 12, 2] {
            mux_lib.add_mux_of_size(&circuit_lib, tree, size).unwrap();
        }
        assert_eq!(mux_lib.max_mux_size(), 12);
    }
}
