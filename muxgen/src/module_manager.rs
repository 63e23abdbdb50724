//! Registry of the hardware modules defined during one generation pass.
//!
//! Modules are identified by name alone: asking for a name twice yields the same module, which is what keeps a
//! branch shared by many multiplexers from being defined more than once.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::circuit_library::{CircuitLibrary, CircuitModelId, PortKind};
use crate::error::Result;

/// Index of a module in a [`ModuleManager`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ModuleId(pub usize);

/// A named bus `name[lsb:msb]`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct BasicPort {
    name: String,
    lsb: usize,
    msb: usize,
}

impl BasicPort {
    /// A bus of `width` bits starting at bit zero. A zero width still gets one bit.
    #[must_use]
    pub fn new(name: &str, width: usize) -> Self {
        Self {
            name: name.to_string(),
            lsb: 0,
            msb: width.saturating_sub(1),
        }
    }

    /// Port name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowest bit index.
    #[must_use]
    pub const fn lsb(&self) -> usize {
        self.lsb
    }

    /// Highest bit index.
    #[must_use]
    pub const fn msb(&self) -> usize {
        self.msb
    }

    /// Number of bits.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.msb - self.lsb + 1
    }

    /// The single-bit slice `name[index]`.
    #[must_use]
    pub fn pin(&self, index: usize) -> Self {
        Self {
            name: self.name.clone(),
            lsb: index,
            msb: index,
        }
    }
}

/// Where a port goes in a module declaration.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ModulePortCategory {
    /// Routed from the top level.
    Global,
    /// Local input.
    Input,
    /// Local output.
    Output,
}

/// A Verilog module: its ports and the modules it instantiates.
#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    ports: Vec<(BasicPort, ModulePortCategory)>,
    children: IndexSet<ModuleId>,
}

impl Module {
    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ports in the order they were added.
    pub fn ports(&self) -> impl Iterator<Item = &(BasicPort, ModulePortCategory)> {
        self.ports.iter()
    }

    /// Ports of one category in the order they were added.
    pub fn ports_by_category(&self, category: ModulePortCategory) -> impl Iterator<Item = &BasicPort> {
        self.ports
            .iter()
            .filter(move |(_, port_category)| *port_category == category)
            .map(|(port, _)| port)
    }

    /// Modules instantiated by this one, in order of first use.
    pub fn children(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.children.iter().copied()
    }
}

/// Registry of every module of the fabric, looked up by name.
#[derive(Debug, Default)]
pub struct ModuleManager {
    modules: Vec<Module>,
    name_index: HashMap<String, ModuleId>,
}

impl ModuleManager {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The module called `name`, created empty if it does not exist yet.
    pub fn add_module(&mut self, name: &str) -> ModuleId {
        if let Some(id) = self.find_module(name) {
            return id;
        }

        let id = ModuleId(self.modules.len());
        self.modules.push(Module {
            name: name.to_string(),
            ..Module::default()
        });
        self.name_index.insert(name.to_string(), id);
        id
    }

    /// Append a port. Port names are not checked for clashes.
    pub fn add_port(&mut self, module: ModuleId, port: BasicPort, category: ModulePortCategory) {
        self.modules[module.0].ports.push((port, category));
    }

    /// Record that `parent` instantiates `child`. Only the dependency is kept, not how often it occurs.
    pub fn add_child_module(&mut self, parent: ModuleId, child: ModuleId) {
        self.modules[parent.0].children.insert(child);
    }

    /// The module called `name`, if registered.
    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.name_index.get(name).copied()
    }

    /// The module with id `id`.
    #[must_use]
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    /// Name of the module with id `id`.
    #[must_use]
    pub fn module_name(&self, id: ModuleId) -> &str {
        &self.modules[id.0].name
    }

    /// Number of registered modules.
    #[must_use]
    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    /// Every module in registration order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }

    /// Register a circuit model as a module with its global, input and output ports.
    ///
    /// This is how primitives defined by other generators, such as pass gates, become instantiable.
    ///
    /// # Errors
    ///
    /// Fails if `model` is not in `circuit_lib`.
    pub fn add_circuit_model_module(&mut self, circuit_lib: &CircuitLibrary, model: CircuitModelId) -> Result<ModuleId> {
        let circuit_model = circuit_lib.model(model)?;
        let id = self.add_module(&circuit_model.name);

        for port in circuit_lib.model_global_ports_by_type(model, PortKind::Input)? {
            self.add_port(id, BasicPort::new(&port.name, port.size), ModulePortCategory::Global);
        }
        for port in circuit_lib.model_ports_by_type(model, PortKind::Input)? {
            self.add_port(id, BasicPort::new(&port.name, port.size), ModulePortCategory::Input);
        }
        for port in circuit_lib.model_ports_by_type(model, PortKind::Output)? {
            self.add_port(id, BasicPort::new(&port.name, port.size), ModulePortCategory::Output);
        }

        Ok(id)
    }
}
