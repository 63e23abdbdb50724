//! Technology and electrical metadata of the circuit models a fabric is built from.
//!
//! The library is filled by architecture parsing and only read here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MuxGenError, Result};

/// Index of a model in a [`CircuitLibrary`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CircuitModelId(pub usize);

/// How the switches of a circuit are physically realised.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DesignTechnology {
    /// Transmission gates or pass transistors.
    #[default]
    Cmos,
    /// Resistive memory cells.
    Rram,
    /// Anything else an architecture description may contain.
    Unrecognized(String),
}

impl From<String> for DesignTechnology {
    fn from(technology: String) -> Self {
        match technology.to_ascii_lowercase().as_str() {
            "cmos" => Self::Cmos,
            "rram" => Self::Rram,
            _ => Self::Unrecognized(technology),
        }
    }
}

impl From<DesignTechnology> for String {
    fn from(technology: DesignTechnology) -> Self {
        technology.to_string()
    }
}

impl fmt::Display for DesignTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmos => write!(f, "cmos"),
            Self::Rram => write!(f, "rram"),
            Self::Unrecognized(technology) => write!(f, "{}", technology),
        }
    }
}

/// Function of a logic-gate model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Logical and.
    And,
    /// Logical or.
    Or,
    /// A 2:1 multiplexer gate.
    Mux2,
}

/// What a circuit model is used as.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitModelKind {
    /// A routing or logic multiplexer.
    Mux,
    /// A transmission gate or pass transistor, the switch multiplexers are built from.
    PassGate,
    /// A standard logic gate.
    Gate(GateKind),
    /// A configuration memory cell.
    Sram,
}

/// How a multiplexer model arranges its selection stages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxStructure {
    /// One `N`:1 stage with a bit per input.
    OneLevel,
    /// 2:1 stages, one shared bit per level.
    #[default]
    Tree,
    /// At most `levels` stages of equal width.
    MultiLevel {
        /// Upper bound on the number of stages.
        levels: usize,
    },
}

/// Role of a circuit port.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Data or control input.
    Input,
    /// Data output.
    Output,
    /// Configuration bits.
    Sram,
    /// Clock input.
    Clock,
}

/// A port of a circuit model.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CircuitPort {
    /// Name used when the model is instantiated.
    pub name: String,
    /// Role of the port.
    pub kind: PortKind,
    /// Width in bits.
    #[serde(default = "default_port_size")]
    pub size: usize,
    /// Routed to the top level rather than through each instance.
    #[serde(default)]
    pub is_global: bool,
    /// Configuration bits that pick an operating mode rather than a data path.
    #[serde(default)]
    pub is_mode_select: bool,
    /// Power-on value of a configuration port.
    #[serde(default)]
    pub default_value: u8,
}

const fn default_port_size() -> usize {
    1
}

impl CircuitPort {
    /// A local port of `size` bits, defaulting to 0.
    #[must_use]
    pub fn new(name: &str, kind: PortKind, size: usize) -> Self {
        Self {
            name: name.to_string(),
            kind,
            size,
            is_global: false,
            is_mode_select: false,
            default_value: 0,
        }
    }

    /// Mark the port global.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    /// Mark the port as a mode selector.
    #[must_use]
    pub fn mode_select(mut self) -> Self {
        self.is_mode_select = true;
        self
    }

    /// Set the power-on value.
    #[must_use]
    pub fn with_default(mut self, default_value: u8) -> Self {
        self.default_value = default_value;
        self
    }
}

/// A primitive of the architecture: multiplexer, pass gate, gate or memory cell.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CircuitModel {
    /// Name, also used as the Verilog module name.
    pub name: String,
    /// What the model is used as.
    pub kind: CircuitModelKind,
    /// How its switches are realised.
    #[serde(default)]
    pub design_tech: DesignTechnology,
    /// Stage layout, for multiplexers.
    #[serde(default)]
    pub structure: MuxStructure,
    /// Write branch bodies as pass-gate instances instead of a case table.
    #[serde(default)]
    pub dump_structural_verilog: bool,
    /// Connect instances of this model by port name.
    #[serde(default = "default_explicit_port_map")]
    pub dump_explicit_port_map: bool,
    /// Switch primitive a multiplexer is built from.
    #[serde(default)]
    pub pass_gate_model: Option<CircuitModelId>,
    /// Ports in declaration order.
    #[serde(default)]
    pub ports: Vec<CircuitPort>,
}

const fn default_explicit_port_map() -> bool {
    true
}

impl CircuitModel {
    /// A CMOS model without ports.
    #[must_use]
    pub fn new(name: &str, kind: CircuitModelKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            design_tech: DesignTechnology::Cmos,
            structure: MuxStructure::Tree,
            dump_structural_verilog: false,
            dump_explicit_port_map: true,
            pass_gate_model: None,
            ports: Vec::new(),
        }
    }

    /// Append a port.
    #[must_use]
    pub fn with_port(mut self, port: CircuitPort) -> Self {
        self.ports.push(port);
        self
    }
}

/// Every circuit model of an architecture.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CircuitLibrary {
    models: Vec<CircuitModel>,
}

impl CircuitLibrary {
    /// An empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model and return its id.
    pub fn add_model(&mut self, model: CircuitModel) -> CircuitModelId {
        self.models.push(model);
        CircuitModelId(self.models.len() - 1)
    }

    /// # Errors
    ///
    /// Fails if `id` does not belong to this library.
    pub fn model(&self, id: CircuitModelId) -> Result<&CircuitModel> {
        self.models.get(id.0).ok_or(MuxGenError::UnknownCircuitModel(id.0))
    }

    /// Look a model up by name.
    #[must_use]
    pub fn find_model(&self, name: &str) -> Option<CircuitModelId> {
        self.models.iter().position(|model| model.name == name).map(CircuitModelId)
    }

    /// # Errors
    ///
    /// Fails if `id` is unknown or the model has no pass-gate sub-model.
    pub fn pass_gate_logic_model(&self, id: CircuitModelId) -> Result<CircuitModelId> {
        let model = self.model(id)?;
        model.pass_gate_model.ok_or_else(|| MuxGenError::MissingPassGate(model.name.clone()))
    }

    /// True for a logic-gate 2:1 multiplexer; those are generated along with the other gates.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown.
    pub fn is_gate_mux2(&self, id: CircuitModelId) -> Result<bool> {
        Ok(self.model(id)?.kind == CircuitModelKind::Gate(GateKind::Mux2))
    }

    /// Non-global ports of one kind, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown.
    pub fn model_ports_by_type(&self, id: CircuitModelId, kind: PortKind) -> Result<Vec<&CircuitPort>> {
        Ok(self.model(id)?.ports.iter().filter(|port| port.kind == kind && !port.is_global).collect())
    }

    /// Global ports of one kind, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown.
    pub fn model_global_ports_by_type(&self, id: CircuitModelId, kind: PortKind) -> Result<Vec<&CircuitPort>> {
        Ok(self.model(id)?.ports.iter().filter(|port| port.kind == kind && port.is_global).collect())
    }

    /// Configuration ports that drive the data path.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown.
    pub fn non_mode_select_sram_ports(&self, id: CircuitModelId) -> Result<Vec<&CircuitPort>> {
        Ok(self
            .model_ports_by_type(id, PortKind::Sram)?
            .into_iter()
            .filter(|port| !port.is_mode_select)
            .collect())
    }
}
