//! Error types for multiplexer generation

use std::path::PathBuf;

use thiserror::Error;

/// Shorthand result type used throughout the crate.
pub type Result<T> = std::result::Result<T, MuxGenError>;

/// Everything that can abort a generation pass.
///
/// None of these are retried. They point at defects in the data handed over by fabric elaboration, so the fix
/// is upstream followed by a rerun.
#[derive(Debug, Error)]
pub enum MuxGenError {
    /// The pass-gate model of a multiplexer uses a design technology we do not know.
    #[error("invalid design technology '{technology}' of multiplexer (name: {model})")]
    UnsupportedTechnology {
        /// Multiplexer model name.
        model: String,
        /// Technology as written in the architecture.
        technology: String,
    },

    /// A branch graph handed to emission is not a single-output, single-level graph.
    #[error(
        "branch graph for module {module} must have 1 output and 1 level, found {outputs} output(s) and {levels} level(s)"
    )]
    InvalidBranch {
        /// Module the branch was meant for.
        module: String,
        /// Outputs found.
        outputs: usize,
        /// Levels found.
        levels: usize,
    },

    /// More than one distinct default value among the non-mode-select configuration ports.
    #[error("multiplexer model {model} has conflicting configuration default values: {values:?}")]
    ConflictingDefaults {
        /// Multiplexer model name.
        model: String,
        /// Distinct defaults, in port order.
        values: Vec<u8>,
    },

    /// A configuration default that is not a single bit.
    #[error("multiplexer model {model} has configuration default value {value}, expected 0 or 1")]
    InvalidDefault {
        /// Multiplexer model name.
        model: String,
        /// The offending default.
        value: u8,
    },

    /// No non-mode-select configuration port to take a default value from.
    #[error("multiplexer model {model} has no configuration port to take a default value from")]
    MissingDefault {
        /// Multiplexer model name.
        model: String,
    },

    /// A multiplexer model without a pass-gate sub-model.
    #[error("multiplexer model {0} does not name a pass-gate model")]
    MissingPassGate(String),

    /// The pass-gate model does not expose three data/control inputs and one output.
    #[error("pass-gate model {model} must have 3 inputs and 1 output, found {inputs} input(s) and {outputs} output(s)")]
    PassGatePorts {
        /// Pass-gate model name.
        model: String,
        /// Non-global inputs found.
        inputs: usize,
        /// Outputs found.
        outputs: usize,
    },

    /// A primitive module expected to be registered by another generator is absent.
    #[error("module {0} has not been registered")]
    MissingModule(String),

    /// A circuit model id that does not belong to the library.
    #[error("unknown circuit model id {0}")]
    UnknownCircuitModel(usize),

    /// A second edge between the same input and output of a multiplexer graph.
    #[error("multiplexer graph already has an edge from node {from} to node {to}")]
    DuplicateEdge {
        /// Source node index.
        from: usize,
        /// Target node index.
        to: usize,
    },

    /// An edge referring to a configuration bit the graph does not own.
    #[error("multiplexer graph has {available} memory bit(s), edge refers to bit {mem}")]
    UnknownMemory {
        /// Bit the edge refers to.
        mem: usize,
        /// Bits allocated in the graph.
        available: usize,
    },

    /// Input or output nodes whose ids do not match the declared count.
    #[error("multiplexer graph declares {declared} {kind}(s) but its {kind} nodes are not numbered 0..{declared}")]
    NodeNumbering {
        /// `"input"` or `"output"`.
        kind: &'static str,
        /// Count stored in the graph.
        declared: usize,
    },

    /// Writing the netlist failed.
    #[error("failed to write netlist: {0}")]
    Write(#[from] std::io::Error),

    /// A file system operation on a specific path failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path the operation was on.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The options file could not be parsed.
    #[error("invalid netlist options: {0}")]
    Config(#[from] toml::de::Error),
}

impl MuxGenError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
