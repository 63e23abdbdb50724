//! Deterministic names for generated modules and files.

use crate::circuit_library::{CircuitLibrary, CircuitModelId};
use crate::error::Result;

/// Base name of the multiplexer netlist.
pub const MUXES_NETLIST_FILE_NAME: &str = "muxes.v";

/// Suffix of the netlist while it is being written.
pub const STAGING_SUFFIX: &str = ".bak";

/// Postfix of the modules that model one branch of a multiplexer.
pub const MUX_BASIS_POSTFIX: &str = "_basis";

/// Name of the module for a `branch_size`:1 branch of a `mux_size`:1 multiplexer of `circuit_model`.
///
/// A multiplexer whose pass gate is a logic-gate 2:1 multiplexer is named after that gate, since the gate is
/// the whole branch.
///
/// # Errors
///
/// Fails if the model or its pass-gate model are not in `circuit_lib`.
pub fn mux_branch_module_name(
    circuit_lib: &CircuitLibrary,
    circuit_model: CircuitModelId,
    mux_size: usize,
    branch_size: usize,
) -> Result<String> {
    let pass_gate = circuit_lib.pass_gate_logic_model(circuit_model)?;
    if circuit_lib.is_gate_mux2(pass_gate)? {
        return Ok(circuit_lib.model(pass_gate)?.name.clone());
    }

    Ok(format!(
        "{}_size{}{}_size{}",
        circuit_lib.model(circuit_model)?.name,
        mux_size,
        MUX_BASIS_POSTFIX,
        branch_size
    ))
}
