//! Verilog modules for the branches of every multiplexer in a fabric.
//!
//! Each distinct branch becomes one module, written either structurally (one pass-gate instance per edge) or
//! behaviorally (a case table over the configuration bits). Branches are looked up by name before they are
//! generated, so a branch shared by many multiplexers is defined once.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use crate::circuit_library::{CircuitLibrary, CircuitModelId, DesignTechnology, PortKind};
use crate::config::{GenerationMode, NetlistOptions};
use crate::error::{MuxGenError, Result};
use crate::module_manager::{BasicPort, ModuleId, ModuleManager, ModulePortCategory};
use crate::mux_graph::MuxGraph;
use crate::mux_library::MuxLibrary;
use crate::naming::{mux_branch_module_name, MUXES_NETLIST_FILE_NAME, STAGING_SUFFIX};
use crate::sram_orgz::{try_update_reserved_blwl, SramOrgzInfo};
use crate::verilog::{
    binary_literal, port_declaration, port_reference, print_comment, print_file_header, print_include_defines,
    print_module_declaration, print_module_end, print_module_instance,
};

/// What happened to one branch handed to [`MuxGenerator::generate_mux_branch_module`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BranchOutcome {
    /// A module was written and registered.
    Emitted(ModuleId),
    /// The pass gate is a logic-gate 2:1 multiplexer; the gate generator owns it.
    SkippedGateMux,
    /// RRAM multiplexers are not generated yet. Nothing was written.
    Unsupported,
}

/// Ports shared by every branch module.
struct BranchPorts {
    input: BasicPort,
    output: BasicPort,
    mem: BasicPort,
    mem_inv: BasicPort,
}

/// How a pass-gate instance is connected.
struct PassGateWiring {
    module: ModuleId,
    name: String,
    input: String,
    sel: String,
    selb: String,
    output: String,
    explicit_port_map: bool,
}

enum BranchBody {
    Structural(PassGateWiring),
    Behavioral(char),
}

/// Writes branch modules to `writer` and registers them with a module manager.
pub struct MuxGenerator<'a, W: Write> {
    module_manager: &'a mut ModuleManager,
    circuit_lib: &'a CircuitLibrary,
    writer: W,
    mode: Option<GenerationMode>,
}

impl<'a, W: Write> MuxGenerator<'a, W> {
    /// A generator that follows each model's own structural flag.
    pub fn new(module_manager: &'a mut ModuleManager, circuit_lib: &'a CircuitLibrary, writer: W) -> Self {
        Self {
            module_manager,
            circuit_lib,
            writer,
            mode: None,
        }
    }

    /// Force one mode for every model instead of following each model's own flag.
    #[must_use]
    pub fn with_mode(mut self, mode: Option<GenerationMode>) -> Self {
        self.mode = mode;
        self
    }

    /// The registry modules are added to.
    #[must_use]
    pub fn module_manager(&self) -> &ModuleManager {
        &*self.module_manager
    }

    /// Give the writer back.
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Generate one branch of a multiplexer built from `circuit_model`, picking the path by design technology.
    ///
    /// # Errors
    ///
    /// Fails on an unrecognized design technology, and on anything [`Self::generate_branch_module`] rejects.
    pub fn generate_mux_branch_module(
        &mut self,
        circuit_model: CircuitModelId,
        module_name: &str,
        branch: &MuxGraph,
    ) -> Result<BranchOutcome> {
        let circuit_lib = self.circuit_lib;
        let pass_gate = circuit_lib.pass_gate_logic_model(circuit_model)?;
        if circuit_lib.is_gate_mux2(pass_gate)? {
            log::debug!("Skipping {}: built from a logic-gate 2:1 multiplexer", module_name);
            return Ok(BranchOutcome::SkippedGateMux);
        }

        let model = circuit_lib.model(circuit_model)?;
        match &model.design_tech {
            DesignTechnology::Cmos => {
                let mode = GenerationMode::select(self.mode, model.dump_structural_verilog);
                self.generate_branch_module(circuit_model, module_name, branch, mode)
                    .map(BranchOutcome::Emitted)
            }
            // TODO: write RRAM branch bodies once the 4T1R cell wiring is settled.
            DesignTechnology::Rram => Ok(BranchOutcome::Unsupported),
            DesignTechnology::Unrecognized(technology) => Err(MuxGenError::UnsupportedTechnology {
                model: model.name.clone(),
                technology: technology.clone(),
            }),
        }
    }

    /// Write a CMOS branch module called `module_name` and register it.
    ///
    /// Everything is checked before the first byte is written, so a rejected branch leaves neither text nor a
    /// registered module behind.
    ///
    /// # Errors
    ///
    /// Fails if the branch is not a single-output, single-level graph, if the pass gate cannot be wired, if
    /// the model has no single configuration default (behavioral mode), or if writing fails.
    pub fn generate_branch_module(
        &mut self,
        circuit_model: CircuitModelId,
        module_name: &str,
        branch: &MuxGraph,
        mode: GenerationMode,
    ) -> Result<ModuleId> {
        check_branch_shape(module_name, branch)?;

        let circuit_lib = self.circuit_lib;
        let pass_gate = circuit_lib.pass_gate_logic_model(circuit_model)?;
        let body = match mode {
            GenerationMode::Structural => BranchBody::Structural(self.pass_gate_wiring(pass_gate)?),
            GenerationMode::Behavioral => BranchBody::Behavioral(self.mem_default_value(circuit_model)?),
        };
        let global_ports = circuit_lib.model_global_ports_by_type(pass_gate, PortKind::Input)?;

        let ports = BranchPorts {
            input: BasicPort::new("in", branch.num_inputs()),
            output: BasicPort::new("out", branch.num_outputs()),
            mem: BasicPort::new("mem", branch.num_memory_bits()),
            mem_inv: BasicPort::new("mem_inv", branch.num_memory_bits()),
        };

        let module_id = self.module_manager.add_module(module_name);
        for port in global_ports {
            self.module_manager
                .add_port(module_id, BasicPort::new(&port.name, port.size), ModulePortCategory::Global);
        }
        self.module_manager.add_port(module_id, ports.input.clone(), ModulePortCategory::Input);
        self.module_manager.add_port(module_id, ports.output.clone(), ModulePortCategory::Output);
        self.module_manager.add_port(module_id, ports.mem.clone(), ModulePortCategory::Input);
        self.module_manager.add_port(module_id, ports.mem_inv.clone(), ModulePortCategory::Input);

        print_module_declaration(&mut self.writer, &*self.module_manager, module_id)?;

        match body {
            BranchBody::Structural(wiring) => self.print_structural_body(module_id, &wiring, &ports, branch)?,
            BranchBody::Behavioral(default_value) => self.print_behavioral_body(&ports, branch, default_value)?,
        }

        print_module_end(&mut self.writer, module_name)?;

        log::debug!("Generated module {}", module_name);

        Ok(module_id)
    }

    fn pass_gate_wiring(&self, pass_gate: CircuitModelId) -> Result<PassGateWiring> {
        let model = self.circuit_lib.model(pass_gate)?;
        let inputs = self.circuit_lib.model_ports_by_type(pass_gate, PortKind::Input)?;
        let outputs = self.circuit_lib.model_ports_by_type(pass_gate, PortKind::Output)?;

        let (input, sel, selb, output) = match (inputs.as_slice(), outputs.as_slice()) {
            ([input, sel, selb], [output]) => (input, sel, selb, output),
            _ => {
                return Err(MuxGenError::PassGatePorts {
                    model: model.name.clone(),
                    inputs: inputs.len(),
                    outputs: outputs.len(),
                })
            }
        };

        let module = self
            .module_manager
            .find_module(&model.name)
            .ok_or_else(|| MuxGenError::MissingModule(model.name.clone()))?;

        Ok(PassGateWiring {
            module,
            name: model.name.clone(),
            input: input.name.clone(),
            sel: sel.name.clone(),
            selb: selb.name.clone(),
            output: output.name.clone(),
            explicit_port_map: model.dump_explicit_port_map,
        })
    }

    /// The single value every non-mode-select configuration port powers up with.
    fn mem_default_value(&self, circuit_model: CircuitModelId) -> Result<char> {
        let model = self.circuit_lib.model(circuit_model)?;
        let values = self
            .circuit_lib
            .non_mode_select_sram_ports(circuit_model)?
            .iter()
            .map(|port| port.default_value)
            .unique()
            .collect::<Vec<_>>();

        match values.as_slice() {
            [] => Err(MuxGenError::MissingDefault { model: model.name.clone() }),
            [0] => Ok('0'),
            [1] => Ok('1'),
            [value] => Err(MuxGenError::InvalidDefault {
                model: model.name.clone(),
                value: *value,
            }),
            _ => Err(MuxGenError::ConflictingDefaults {
                model: model.name.clone(),
                values,
            }),
        }
    }

    fn print_structural_body(
        &mut self,
        module_id: ModuleId,
        wiring: &PassGateWiring,
        ports: &BranchPorts,
        branch: &MuxGraph,
    ) -> Result<()> {
        print_comment(&mut self.writer, "---- Structure-level description -----")?;

        let mut instance = 0;
        for (input_id, input) in branch.inputs_by_id() {
            for (output_id, output) in branch.outputs_by_id() {
                if let Some(edge) = branch.find_edges(input, output) {
                    let mem = branch.edge_mem(edge).index();
                    let (sel, selb) = if branch.edge_uses_inverted_mem(edge) {
                        (ports.mem_inv.pin(mem), ports.mem.pin(mem))
                    } else {
                        (ports.mem.pin(mem), ports.mem_inv.pin(mem))
                    };

                    let mut port_map = IndexMap::new();
                    port_map.insert(wiring.input.clone(), ports.input.pin(input_id));
                    port_map.insert(wiring.sel.clone(), sel);
                    port_map.insert(wiring.selb.clone(), selb);
                    port_map.insert(wiring.output.clone(), ports.output.pin(output_id));

                    print_module_instance(
                        &mut self.writer,
                        &*self.module_manager,
                        wiring.module,
                        &format!("{}_{}_", wiring.name, instance),
                        &port_map,
                        wiring.explicit_port_map,
                    )?;
                    self.module_manager.add_child_module(module_id, wiring.module);
                    instance += 1;
                }
            }
        }

        Ok(())
    }

    fn print_behavioral_body(&mut self, ports: &BranchPorts, branch: &MuxGraph, default_value: char) -> Result<()> {
        print_comment(&mut self.writer, "---- Behavioral-level description -----")?;

        let out_reg = BasicPort::new("out_reg", branch.num_outputs());
        writeln!(self.writer, "\t{};", port_declaration("reg", &out_reg))?;
        writeln!(
            self.writer,
            "\talways @({}, {})",
            port_reference(&ports.input),
            port_reference(&ports.mem)
        )?;
        writeln!(self.writer, "\tcase ({})", port_reference(&ports.mem))?;

        for (input_id, input) in branch.inputs_by_id() {
            for (_, output) in branch.outputs_by_id() {
                if let Some(edge) = branch.find_edges(input, output) {
                    // Only the bit steering this edge leaves its default.
                    let mut case_code = vec![default_value; branch.num_memory_bits()];
                    case_code[branch.edge_mem(edge).index()] =
                        if branch.edge_uses_inverted_mem(edge) { '0' } else { '1' };

                    writeln!(
                        self.writer,
                        "\t\t{}: {} <= {};",
                        binary_literal(&case_code.iter().collect::<String>()),
                        port_reference(&out_reg),
                        port_reference(&ports.input.pin(input_id))
                    )?;
                }
            }
        }

        writeln!(
            self.writer,
            "\t\tdefault: {} <= {};",
            port_reference(&out_reg),
            binary_literal(&"z".repeat(branch.num_outputs()))
        )?;
        writeln!(self.writer, "\tendcase")?;
        writeln!(
            self.writer,
            "\tassign {} = {};",
            port_reference(&ports.output),
            port_reference(&out_reg)
        )?;

        Ok(())
    }
}

fn check_branch_shape(module_name: &str, branch: &MuxGraph) -> Result<()> {
    branch.validate()?;

    let outputs = branch.num_outputs();
    let levels = branch.num_levels();
    if outputs == 1 && levels == 1 {
        Ok(())
    } else {
        Err(MuxGenError::InvalidBranch {
            module: module_name.to_string(),
            outputs,
            levels,
        })
    }
}

/// Summary of one generation pass.
#[derive(Clone, Debug, Default)]
pub struct GenerationReport {
    /// The promoted netlist.
    pub netlist_path: PathBuf,
    /// Modules written, in file order.
    pub emitted_modules: Vec<String>,
    /// Branches whose module already existed.
    pub reused_branches: usize,
    /// Branches of multiplexers built from a logic-gate 2:1 multiplexer.
    pub skipped_gate_muxes: usize,
    /// Models whose design technology cannot be generated yet.
    pub unsupported_models: IndexSet<String>,
}

/// Write the branch modules of every multiplexer in `mux_lib` to `<submodule dir>/muxes.v`.
///
/// The netlist is written under a staging name and only renamed once every multiplexer went through. After
/// that the memory-bank address lines needed by the largest multiplexer are reserved in `sram_orgz`.
///
/// # Errors
///
/// Any failure aborts the pass. A partially written staging file may remain.
pub fn print_submodule_muxes(
    module_manager: &mut ModuleManager,
    mux_lib: &MuxLibrary,
    circuit_lib: &CircuitLibrary,
    sram_orgz: &mut SramOrgzInfo,
    options: &NetlistOptions,
) -> Result<GenerationReport> {
    let submodule_dir = options.submodule_path();
    fs::create_dir_all(&submodule_dir).map_err(MuxGenError::io(&submodule_dir))?;

    let netlist_path = submodule_dir.join(MUXES_NETLIST_FILE_NAME);
    let staging_path = submodule_dir.join(format!("{}{}", MUXES_NETLIST_FILE_NAME, STAGING_SUFFIX));

    log::info!("Creating Verilog netlist for multiplexers ({}) ...", staging_path.display());

    let file = File::create(&staging_path).map_err(MuxGenError::io(&staging_path))?;
    let mut writer = BufWriter::new(file);

    print_file_header(&mut writer, "Multiplexers")?;
    print_include_defines(&mut writer, &options.defines_path())?;

    let mut report = GenerationReport {
        netlist_path: netlist_path.clone(),
        ..GenerationReport::default()
    };

    let mut generator = MuxGenerator::new(module_manager, circuit_lib, &mut writer).with_mode(options.mode);
    for mux in mux_lib.muxes() {
        let graph = mux_lib.mux_graph(mux);
        let circuit_model = mux_lib.mux_circuit_model(mux);

        let gate_mux = circuit_lib.is_gate_mux2(circuit_lib.pass_gate_logic_model(circuit_model)?)?;

        for branch in graph.decompose() {
            // The gate generator owns these, registered or not.
            if gate_mux {
                report.skipped_gate_muxes += 1;
                continue;
            }

            let module_name = mux_branch_module_name(circuit_lib, circuit_model, graph.num_inputs(), branch.num_inputs())?;
            if generator.module_manager().find_module(&module_name).is_some() {
                log::debug!("Reusing module {}", module_name);
                report.reused_branches += 1;
                continue;
            }

            match generator.generate_mux_branch_module(circuit_model, &module_name, &branch)? {
                BranchOutcome::Emitted(_) => report.emitted_modules.push(module_name),
                BranchOutcome::SkippedGateMux => report.skipped_gate_muxes += 1,
                BranchOutcome::Unsupported => {
                    let model_name = &circuit_lib.model(circuit_model)?.name;
                    if report.unsupported_models.insert(model_name.clone()) {
                        log::warn!(
                            "Multiplexer model {} uses RRAM technology, which is not generated yet; its branches are missing from {}",
                            model_name,
                            netlist_path.display()
                        );
                    }
                }
            }
        }
    }
    drop(generator);

    writer.flush().map_err(MuxGenError::io(&staging_path))?;
    drop(writer);
    fs::rename(&staging_path, &netlist_path).map_err(MuxGenError::io(&netlist_path))?;

    let max_mux_size = mux_lib.max_mux_size();
    *sram_orgz = try_update_reserved_blwl(*sram_orgz, max_mux_size, max_mux_size);

    log::info!(
        "Wrote {} multiplexer branch module(s) to {} ({} reused)",
        report.emitted_modules.len(),
        netlist_path.display(),
        report.reused_branches
    );

    Ok(report)
}
