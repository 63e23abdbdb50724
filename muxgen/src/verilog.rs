//! Verilog text fragments shared by the module generators.

use std::io;
use std::path::Path;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::module_manager::{BasicPort, ModuleId, ModuleManager, ModulePortCategory};

/// Reference to a port or a slice of it: `name[i]` for one bit, `name[lsb:msb]` otherwise.
#[must_use]
pub fn port_reference(port: &BasicPort) -> String {
    if port.lsb() == port.msb() {
        format!("{}[{}]", port.name(), port.lsb())
    } else {
        format!("{}[{}:{}]", port.name(), port.lsb(), port.msb())
    }
}

/// Declaration of a port or register without the trailing separator, e.g. `input [0:3] in`.
#[must_use]
pub fn port_declaration(keyword: &str, port: &BasicPort) -> String {
    format!("{} [{}:{}] {}", keyword, port.lsb(), port.msb(), port.name())
}

/// Sized binary literal, e.g. `4'b1000`.
#[must_use]
pub fn binary_literal(bits: &str) -> String {
    format!("{}'b{}", bits.len(), bits)
}

/// A single-line comment.
#[allow(clippy::missing_errors_doc)]
pub fn print_comment<W: io::Write>(writer: &mut W, comment: &str) -> io::Result<()> {
    writeln!(writer, "//{}", comment)
}

/// Banner and timescale at the top of a netlist.
#[allow(clippy::missing_errors_doc)]
pub fn print_file_header<W: io::Write>(writer: &mut W, description: &str) -> io::Result<()> {
    writeln!(writer, "//-------------------------------------------")?;
    writeln!(writer, "//\tFPGA Synthesizable Verilog Netlist")?;
    writeln!(writer, "//\tDescription: {}", description)?;
    writeln!(writer, "//-------------------------------------------")?;
    writeln!(writer, "//----- Time scale -----")?;
    writeln!(writer, "`timescale 1ns / 1ps")?;
    writeln!(writer)
}

/// The `include` of the preprocessor defines.
#[allow(clippy::missing_errors_doc)]
pub fn print_include_defines<W: io::Write>(writer: &mut W, defines_path: &Path) -> io::Result<()> {
    writeln!(writer, "//------ Include defines: preproc flags -----")?;
    writeln!(writer, "`include \"{}\"", defines_path.display())?;
    writeln!(writer, "//------ End Include defines: preproc flags -----")?;
    writeln!(writer)
}

/// Module header with every port, global ports first, then inputs, then outputs.
#[allow(clippy::missing_errors_doc)]
pub fn print_module_declaration<W: io::Write>(
    writer: &mut W,
    module_manager: &ModuleManager,
    module_id: ModuleId,
) -> io::Result<()> {
    let module = module_manager.module(module_id);

    let declarations = [
        (ModulePortCategory::Global, "input"),
        (ModulePortCategory::Input, "input"),
        (ModulePortCategory::Output, "output"),
    ]
    .iter()
    .flat_map(|(category, keyword)| {
        module
            .ports_by_category(*category)
            .map(move |port| port_declaration(keyword, port))
    })
    .collect::<Vec<_>>();

    writeln!(writer, "//----- Verilog module for {} -----", module.name())?;
    writeln!(writer, "module {}(", module.name())?;
    writeln!(writer, "\t{});", declarations.iter().join(",\n\t"))
}

/// One instance of `child` inside `parent`.
///
/// Child ports missing from `port_map` are connected to the parent port of the same name, which is how
/// global ports travel down the hierarchy.
#[allow(clippy::missing_errors_doc)]
pub fn print_module_instance<W: io::Write>(
    writer: &mut W,
    module_manager: &ModuleManager,
    child: ModuleId,
    instance_name: &str,
    port_map: &IndexMap<String, BasicPort>,
    explicit_port_map: bool,
) -> io::Result<()> {
    let module = module_manager.module(child);

    let connections = module
        .ports()
        .map(|(port, _)| {
            let net = port_map.get(port.name()).map_or_else(|| port_reference(port), port_reference);
            if explicit_port_map {
                format!(".{}({})", port.name(), net)
            } else {
                net
            }
        })
        .collect::<Vec<_>>();

    writeln!(writer, "\t{} {} (", module.name(), instance_name)?;
    writeln!(writer, "\t\t{});", connections.iter().join(",\n\t\t"))
}

/// `endmodule` and its trailing banner.
#[allow(clippy::missing_errors_doc)]
pub fn print_module_end<W: io::Write>(writer: &mut W, module_name: &str) -> io::Result<()> {
    writeln!(writer, "endmodule")?;
    writeln!(writer, "//----- END Verilog module for {} -----", module_name)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{binary_literal, port_declaration, port_reference, print_module_declaration, print_module_instance};
    use crate::module_manager::{BasicPort, ModuleManager, ModulePortCategory};

    #[test]
    fn references() {
        let port = BasicPort::new("in", 4);
        assert_eq!(port_reference(&port), "in[0:3]");
        assert_eq!(port_reference(&port.pin(3)), "in[3]");
        assert_eq!(port_declaration("output", &BasicPort::new("out", 1)), "output [0:0] out");
        assert_eq!(binary_literal("0100"), "4'b0100");
    }

    #[test]
    fn declaration_groups_ports() {
        let mut manager = ModuleManager::new();
        let module = manager.add_module("branch");
        manager.add_port(module, BasicPort::new("in", 2), ModulePortCategory::Input);
        manager.add_port(module, BasicPort::new("out", 1), ModulePortCategory::Output);
        manager.add_port(module, BasicPort::new("mem", 1), ModulePortCategory::Input);
        manager.add_port(module, BasicPort::new("enable", 1), ModulePortCategory::Global);

        let mut text = Vec::new();
        print_module_declaration(&mut text, &manager, module).unwrap();

        assert_eq!(
            String::from_utf8(text).unwrap(),
            "//----- Verilog module for branch -----\n\
             module branch(\n\
             \tinput [0:0] enable,\n\
             \tinput [0:1] in,\n\
             \tinput [0:0] mem,\n\
             \toutput [0:0] out);\n"
        );
    }

    #[test]
    fn instance_port_maps() {
        let mut manager = ModuleManager::new();
        let tgate = manager.add_module("tgate");
        manager.add_port(tgate, BasicPort::new("enable", 1), ModulePortCategory::Global);
        manager.add_port(tgate, BasicPort::new("in", 1), ModulePortCategory::Input);
        manager.add_port(tgate, BasicPort::new("out", 1), ModulePortCategory::Output);

        let mut port_map = IndexMap::new();
        port_map.insert("in".to_string(), BasicPort::new("in", 4).pin(2));
        port_map.insert("out".to_string(), BasicPort::new("out", 1).pin(0));

        let mut explicit = Vec::new();
        print_module_instance(&mut explicit, &manager, tgate, "tgate_2_", &port_map, true).unwrap();
        assert_eq!(
            String::from_utf8(explicit).unwrap(),
            "\ttgate tgate_2_ (\n\t\t.enable(enable[0]),\n\t\t.in(in[2]),\n\t\t.out(out[0]));\n"
        );

        let mut positional = Vec::new();
        print_module_instance(&mut positional, &manager, tgate, "tgate_2_", &port_map, false).unwrap();
        assert_eq!(
            String::from_utf8(positional).unwrap(),
            "\ttgate tgate_2_ (\n\t\tenable[0],\n\t\tin[2],\n\t\tout[0]);\n"
        );
    }
}
