//! Verilog generation for the multiplexers of an FPGA fabric.
//!
//! Routing and logic blocks of a fabric contain thousands of multiplexers, but only a handful of distinct
//! shapes. This crate turns the catalogue of distinct multiplexers found during fabric elaboration into one
//! netlist of reusable branch modules.
//!
//! A multiplexer is a graph from data inputs to an output where every edge is a switch controlled by a
//! configuration bit or its complement. Large multiplexers are built in levels; each level is made of
//! branches, one-level `N:1` selection stages. Generation works as follows:
//! - Every multiplexer graph is decomposed into its branches, leaves before root.
//! - Every branch gets a name that depends only on the circuit model, the multiplexer size and the branch
//!   width. A name already known to the module manager is not generated again.
//! - New branches are written either structurally, as one pass-gate instance per edge, or behaviorally, as
//!   a case table over the configuration bits that leaves the output floating when nothing is selected.
//! - Once every multiplexer has been handled, the memory-bank address lines needed by the largest
//!   multiplexer are reserved.
//!
//! Output is byte-for-byte reproducible: nothing depends on hash order, time or the environment.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic, clippy::nursery)]

pub mod circuit_library;
pub mod codegen;
pub mod config;
pub mod error;
pub mod module_manager;
pub mod mux_graph;
pub mod mux_library;
pub mod naming;
pub mod sram_orgz;
pub mod verilog;

pub use codegen::{print_submodule_muxes, BranchOutcome, GenerationReport, MuxGenerator};
pub use config::{GenerationMode, NetlistOptions};
pub use error::{MuxGenError, Result};
