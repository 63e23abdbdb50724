//! Options for where and how netlists are written.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;

const DEFAULT_SUBMODULE_DIR: &str = "sub_module";
const DEFAULT_DEFINES_FILE: &str = "fpga_defines.v";

/// How the body of a branch module is written.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Pass-gate instances wired by hand.
    Structural,
    /// A case table over the configuration bits.
    Behavioral,
}

impl GenerationMode {
    /// The `forced` mode if any, otherwise the one a model asks for through its structural flag.
    #[must_use]
    pub const fn select(forced: Option<Self>, structural: bool) -> Self {
        match forced {
            Some(mode) => mode,
            None if structural => Self::Structural,
            None => Self::Behavioral,
        }
    }
}

/// Where and how the multiplexer netlist is written.
#[derive(Clone, Debug, Deserialize)]
pub struct NetlistOptions {
    /// Root of the generated Verilog tree.
    pub output_dir: PathBuf,
    /// Subdirectory of `output_dir` for primitive netlists.
    #[serde(default = "default_submodule_dir")]
    pub submodule_dir: PathBuf,
    /// Preprocessor defines included by every netlist, relative to `output_dir`.
    #[serde(default = "default_defines_file")]
    pub defines_file: String,
    /// Overrides the per-model choice between structural and behavioral bodies.
    #[serde(default)]
    pub mode: Option<GenerationMode>,
}

fn default_submodule_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SUBMODULE_DIR)
}

fn default_defines_file() -> String {
    DEFAULT_DEFINES_FILE.to_string()
}

impl NetlistOptions {
    /// Defaults for everything but the output directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            submodule_dir: default_submodule_dir(),
            defines_file: default_defines_file(),
            mode: None,
        }
    }

    /// # Errors
    ///
    /// Fails on malformed TOML or missing `output_dir`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Directory the multiplexer netlist lands in.
    #[must_use]
    pub fn submodule_path(&self) -> PathBuf {
        self.output_dir.join(&self.submodule_dir)
    }

    /// Path written into the `include` line.
    #[must_use]
    pub fn defines_path(&self) -> PathBuf {
        self.output_dir.join(&self.defines_file)
    }

}
