use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::design::DesignSpec;
use crate::sweep::{Polarity, SweepAxis, SweepPoints, TransistorSweep};

/// TOML-backed description of the sweeps to characterize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationConfig {
    /// Width at which every grid point is simulated (m).
    pub ref_width: f64,
    /// Worker pool size for oracle dispatch.
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub models: HashMap<String, ModelSweepConfig>,
}

fn default_workers() -> usize {
    1
}

/// Sweep description for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSweepConfig {
    pub polarity: Polarity,
    pub length: SweepPoints,
    pub vgs: SweepPoints,
    pub vds: SweepPoints,
    pub vbs: SweepPoints,
    /// Fixed device parameters forwarded to the oracle unchanged.
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

impl ModelSweepConfig {
    pub fn sweep(&self) -> crate::error::Result<TransistorSweep> {
        TransistorSweep::new(
            self.polarity,
            SweepAxis::new(&self.length)?,
            SweepAxis::new(&self.vbs)?,
            SweepAxis::new(&self.vgs)?,
            SweepAxis::new(&self.vds)?,
        )
    }
}

pub fn parse_characterization_config(path: impl AsRef<Path>) -> Result<CharacterizationConfig> {
    let contents = fs::read_to_string(path)?;
    let data = toml::from_str(&contents)?;
    Ok(data)
}

/// TOML-backed design request: the model to size plus its target spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    pub model: String,
    /// Model library referenced by the emitted verification netlist.
    #[serde(default)]
    pub model_lib: Option<String>,
    /// Library section (corner) referenced by the emitted netlist.
    #[serde(default)]
    pub lib_section: Option<String>,
    #[serde(flatten)]
    pub spec: DesignSpec,
}

pub fn parse_design_config(path: impl AsRef<Path>) -> Result<DesignConfig> {
    let contents = fs::read_to_string(path)?;
    let data = toml::from_str(&contents)?;
    Ok(data)
}
