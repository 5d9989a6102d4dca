//! Run configuration for the window and random-cone reco modules.
//!
//! Configurations are plain serde structs, usually read from a JSON file
//! with [`RunConfig::from_path`].

use std::f32::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use serde::{Deserialize, Serialize};
use uecore::calo::source::{CaloSource, CalorimeterId, GridShape};

use crate::error::{RecoError, RecoResult};

pub const DEFAULT_TOWER_PREFIX: &str = "TOWERINFO_CALIB";
pub const DEFAULT_WINDOW_PREFIX: &str = "CaloWindowMap";

/// Environment variable consulted when a cone module has no explicit seed.
pub const SEED_ENV_VAR: &str = "UE_RANDOM_SEED";

fn default_tower_prefix() -> String {
    DEFAULT_TOWER_PREFIX.to_string()
}

fn default_window_prefix() -> String {
    DEFAULT_WINDOW_PREFIX.to_string()
}

fn default_cone_radius() -> f32 {
    0.4
}

/// One tower collection consumed by a reco module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoInput {
    pub source: CaloSource,
    #[serde(default = "default_tower_prefix")]
    pub prefix: String,
    /// Explicit tower node name, overrides `<prefix>_<source suffix>`.
    #[serde(default)]
    pub node: Option<String>,
    /// Explicit geometry, overrides the source table entry.
    #[serde(default)]
    pub geometry: Option<CalorimeterId>,
}

impl RecoInput {
    pub fn new(source: CaloSource) -> Self {
        RecoInput { source, prefix: default_tower_prefix(), node: None, geometry: None }
    }

    pub fn with_prefix(source: CaloSource, prefix: &str) -> Self {
        RecoInput { prefix: prefix.to_string(), ..RecoInput::new(source) }
    }

    /// Input with explicit tower node and geometry.
    pub fn named(node: &str, geometry: CalorimeterId, source: CaloSource) -> Self {
        RecoInput { node: Some(node.to_string()), geometry: Some(geometry), ..RecoInput::new(source) }
    }

    pub fn tower_node(&self) -> String {
        match &self.node {
            Some(node) => node.clone(),
            None => self.source.tower_node(&self.prefix),
        }
    }

    pub fn geometry(&self) -> CalorimeterId {
        self.geometry.unwrap_or_else(|| self.source.geometry())
    }

    /// Fine grid for the EMCal geometry, coarse grid otherwise.
    pub fn grid_shape(&self) -> GridShape {
        self.geometry().grid_shape()
    }
}

/// Settings of [`crate::reco::calo_window::CaloWindowTowerReco`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowRecoConfig {
    #[serde(default = "default_window_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub inputs: Vec<RecoInput>,
    /// `(dphi, deta)` shapes summarised per event by the driver.
    #[serde(default)]
    pub shapes: Vec<(usize, usize)>,
}

impl Default for WindowRecoConfig {
    fn default() -> Self {
        WindowRecoConfig { prefix: default_window_prefix(), inputs: Vec::new(), shapes: Vec::new() }
    }
}

impl WindowRecoConfig {
    pub fn add_input(mut self, input: RecoInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn add_shape(mut self, dphi: usize, deta: usize) -> Self {
        self.shapes.push((dphi, deta));
        self
    }

    /// Window map name of an input, `<prefix>_<source suffix>`.
    pub fn window_name(&self, input: &RecoInput) -> String {
        format!("{}_{}", self.prefix, input.source.suffix())
    }
}

/// Steering of cone axes away from the leading jet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadJetAvoidance {
    pub jet_node: String,
    /// Minimum cone-to-jet distance, `1 + R` when unset.
    #[serde(default)]
    pub min_dr: Option<f32>,
}

/// Settings of [`crate::reco::random_cone::RandomConeTowerReco`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomConeConfig {
    #[serde(rename = "R", default = "default_cone_radius")]
    pub r: f32,
    /// Largest |eta| of the cone axis, `1.1 - R` when unset or negative.
    #[serde(default)]
    pub max_abs_eta: Option<f32>,
    #[serde(default)]
    pub masked_threshold: f32,
    /// Zero or unset falls back to the environment, then the clock.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub avoid_lead_jet: Option<LeadJetAvoidance>,
    #[serde(default)]
    pub output_node: Option<String>,
    #[serde(default)]
    pub inputs: Vec<RecoInput>,
}

impl Default for RandomConeConfig {
    fn default() -> Self {
        RandomConeConfig {
            r: default_cone_radius(),
            max_abs_eta: None,
            masked_threshold: 0.0,
            seed: None,
            avoid_lead_jet: None,
            output_node: None,
            inputs: Vec::new(),
        }
    }
}

impl RandomConeConfig {
    pub fn new(r: f32) -> Self {
        RandomConeConfig { r, ..Default::default() }
    }

    pub fn add_input(mut self, input: RecoInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_abs_eta(mut self, max_abs_eta: f32) -> Self {
        self.max_abs_eta = Some(max_abs_eta);
        self
    }

    pub fn with_masked_threshold(mut self, threshold: f32) -> Self {
        self.masked_threshold = threshold;
        self
    }

    pub fn with_output_node(mut self, name: &str) -> Self {
        self.output_node = Some(name.to_string());
        self
    }

    pub fn avoid_lead_jet(mut self, jet_node: &str, min_dr: Option<f32>) -> Self {
        self.avoid_lead_jet = Some(LeadJetAvoidance { jet_node: jet_node.to_string(), min_dr });
        self
    }

    pub fn resolved_max_abs_eta(&self) -> f32 {
        match self.max_abs_eta {
            Some(eta) if eta >= 0.0 => eta,
            _ => 1.1 - self.r,
        }
    }

    /// Minimum distance to the leading jet, `None` outside avoidance mode.
    pub fn resolved_min_dr(&self) -> Option<f32> {
        self.avoid_lead_jet.as_ref().map(|avoid| match avoid.min_dr {
            Some(dr) if dr > 0.0 => dr,
            _ => 1.0 + self.r,
        })
    }

    /// Output name, `RandomCone_r<10 R>` plus `_avoidleadjet` in avoidance mode.
    pub fn output_node_name(&self) -> String {
        if let Some(name) = &self.output_node {
            if !name.is_empty() {
                return name.clone();
            }
        }
        let mut name = format!("RandomCone_r{}", (self.r * 10.0) as i32);
        if self.avoid_lead_jet.is_some() {
            name.push_str("_avoidleadjet");
        }
        name
    }

    pub fn validate(&self) -> RecoResult<()> {
        if self.inputs.is_empty() {
            return Err(RecoError::NoInputs(self.output_node_name()));
        }
        if !(self.r > 0.0) {
            return Err(RecoError::InvalidConfig(format!("cone radius must be positive, got {}", self.r)));
        }
        let max_abs_eta = self.resolved_max_abs_eta();
        if !(max_abs_eta > 0.0) {
            return Err(RecoError::InvalidConfig(format!("max abs eta must be positive, got {}", max_abs_eta)));
        }
        if !self.masked_threshold.is_finite() {
            return Err(RecoError::InvalidConfig("masked threshold must be finite".to_string()));
        }
        if self.masked_threshold < 0.0 {
            return Err(RecoError::InvalidConfig(format!(
                "masked threshold must not be negative, got {}",
                self.masked_threshold
            )));
        }
        if let Some(min_dr) = self.resolved_min_dr() {
            // the allowed azimuthal band is empty from pi on
            if !(min_dr < PI) {
                return Err(RecoError::InvalidConfig(format!("lead jet dR must be below pi, got {}", min_dr)));
            }
        }
        Ok(())
    }
}

/// Picks the generator seed: explicit, then [`SEED_ENV_VAR`], then the clock.
pub fn resolve_seed(explicit: Option<u64>) -> u64 {
    if let Some(seed) = explicit.filter(|&s| s != 0) {
        return seed;
    }

    if let Some(seed) = std::env::var(SEED_ENV_VAR).ok().and_then(|v| v.trim().parse::<u64>().ok()).filter(|&s| s != 0) {
        return seed;
    }

    info!("{} not set, using time for the random seed", SEED_ENV_VAR);
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
        .unwrap_or(1)
        .max(1)
}

/// Full run: an optional window module and any number of cone modules.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub windows: Option<WindowRecoConfig>,
    #[serde(default)]
    pub cones: Vec<RandomConeConfig>,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> RecoResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
