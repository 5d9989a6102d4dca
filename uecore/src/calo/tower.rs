use serde::{Deserialize, Deserializer, Serialize};

use crate::calo::source::CaloSource;

// NaN energies travel through JSON as null
fn nan_from_null<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
}

/// Calibrated readout of one calorimeter channel for one event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TowerInfo {
    pub ieta: u32,
    pub iphi: u32,
    #[serde(deserialize_with = "nan_from_null")]
    pub energy: f32,
    #[serde(default)]
    pub is_hot: bool,
    #[serde(default)]
    pub is_no_calib: bool,
    #[serde(default)]
    pub is_not_instr: bool,
    #[serde(default)]
    pub is_bad_chi2: bool,
}

impl TowerInfo {
    pub fn new(ieta: u32, iphi: u32, energy: f32) -> Self {
        TowerInfo { ieta, iphi, energy, ..Default::default() }
    }

    /// A tower is masked if any quality flag is raised or its energy is NaN.
    #[inline]
    pub fn is_masked(&self) -> bool {
        self.is_hot || self.is_no_calib || self.is_not_instr || self.is_bad_chi2 || self.energy.is_nan()
    }
}

/// All channels of one tower collection, indexed by channel number.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TowerInfoContainer {
    pub source: CaloSource,
    pub towers: Vec<TowerInfo>,
}

impl TowerInfoContainer {
    pub fn new(source: CaloSource, towers: Vec<TowerInfo>) -> Self {
        TowerInfoContainer { source, towers }
    }

    /// A container covering the full grid of `source`, channels ordered eta-major, all energies zero.
    pub fn empty_grid(source: CaloSource) -> Self {
        let shape = source.grid_shape();
        let towers = (0..shape.neta as u32)
            .flat_map(|ieta| (0..shape.nphi as u32).map(move |iphi| TowerInfo::new(ieta, iphi, 0.0)))
            .collect();
        TowerInfoContainer { source, towers }
    }

    pub fn size(&self) -> usize {
        self.towers.len()
    }

    pub fn tower_at_channel(&self, channel: usize) -> Option<&TowerInfo> {
        self.towers.get(channel)
    }

    pub fn tower_at_channel_mut(&mut self, channel: usize) -> Option<&mut TowerInfo> {
        self.towers.get_mut(channel)
    }

    /// Channel index of the tower at `(ieta, iphi)`, if present.
    pub fn channel_of(&self, ieta: u32, iphi: u32) -> Option<usize> {
        self.towers.iter().position(|t| t.ieta == ieta && t.iphi == iphi)
    }
}
