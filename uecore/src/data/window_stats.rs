use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::data::calo_window_map::{CaloWindowMap, MASK_ENERGY};

/// Summary of the unmasked windows of one shape, the per-event background density estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub dphi: usize,
    pub deta: usize,
    pub n_windows: usize,
    pub n_masked: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
}

impl WindowStats {
    /// Statistics over `windows`, skipping masked entries.
    ///
    /// Moments are NaN when fewer windows survive than they need.
    pub fn from_windows(dphi: usize, deta: usize, windows: &[f32]) -> Self {
        let unmasked: Vec<f64> = windows
            .iter()
            .filter(|&&w| w != MASK_ENERGY)
            .map(|&w| w as f64)
            .collect();
        let n_masked = windows.len() - unmasked.len();

        let mean = unmasked.iter().mean();
        let std_dev = unmasked.iter().std_dev();
        let median = if unmasked.is_empty() {
            f64::NAN
        } else {
            let mut data = Data::new(unmasked);
            data.median()
        };

        WindowStats { dphi, deta, n_windows: windows.len(), n_masked, mean, std_dev, median }
    }

    /// Computes the windows of `map` for `(dphi, deta)` and summarises them.
    pub fn from_map(map: &CaloWindowMap, dphi: usize, deta: usize) -> Self {
        WindowStats::from_windows(dphi, deta, &map.calo_windows(dphi, deta))
    }

    pub fn masked_fraction(&self) -> f64 {
        if self.n_windows == 0 {
            return 0.0;
        }
        self.n_masked as f64 / self.n_windows as f64
    }
}
