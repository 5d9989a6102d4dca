//! Angular grid of tower transverse momenta and its sliding-window sums.
//!
//! The grid is periodic in phi and bounded in eta. Cells are stored
//! phi-fastest, `index = iphi + ieta * nphi`.

use std::fmt;
use std::fmt::{Display, Formatter};

use itertools::iproduct;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::calo::source::{CaloSource, GridShape};

/// Cell value marking a masked tower; a window touching one takes this value too.
pub const MASK_ENERGY: f32 = -99999.0;

/// Packs grid coordinates into a window-member key, `iphi | (ieta << 16)`.
///
/// This packing is part of the output contract of [`CaloWindowMap::window_comps_energy_key`].
#[inline]
pub fn encode_window_key(iphi: u32, ieta: u32) -> u32 {
    iphi | (ieta << 16)
}

/// Inverse of [`encode_window_key`], returns `(iphi, ieta)`.
#[inline]
pub fn decode_window_key(key: u32) -> (u32, u32) {
    (key & 0xFFFF, key >> 16)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CaloWindowMap {
    src: Option<CaloSource>,
    nphi: usize,
    neta: usize,
    towers: Vec<f32>,
}

impl CaloWindowMap {
    pub fn new() -> Self {
        CaloWindowMap::default()
    }

    /// A map already sized for the grid of `source`.
    pub fn with_source(source: CaloSource) -> Self {
        let mut map = CaloWindowMap::new();
        map.set_src(source);
        map.set_shape(source.grid_shape());
        map
    }

    pub fn set_src(&mut self, src: CaloSource) {
        self.src = Some(src);
    }

    pub fn src(&self) -> Option<CaloSource> {
        self.src
    }

    /// Resizes the grid and clears every cell.
    pub fn set_nphi_neta(&mut self, nphi: usize, neta: usize) {
        self.nphi = nphi;
        self.neta = neta;
        self.clear_towers();
    }

    pub fn set_shape(&mut self, shape: GridShape) {
        self.set_nphi_neta(shape.nphi, shape.neta);
    }

    pub fn nphi(&self) -> usize {
        self.nphi
    }

    pub fn neta(&self) -> usize {
        self.neta
    }

    pub fn ntowers(&self) -> usize {
        self.nphi * self.neta
    }

    /// Sets every cell to zero, keeping the dimensions.
    pub fn clear_towers(&mut self) {
        self.towers.clear();
        self.towers.resize(self.nphi * self.neta, 0.0);
    }

    /// Per-event reset, same as [`CaloWindowMap::clear_towers`].
    pub fn reset(&mut self) {
        self.clear_towers();
    }

    /// A map is usable once it has a source and non-zero dimensions.
    pub fn is_valid(&self) -> bool {
        self.src.is_some() && self.nphi > 0 && self.neta > 0
    }

    /// Writes one cell; out-of-range coordinates are logged and ignored.
    pub fn add_tower(&mut self, iphi: usize, ieta: usize, pt: f32, is_masked: bool) {
        if iphi >= self.nphi || ieta >= self.neta {
            warn!("CaloWindowMap::add_tower - invalid iphi or ieta: {}, {}", iphi, ieta);
            return;
        }

        if self.towers.len() < self.nphi * self.neta {
            self.towers.resize(self.nphi * self.neta, 0.0);
        }

        self.towers[iphi + ieta * self.nphi] = if is_masked { MASK_ENERGY } else { pt };
    }

    pub fn tower(&self, iphi: usize, ieta: usize) -> Option<f32> {
        if iphi >= self.nphi || ieta >= self.neta {
            return None;
        }
        self.towers.get(iphi + ieta * self.nphi).copied()
    }

    #[inline]
    fn valid_shape(&self, dphi: usize, deta: usize) -> bool {
        dphi != 0 && dphi <= self.nphi && deta != 0 && deta <= self.neta
    }

    /// Number of `(dphi, deta)` windows tiling the grid, zero for an invalid shape.
    pub fn n_windows(&self, dphi: usize, deta: usize) -> usize {
        if !self.valid_shape(dphi, deta) {
            return 0;
        }
        (self.neta - deta + 1) * self.nphi
    }

    /// Cells of window `iwindow` as `(iphi, ieta)`, eta-major, phi wrapping.
    fn window_cells(&self, dphi: usize, deta: usize, iwindow: usize) -> impl Iterator<Item = (usize, usize)> {
        let nphi = self.nphi;
        let eta_start = iwindow / nphi;
        let phi_start = iwindow % nphi;
        iproduct!(0..deta, 0..dphi).map(move |(deta_idx, dphi_idx)| {
            ((phi_start + dphi_idx) % nphi, eta_start + deta_idx)
        })
    }

    /// Sum of every `(dphi, deta)` window, indexed by `eta_start * nphi + phi_start`.
    ///
    /// Windows wrap around in phi and slide over `neta - deta + 1` eta positions.
    ///
    /// # Arguments
    ///
    /// * `dphi` - Window width in phi bins, `1..=nphi`.
    /// * `deta` - Window height in eta bins, `1..=neta`.
    ///
    /// # Returns
    ///
    /// * `nphi * (neta - deta + 1)` window sums; a window containing a masked cell is
    ///   [`MASK_ENERGY`]. An invalid shape gives an empty vector.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use uecore::data::calo_window_map::{CaloWindowMap, MASK_ENERGY};
    /// let mut map = CaloWindowMap::new();
    /// map.set_nphi_neta(4, 3);
    /// map.add_tower(3, 0, 1.0, false);
    /// map.add_tower(0, 0, 2.0, false);
    /// map.add_tower(1, 2, 5.0, true);
    ///
    /// let windows = map.calo_windows(2, 1);
    /// assert_eq!(windows.len(), 12);
    /// assert_eq!(windows[3], 3.0);
    /// assert_eq!(windows[2 * 4 + 1], MASK_ENERGY);
    /// assert!(map.calo_windows(5, 1).is_empty());
    /// ```
    pub fn calo_windows(&self, dphi: usize, deta: usize) -> Vec<f32> {
        if !self.valid_shape(dphi, deta) {
            warn!("CaloWindowMap::calo_windows - invalid dphi or deta: {}, {}", dphi, deta);
            return Vec::new();
        }

        let num_windows = self.n_windows(dphi, deta);
        let mut calo_windows = Vec::with_capacity(num_windows);

        for window_idx in 0..num_windows {
            let mut is_masked = false;
            let mut window_sum = 0.0f32;

            for (phi, eta) in self.window_cells(dphi, deta, window_idx) {
                let value = self.towers[phi + eta * self.nphi];
                if value == MASK_ENERGY {
                    is_masked = true;
                }
                window_sum += value;
            }

            calo_windows.push(if is_masked { MASK_ENERGY } else { window_sum });
        }

        calo_windows
    }

    fn check_window(&self, dphi: usize, deta: usize, iwindow: usize, caller: &str) -> bool {
        if !self.valid_shape(dphi, deta) {
            warn!("CaloWindowMap::{} - invalid dphi or deta: {}, {}", caller, dphi, deta);
            return false;
        }
        if iwindow >= self.n_windows(dphi, deta) {
            warn!("CaloWindowMap::{} - invalid iwindow: {}", caller, iwindow);
            return false;
        }
        true
    }

    /// Grid coordinates `(iphi, ieta)` of the members of window `iwindow`.
    pub fn window_comps_phieta(&self, dphi: usize, deta: usize, iwindow: usize) -> Vec<(usize, usize)> {
        if !self.check_window(dphi, deta, iwindow, "window_comps_phieta") {
            return Vec::new();
        }
        self.window_cells(dphi, deta, iwindow).collect()
    }

    /// Members of window `iwindow` as `(cell value, key)`, key from [`encode_window_key`].
    pub fn window_comps_energy_key(&self, dphi: usize, deta: usize, iwindow: usize) -> Vec<(f32, u32)> {
        if !self.check_window(dphi, deta, iwindow, "window_comps_energy_key") {
            return Vec::new();
        }
        self.window_cells(dphi, deta, iwindow)
            .map(|(phi, eta)| (self.towers[phi + eta * self.nphi], encode_window_key(phi as u32, eta as u32)))
            .collect()
    }
}

impl Display for CaloWindowMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let src = self.src.map(|s| s.suffix()).unwrap_or("VOID");
        write!(f, "CaloWindowMap {}: (nphi, neta) = ({}, {}) with {} towers", src, self.nphi, self.neta, self.towers.len())
    }
}
