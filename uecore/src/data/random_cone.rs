//! Accumulator for one random-cone placement trial.
//!
//! Counters only ever grow between resets. Per-source entries are created
//! on the first contribution from that source.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::calo::source::CaloSource;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomCone {
    id: u32,
    pt: f32,
    eta: f32,
    phi: f32,
    #[serde(rename = "R")]
    r: f32,
    pt_map: BTreeMap<CaloSource, f32>,
    n_clustered: BTreeMap<CaloSource, u32>,
    n_masked: BTreeMap<CaloSource, u32>,
    comps: Vec<(CaloSource, u32)>,
}

impl Default for RandomCone {
    fn default() -> Self {
        RandomCone {
            id: 0,
            pt: 0.0,
            eta: f32::NAN,
            phi: f32::NAN,
            r: f32::NAN,
            pt_map: BTreeMap::new(),
            n_clustered: BTreeMap::new(),
            n_masked: BTreeMap::new(),
            comps: Vec::new(),
        }
    }
}

impl RandomCone {
    pub fn new() -> Self {
        RandomCone::default()
    }

    /// Clears all trial state, the axis and radius become NaN.
    pub fn reset(&mut self) {
        *self = RandomCone::default();
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn set_eta(&mut self, eta: f32) {
        self.eta = eta;
    }

    pub fn set_phi(&mut self, phi: f32) {
        self.phi = phi;
    }

    pub fn set_r(&mut self, r: f32) {
        self.r = r;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn eta(&self) -> f32 {
        self.eta
    }

    pub fn phi(&self) -> f32 {
        self.phi
    }

    pub fn r(&self) -> f32 {
        self.r
    }

    /// A cone is valid once its axis, radius and pt are all set.
    pub fn is_valid(&self) -> bool {
        !(self.pt.is_nan() || self.eta.is_nan() || self.phi.is_nan() || self.r.is_nan())
    }

    /// Adds one channel found inside the cone.
    ///
    /// Masked channels only raise the masked count; unmasked ones add their
    /// pt and join the membership list.
    ///
    /// # Arguments
    ///
    /// * `src` - Source the channel was read from.
    /// * `pt` - Vertex-corrected transverse momentum of the channel.
    /// * `channel` - Channel number within the source's tower collection.
    /// * `is_masked` - Whether the channel is flagged or has no valid energy.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use uecore::calo::source::CaloSource;
    /// # use uecore::data::random_cone::RandomCone;
    /// let mut cone = RandomCone::new();
    /// cone.add_tower(CaloSource::HcalIn, 1.5, 10, false);
    /// cone.add_tower(CaloSource::HcalIn, 9.0, 11, true);
    ///
    /// assert_eq!(cone.pt(None), 1.5);
    /// assert_eq!(cone.n_clustered(Some(CaloSource::HcalIn)), 1);
    /// assert_eq!(cone.masked_fraction(Some(CaloSource::HcalIn)), 0.5);
    /// assert_eq!(cone.comp_src_vec(None), vec![(CaloSource::HcalIn, 10)]);
    /// ```
    pub fn add_tower(&mut self, src: CaloSource, pt: f32, channel: u32, is_masked: bool) {
        if is_masked {
            *self.n_masked.entry(src).or_insert(0) += 1;
            return;
        }
        *self.n_clustered.entry(src).or_insert(0) += 1;
        *self.pt_map.entry(src).or_insert(0.0) += pt;
        self.pt += pt;
        self.comps.push((src, channel));
    }

    /// Total unmasked pt, or that of one source.
    pub fn pt(&self, src: Option<CaloSource>) -> f32 {
        match src {
            None => self.pt,
            Some(src) => self.pt_map.get(&src).copied().unwrap_or(0.0),
        }
    }

    fn count(map: &BTreeMap<CaloSource, u32>, src: Option<CaloSource>) -> u32 {
        match src {
            None => map.values().sum(),
            Some(src) => map.get(&src).copied().unwrap_or(0),
        }
    }

    pub fn n_clustered(&self, src: Option<CaloSource>) -> u32 {
        RandomCone::count(&self.n_clustered, src)
    }

    pub fn n_masked(&self, src: Option<CaloSource>) -> u32 {
        RandomCone::count(&self.n_masked, src)
    }

    /// `masked / (masked + clustered)`, zero for an empty cone.
    pub fn masked_fraction(&self, src: Option<CaloSource>) -> f32 {
        let n_masked = self.n_masked(src);
        let n_total = n_masked + self.n_clustered(src);
        if n_total == 0 {
            return 0.0;
        }
        n_masked as f32 / n_total as f32
    }

    /// Sources that contributed at least one channel, masked or not.
    pub fn sources(&self) -> Vec<CaloSource> {
        let mut srcs: Vec<CaloSource> = self.n_clustered.keys().chain(self.n_masked.keys()).copied().collect();
        srcs.sort();
        srcs.dedup();
        srcs
    }

    /// Unmasked `(source, channel)` members, optionally restricted to one source.
    pub fn comp_src_vec(&self, src: Option<CaloSource>) -> Vec<(CaloSource, u32)> {
        match src {
            None => self.comps.clone(),
            Some(src) => self.comps.iter().filter(|(s, _)| *s == src).copied().collect(),
        }
    }
}

impl Display for RandomCone {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RandomCone: (pt, eta, phi, R) = ({}, {}, {}, {})", self.pt, self.eta, self.phi, self.r)
    }
}
