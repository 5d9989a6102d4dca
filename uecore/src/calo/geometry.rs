use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::calo::source::CalorimeterId;
use crate::error::{UeError, UeResult};

/// Pseudorapidity acceptance of the idealised barrel geometry.
pub const IDEAL_MAX_ABS_ETA: f64 = 1.1;

/// Static center position of one tower.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerGeom {
    pub radius: f64,
    pub phi: f64,
    pub eta: f64,
}

/// Dense `(ieta, iphi)` lookup of tower positions for one calorimeter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeometryTable {
    pub calo: CalorimeterId,
    nphi: usize,
    neta: usize,
    towers: Vec<TowerGeom>,
}

impl GeometryTable {
    /// Builds a table from positions ordered phi-fastest (`iphi + ieta * nphi`).
    pub fn new(calo: CalorimeterId, towers: Vec<TowerGeom>) -> UeResult<Self> {
        let shape = calo.grid_shape();
        if towers.len() != shape.n_cells() {
            return Err(UeError::GeometrySizeMismatch {
                calo: calo.to_string(),
                expected: shape.n_cells(),
                actual: towers.len(),
            });
        }
        Ok(GeometryTable { calo, nphi: shape.nphi, neta: shape.neta, towers })
    }

    /// Idealised cylinder: constant radius, uniform eta bins over
    /// `[-1.1, 1.1]` and phi bin centers spanning `(-pi, pi)`.
    pub fn cylindrical(calo: CalorimeterId) -> Self {
        let shape = calo.grid_shape();
        let radius = calo.nominal_radius();
        let eta_width = 2.0 * IDEAL_MAX_ABS_ETA / shape.neta as f64;
        let phi_width = 2.0 * PI / shape.nphi as f64;

        let mut towers = Vec::with_capacity(shape.n_cells());
        for ieta in 0..shape.neta {
            let eta = -IDEAL_MAX_ABS_ETA + (ieta as f64 + 0.5) * eta_width;
            for iphi in 0..shape.nphi {
                let phi = -PI + (iphi as f64 + 0.5) * phi_width;
                towers.push(TowerGeom { radius, phi, eta });
            }
        }

        GeometryTable { calo, nphi: shape.nphi, neta: shape.neta, towers }
    }

    pub fn get(&self, ieta: u32, iphi: u32) -> Option<&TowerGeom> {
        let (ieta, iphi) = (ieta as usize, iphi as usize);
        if ieta >= self.neta || iphi >= self.nphi {
            return None;
        }
        self.towers.get(iphi + ieta * self.nphi)
    }

    /// Checks a table that did not go through [`GeometryTable::new`], e.g. one read from JSON.
    ///
    /// # Returns
    ///
    /// * `Err` if the grid dimensions or the tower count differ from the calorimeter's
    ///   grid, or if any tower has a phi outside `(-pi, pi]`.
    pub fn validate(&self) -> UeResult<()> {
        let shape = self.calo.grid_shape();
        if (self.nphi, self.neta) != (shape.nphi, shape.neta) {
            return Err(UeError::GeometryShapeMismatch {
                calo: self.calo.to_string(),
                expected: (shape.nphi, shape.neta),
                actual: (self.nphi, self.neta),
            });
        }
        if self.towers.len() != shape.n_cells() {
            return Err(UeError::GeometrySizeMismatch {
                calo: self.calo.to_string(),
                expected: shape.n_cells(),
                actual: self.towers.len(),
            });
        }
        if let Some((channel, tower)) = self.towers.iter().enumerate().find(|(_, t)| !(t.phi > -PI && t.phi <= PI)) {
            return Err(UeError::GeometryPhiOutOfRange { calo: self.calo.to_string(), channel, phi: tower.phi });
        }
        Ok(())
    }

    /// Radius of the reference tower `(0, 0)`.
    pub fn reference_radius(&self) -> Option<f64> {
        self.get(0, 0).map(|g| g.radius)
    }
}

/// Geometry tables of all calorimeters available to a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeometryStore {
    tables: BTreeMap<CalorimeterId, GeometryTable>,
}

impl GeometryStore {
    pub fn new() -> Self {
        GeometryStore::default()
    }

    /// Store holding the idealised cylindrical table of every calorimeter.
    pub fn ideal() -> Self {
        let mut store = GeometryStore::new();
        for calo in CalorimeterId::ALL {
            store.insert(GeometryTable::cylindrical(calo));
        }
        store
    }

    pub fn insert(&mut self, table: GeometryTable) {
        self.tables.insert(table.calo, table);
    }

    pub fn get(&self, calo: CalorimeterId) -> Option<&GeometryTable> {
        self.tables.get(&calo)
    }

    pub fn contains(&self, calo: CalorimeterId) -> bool {
        self.tables.contains_key(&calo)
    }

    /// Validates every table and that each is stored under its own calorimeter.
    pub fn validate(&self) -> UeResult<()> {
        for (key, table) in &self.tables {
            if *key != table.calo {
                return Err(UeError::GeometryKeyMismatch { key: key.to_string(), calo: table.calo.to_string() });
            }
            table.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylindrical_bins() {
        let table = GeometryTable::cylindrical(CalorimeterId::HcalIn);
        let first = table.get(0, 0).unwrap();
        let last = table.get(23, 63).unwrap();

        assert!((first.eta + 1.1 - 2.2 / 48.0).abs() < 1e-12);
        assert!((last.eta - 1.1 + 2.2 / 48.0).abs() < 1e-12);
        assert!(first.phi > -PI && last.phi < PI);
        assert_eq!(table.reference_radius(), Some(127.5));
    }

    #[test]
    fn test_out_of_range_lookup() {
        let table = GeometryTable::cylindrical(CalorimeterId::Cemc);
        assert!(table.get(95, 255).is_some());
        assert!(table.get(96, 0).is_none());
        assert!(table.get(0, 256).is_none());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let towers = vec![TowerGeom { radius: 1.0, phi: 0.0, eta: 0.0 }; 10];
        assert!(GeometryTable::new(CalorimeterId::HcalOut, towers).is_err());
    }

    #[test]
    fn test_ideal_store() {
        let store = GeometryStore::ideal();
        for calo in CalorimeterId::ALL {
            assert!(store.contains(calo));
        }
        assert_eq!(store.validate(), Ok(()));
    }

    #[test]
    fn test_empty_table_from_json_rejected() {
        let json = r#"{"tables":{"HCALIN":{"calo":"HCALIN","nphi":64,"neta":24,"towers":[]}}}"#;
        let store: GeometryStore = serde_json::from_str(json).unwrap();
        assert_eq!(
            store.validate(),
            Err(UeError::GeometrySizeMismatch { calo: "HCALIN".to_string(), expected: 64 * 24, actual: 0 })
        );
    }

    #[test]
    fn test_wrong_grid_rejected() {
        let mut table = GeometryTable::cylindrical(CalorimeterId::HcalOut);
        table.nphi = 24;
        table.neta = 64;
        assert!(matches!(table.validate(), Err(UeError::GeometryShapeMismatch { .. })));
    }

    #[test]
    fn test_misplaced_table_rejected() {
        let table = GeometryTable::cylindrical(CalorimeterId::HcalOut);
        let mut store = GeometryStore::new();
        store.tables.insert(CalorimeterId::HcalIn, table);
        assert!(matches!(store.validate(), Err(UeError::GeometryKeyMismatch { .. })));
    }

    #[test]
    fn test_phi_out_of_range_rejected() {
        let mut table = GeometryTable::cylindrical(CalorimeterId::HcalIn);
        table.towers[5].phi = 1.5 * PI;
        assert_eq!(
            table.validate(),
            Err(UeError::GeometryPhiOutOfRange { calo: "HCALIN".to_string(), channel: 5, phi: 1.5 * PI })
        );
    }
}
