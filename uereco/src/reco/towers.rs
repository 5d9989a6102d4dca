//! Vertex-corrected tower positions shared by the window and cone modules.

use log::warn;
use uecore::algorithm::kinematics::VertexCorrection;
use uecore::calo::geometry::{GeometryStore, GeometryTable};
use uecore::calo::tower::TowerInfoContainer;

use crate::config::RecoInput;
use crate::error::{RecoError, RecoResult};
use crate::event::Event;

/// One tower after the vertex correction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectedTower {
    pub channel: u32,
    pub ieta: u32,
    pub iphi: u32,
    pub eta: f64,
    pub phi: f64,
    pub pt: f64,
    pub is_masked: bool,
}

/// Checks that the geometry needed by `input` is loaded.
pub fn check_geometry(input: &RecoInput, geometry: &GeometryStore) -> RecoResult<()> {
    let calo = input.geometry();
    if !geometry.contains(calo) {
        return Err(RecoError::MissingGeometry(calo.geometry_node()));
    }
    Ok(())
}

/// Tower collection and geometry table of `input`; either one missing stops the run.
pub fn fetch_input<'a>(
    input: &RecoInput,
    event: &'a Event,
    geometry: &'a GeometryStore,
) -> RecoResult<(&'a TowerInfoContainer, &'a GeometryTable)> {
    let node = input.tower_node();
    let towers = event.tower_container(&node).ok_or(RecoError::MissingTowerNode(node))?;
    let calo = input.geometry();
    let table = geometry.get(calo).ok_or_else(|| RecoError::MissingGeometry(calo.geometry_node()))?;
    Ok((towers, table))
}

/// Radius replacing the geometry radius for retowered inputs, if resolvable.
fn substituted_radius(input: &RecoInput, geometry: &GeometryStore) -> Option<f64> {
    let calo = input.source.radius_from()?;
    let radius = geometry.get(calo).and_then(|table| table.reference_radius());
    if radius.is_none() {
        warn!(
            "cannot resolve {} radius for retowered input {}, keeping the {} radius",
            calo.geometry_node(),
            input.tower_node(),
            input.geometry()
        );
    }
    radius
}

/// Applies the vertex correction to every tower of `towers`.
///
/// Towers whose grid coordinates fall outside the geometry table are logged and skipped.
pub fn correct_towers(
    input: &RecoInput,
    towers: &TowerInfoContainer,
    table: &GeometryTable,
    geometry: &GeometryStore,
    correction: VertexCorrection,
) -> Vec<CorrectedTower> {
    let radius_override = substituted_radius(input, geometry);

    let mut corrected = Vec::with_capacity(towers.size());
    for (channel, tower) in towers.towers.iter().enumerate() {
        let Some(tower_geom) = table.get(tower.ieta, tower.iphi) else {
            warn!(
                "{}: channel {} has invalid ieta or iphi: {}, {}",
                input.tower_node(),
                channel,
                tower.ieta,
                tower.iphi
            );
            continue;
        };

        let r = radius_override.unwrap_or(tower_geom.radius);
        let eta = correction.corrected_eta(tower_geom.eta, r);
        let pt = VertexCorrection::transverse_momentum(tower.energy as f64, eta);

        corrected.push(CorrectedTower {
            channel: channel as u32,
            ieta: tower.ieta,
            iphi: tower.iphi,
            eta,
            phi: tower_geom.phi,
            pt,
            is_masked: tower.is_masked(),
        });
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use uecore::calo::source::{CaloSource, CalorimeterId};
    use uecore::calo::tower::TowerInfo;

    #[test]
    fn test_zero_vertex_keeps_geometry_eta() {
        let geometry = GeometryStore::ideal();
        let input = RecoInput::new(CaloSource::HcalOut);
        let table = geometry.get(CalorimeterId::HcalOut).unwrap();
        let mut towers = TowerInfoContainer::empty_grid(CaloSource::HcalOut);
        towers.towers[70].energy = 3.0;

        let corrected = correct_towers(&input, &towers, table, &geometry, VertexCorrection::new(0.0));
        assert_eq!(corrected.len(), 64 * 24);

        let tower = corrected[70];
        let geom = table.get(tower.ieta, tower.iphi).unwrap();
        assert!((tower.eta - geom.eta).abs() < 1e-12);
        assert!((tower.pt - 3.0 / geom.eta.cosh()).abs() < 1e-9);
    }

    #[test]
    fn test_retowered_input_uses_emcal_radius() {
        let geometry = GeometryStore::ideal();
        let input = RecoInput::new(CaloSource::CemcRetower);
        let table = geometry.get(CalorimeterId::HcalIn).unwrap();
        let towers = TowerInfoContainer::new(CaloSource::CemcRetower, vec![TowerInfo::new(20, 5, 1.0)]);
        let correction = VertexCorrection::new(25.0);

        let corrected = correct_towers(&input, &towers, table, &geometry, correction);
        let geom = table.get(20, 5).unwrap();
        let emcal_radius = CalorimeterId::Cemc.nominal_radius();
        assert!((corrected[0].eta - correction.corrected_eta(geom.eta, emcal_radius)).abs() < 1e-12);
        assert!((corrected[0].eta - correction.corrected_eta(geom.eta, geom.radius)).abs() > 1e-6);
    }

    #[test]
    fn test_unresolved_radius_keeps_own() {
        let mut geometry = GeometryStore::new();
        geometry.insert(GeometryTable::cylindrical(CalorimeterId::HcalIn));
        let input = RecoInput::new(CaloSource::CemcRetowerSub1);
        let table = geometry.get(CalorimeterId::HcalIn).unwrap();
        let towers = TowerInfoContainer::new(CaloSource::CemcRetowerSub1, vec![TowerInfo::new(3, 3, 1.0)]);
        let correction = VertexCorrection::new(-10.0);

        let corrected = correct_towers(&input, &towers, table, &geometry, correction);
        let geom = table.get(3, 3).unwrap();
        assert!((corrected[0].eta - correction.corrected_eta(geom.eta, geom.radius)).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_coordinates_skipped() {
        let geometry = GeometryStore::ideal();
        let input = RecoInput::new(CaloSource::HcalIn);
        let table = geometry.get(CalorimeterId::HcalIn).unwrap();
        let towers = TowerInfoContainer::new(
            CaloSource::HcalIn,
            vec![TowerInfo::new(24, 0, 1.0), TowerInfo::new(0, 64, 1.0), TowerInfo::new(1, 1, f32::NAN)],
        );

        let corrected = correct_towers(&input, &towers, table, &geometry, VertexCorrection::new(0.0));
        assert_eq!(corrected.len(), 1);
        assert_eq!(corrected[0].channel, 2);
        assert!(corrected[0].is_masked);
        assert_eq!(corrected[0].pt, 0.0);
    }

    #[test]
    fn test_missing_nodes() {
        let geometry = GeometryStore::new();
        let input = RecoInput::new(CaloSource::Cemc);
        let mut event = Event::new(0);
        assert!(matches!(fetch_input(&input, &event, &geometry), Err(RecoError::MissingTowerNode(_))));

        event.insert_towers("TOWERINFO_CALIB_CEMC", TowerInfoContainer::empty_grid(CaloSource::Cemc));
        assert!(matches!(fetch_input(&input, &event, &geometry), Err(RecoError::MissingGeometry(_))));
        assert!(check_geometry(&input, &geometry).is_err());
    }
}
