use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uecore::calo::tower::TowerInfoContainer;
use uecore::data::jet::Jet;

use crate::error::RecoResult;

/// Everything the reco modules read for one event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    /// Primary vertex z in cm, `None` when no vertex was reconstructed.
    #[serde(default)]
    pub vertex_z: Option<f64>,
    /// Tower collections keyed by node name.
    #[serde(default)]
    pub towers: BTreeMap<String, TowerInfoContainer>,
    /// Jet collections keyed by node name.
    #[serde(default)]
    pub jets: BTreeMap<String, Vec<Jet>>,
}

impl Event {
    pub fn new(event_id: u64) -> Self {
        Event { event_id, ..Default::default() }
    }

    pub fn with_vertex(mut self, z: f64) -> Self {
        self.vertex_z = Some(z);
        self
    }

    pub fn insert_towers(&mut self, node: &str, towers: TowerInfoContainer) {
        self.towers.insert(node.to_string(), towers);
    }

    pub fn insert_jets(&mut self, node: &str, jets: Vec<Jet>) {
        self.jets.insert(node.to_string(), jets);
    }

    pub fn vertex_z(&self) -> Option<f64> {
        self.vertex_z
    }

    pub fn tower_container(&self, node: &str) -> Option<&TowerInfoContainer> {
        self.towers.get(node)
    }

    pub fn jet_collection(&self, node: &str) -> Option<&[Jet]> {
        self.jets.get(node).map(|jets| jets.as_slice())
    }
}

/// Reads a JSON array of events.
pub fn read_events(path: &Path) -> RecoResult<Vec<Event>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uecore::calo::source::CaloSource;

    #[test]
    fn test_event_lookup() {
        let mut event = Event::new(3).with_vertex(-4.5);
        event.insert_towers("TOWERINFO_CALIB_HCALIN", TowerInfoContainer::empty_grid(CaloSource::HcalIn));
        event.insert_jets("AntiKt_r04", vec![Jet::new(20.0, 0.1, 0.2)]);

        assert_eq!(event.vertex_z(), Some(-4.5));
        assert_eq!(event.tower_container("TOWERINFO_CALIB_HCALIN").unwrap().size(), 64 * 24);
        assert!(event.tower_container("TOWERINFO_CALIB_CEMC").is_none());
        assert_eq!(event.jet_collection("AntiKt_r04").unwrap().len(), 1);
    }

    #[test]
    fn test_parse_event() {
        let json = r#"[{
            "event_id": 9,
            "vertex_z": null,
            "towers": { "TOWERINFO_CALIB_HCALOUT": { "source": "HCALOUT",
                "towers": [ { "ieta": 0, "iphi": 1, "energy": 0.5, "is_hot": true } ] } }
        }]"#;
        let events: Vec<Event> = serde_json::from_str(json).unwrap();

        assert_eq!(events[0].event_id, 9);
        assert_eq!(events[0].vertex_z(), None);
        let towers = events[0].tower_container("TOWERINFO_CALIB_HCALOUT").unwrap();
        assert!(towers.tower_at_channel(0).unwrap().is_masked());
        assert!(events[0].jets.is_empty());
    }
}
