//! Runs the configured reco modules event by event and collects their outputs.

use log::info;
use serde::{Deserialize, Serialize};
use uecore::calo::geometry::GeometryStore;
use uecore::data::random_cone::RandomCone;
use uecore::data::window_stats::WindowStats;

use crate::config::RunConfig;
use crate::error::RecoResult;
use crate::event::Event;
use crate::reco::calo_window::CaloWindowTowerReco;
use crate::reco::random_cone::RandomConeTowerReco;
use crate::reco::status::EventStatus;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowRecord {
    pub name: String,
    pub stats: Vec<WindowStats>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConeRecord {
    pub name: String,
    pub status: EventStatus,
    /// Accepted cone, absent when the event was aborted.
    pub cone: Option<RandomCone>,
}

/// Outputs of every module for one event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: u64,
    pub window_status: Option<EventStatus>,
    pub windows: Vec<WindowRecord>,
    pub cones: Vec<ConeRecord>,
}

pub struct UeDriver {
    geometry: GeometryStore,
    window_reco: Option<CaloWindowTowerReco>,
    cone_recos: Vec<RandomConeTowerReco>,
    shapes: Vec<(usize, usize)>,
    n_events: u64,
}

impl UeDriver {
    /// Builds every configured module; any configuration or geometry error stops the run here.
    pub fn new(config: RunConfig, geometry: GeometryStore) -> RecoResult<Self> {
        geometry.validate()?;
        let shapes = config.windows.as_ref().map(|w| w.shapes.clone()).unwrap_or_default();
        let window_reco = match config.windows {
            Some(windows) => Some(CaloWindowTowerReco::new(windows, &geometry)?),
            None => None,
        };
        let cone_recos = config
            .cones
            .into_iter()
            .map(|cone| RandomConeTowerReco::new(cone, &geometry))
            .collect::<RecoResult<Vec<_>>>()?;

        Ok(UeDriver { geometry, window_reco, cone_recos, shapes, n_events: 0 })
    }

    pub fn process_event(&mut self, event: &Event) -> RecoResult<EventRecord> {
        self.n_events += 1;

        let mut window_status = None;
        let mut windows = Vec::new();
        if let Some(reco) = &mut self.window_reco {
            let status = reco.process_event(event, &self.geometry)?;
            if status.is_ok() {
                windows = reco
                    .windows()
                    .map(|(name, map)| WindowRecord {
                        name: name.to_string(),
                        stats: self.shapes.iter().map(|&(dphi, deta)| WindowStats::from_map(map, dphi, deta)).collect(),
                    })
                    .collect();
            }
            window_status = Some(status);
        }

        let mut cones = Vec::with_capacity(self.cone_recos.len());
        for reco in &mut self.cone_recos {
            let status = reco.process_event(event, &self.geometry)?;
            cones.push(ConeRecord {
                name: reco.output_node().to_string(),
                status,
                cone: reco.cone().cloned(),
            });
        }

        Ok(EventRecord { event_id: event.event_id, window_status, windows, cones })
    }

    pub fn process_events(&mut self, events: &[Event]) -> RecoResult<Vec<EventRecord>> {
        let records = events.iter().map(|event| self.process_event(event)).collect::<RecoResult<Vec<_>>>()?;
        info!("processed {} events", self.n_events);
        Ok(records)
    }

    pub fn window_reco(&self) -> Option<&CaloWindowTowerReco> {
        self.window_reco.as_ref()
    }

    pub fn cone_recos(&self) -> &[RandomConeTowerReco] {
        &self.cone_recos
    }
}
