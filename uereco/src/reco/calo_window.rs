use log::info;
use uecore::calo::geometry::GeometryStore;
use uecore::data::calo_window_map::CaloWindowMap;

use crate::config::WindowRecoConfig;
use crate::error::{RecoError, RecoResult};
use crate::event::Event;
use crate::reco::status::{AbortReason, EventStatus};
use crate::reco::towers::{check_geometry, correct_towers, fetch_input};
use crate::reco::vertex::VertexGate;

const MODULE: &str = "CaloWindowTowerReco";

/// Fills one angular grid per configured input with vertex-corrected tower pt.
pub struct CaloWindowTowerReco {
    config: WindowRecoConfig,
    window_names: Vec<String>,
    windows: Vec<CaloWindowMap>,
    vertex_gate: VertexGate,
}

impl CaloWindowTowerReco {
    /// Validates the configuration against the loaded geometry and creates the window maps.
    pub fn new(config: WindowRecoConfig, geometry: &GeometryStore) -> RecoResult<Self> {
        if config.inputs.is_empty() {
            return Err(RecoError::NoInputs(MODULE.to_string()));
        }

        let mut window_names = Vec::with_capacity(config.inputs.len());
        let mut windows = Vec::with_capacity(config.inputs.len());
        for input in &config.inputs {
            check_geometry(input, geometry)?;
            let name = config.window_name(input);
            info!(
                "{}: input node = {} geometry node = {} source = {} window node = {}",
                MODULE,
                input.tower_node(),
                input.geometry().geometry_node(),
                input.source,
                name
            );
            let mut window = CaloWindowMap::new();
            window.set_src(input.source);
            window.set_shape(input.grid_shape());
            window_names.push(name);
            windows.push(window);
        }

        Ok(CaloWindowTowerReco { config, window_names, windows, vertex_gate: VertexGate::new() })
    }

    /// Rebuilds every window map from the towers of `event`.
    ///
    /// Maps are zeroed first, so an event rejected for its vertex leaves them empty.
    pub fn process_event(&mut self, event: &Event, geometry: &GeometryStore) -> RecoResult<EventStatus> {
        for window in &mut self.windows {
            window.reset();
        }

        let Some(correction) = self.vertex_gate.acquire(event, MODULE) else {
            return Ok(EventStatus::AbortEvent(AbortReason::BadVertex));
        };

        for (input, window) in self.config.inputs.iter().zip(self.windows.iter_mut()) {
            let (towers, table) = fetch_input(input, event, geometry)?;

            window.set_src(input.source);
            window.set_shape(input.grid_shape());

            for tower in correct_towers(input, towers, table, geometry, correction) {
                window.add_tower(tower.iphi as usize, tower.ieta as usize, tower.pt as f32, tower.is_masked);
            }
        }

        Ok(EventStatus::Ok)
    }

    pub fn config(&self) -> &WindowRecoConfig {
        &self.config
    }

    pub fn window_names(&self) -> &[String] {
        &self.window_names
    }

    pub fn window(&self, name: &str) -> Option<&CaloWindowMap> {
        self.window_names.iter().position(|n| n == name).map(|i| &self.windows[i])
    }

    /// `(name, map)` pairs in input order.
    pub fn windows(&self) -> impl Iterator<Item = (&str, &CaloWindowMap)> {
        self.window_names.iter().map(|n| n.as_str()).zip(self.windows.iter())
    }

    pub fn dropped_vertex_events(&self) -> u64 {
        self.vertex_gate.dropped()
    }
}
