use log::{debug, warn};
use uecore::algorithm::kinematics::VertexCorrection;

use crate::event::Event;

/// Vertex acquisition with a per-module count of rejected events.
///
/// Only the first rejection is logged as a warning.
#[derive(Clone, Debug, Default)]
pub struct VertexGate {
    dropped: u64,
}

impl VertexGate {
    pub fn new() -> Self {
        VertexGate::default()
    }

    /// Correction for this event, or `None` if its vertex is unusable.
    pub fn acquire(&mut self, event: &Event, module: &str) -> Option<VertexCorrection> {
        let z = event.vertex_z();
        let correction = VertexCorrection::from_vertex(z);
        if correction.is_none() {
            self.dropped += 1;
            if self.dropped == 1 {
                warn!(
                    "{}: vertex is {:?} in event {}. Drop all tower inputs (further vertex warnings will be suppressed).",
                    module, z, event.event_id
                );
            } else {
                debug!("{}: vertex is {:?} in event {}, skipping", module, z, event.event_id);
            }
        }
        correction
    }

    /// Events rejected for their vertex so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
