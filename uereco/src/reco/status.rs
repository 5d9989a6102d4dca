use serde::{Deserialize, Serialize};

/// Why an event produced no output for a reco module.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AbortReason {
    /// Vertex missing, NaN or beyond the sanity bound
    BadVertex,
    /// Every cone trial exceeded the masked-fraction threshold
    MaskedRetryExhausted { trials: u32 },
}

/// Per-event outcome of a reco module; run-level failures are `Err` instead.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventStatus {
    Ok,
    AbortEvent(AbortReason),
}

impl EventStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, EventStatus::Ok)
    }
}
