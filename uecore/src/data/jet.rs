use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Reconstructed jet axis and transverse momentum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    pub pt: f32,
    pub eta: f32,
    pub phi: f32,
}

impl Jet {
    pub fn new(pt: f32, eta: f32, phi: f32) -> Self {
        Jet { pt, eta, phi }
    }

    fn has_axis(&self) -> bool {
        !self.pt.is_nan() && !self.eta.is_nan() && !self.phi.is_nan()
    }
}

/// Highest-pT jet with a well-defined axis, `None` for an empty collection.
pub fn leading_jet(jets: &[Jet]) -> Option<&Jet> {
    jets.iter()
        .filter(|jet| jet.has_axis())
        .max_by_key(|jet| OrderedFloat(jet.pt))
}
