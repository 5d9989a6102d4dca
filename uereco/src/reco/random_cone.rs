//! Random-cone placement with masked-fraction retries.
//!
//! Each event the module samples a cone axis, collects every tower of every
//! input within `R` of it, and accepts the cone if no input exceeds the
//! masked-fraction threshold. A breach by any input discards the whole cone
//! and resamples; after [`MAX_CONE_TRIALS`] rejected trials the event is aborted.

use std::f64::consts::PI;

use log::{debug, info, warn};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uecore::algorithm::kinematics::{delta_r, wrap_phi};
use uecore::calo::geometry::GeometryStore;
use uecore::calo::source::CaloSource;
use uecore::data::jet::leading_jet;
use uecore::data::random_cone::RandomCone;

use crate::config::{resolve_seed, RandomConeConfig};
use crate::error::RecoResult;
use crate::event::Event;
use crate::reco::status::{AbortReason, EventStatus};
use crate::reco::towers::{check_geometry, correct_towers, fetch_input, CorrectedTower};
use crate::reco::vertex::VertexGate;

const MODULE: &str = "RandomConeTowerReco";

/// Placement trials per event before the event is aborted.
pub const MAX_CONE_TRIALS: u32 = 10;

/// Seeded source of cone axes, owned by one reco module.
pub struct ConeAxisSampler {
    rng: ChaCha8Rng,
    max_abs_eta: f64,
}

impl ConeAxisSampler {
    pub fn new(seed: u64, max_abs_eta: f64) -> Self {
        ConeAxisSampler { rng: ChaCha8Rng::seed_from_u64(seed), max_abs_eta }
    }

    /// `eta` uniform in `[-max_abs_eta, max_abs_eta)`, `phi` uniform in `(-pi, pi]`.
    pub fn uniform(&mut self) -> (f64, f64) {
        let eta = self.rng.gen_range(-self.max_abs_eta..self.max_abs_eta);
        let phi = wrap_phi(self.rng.gen_range(-PI..PI));
        (eta, phi)
    }

    /// Axis at least `min_dr` away from `(lead_eta, lead_phi)`.
    ///
    /// `phi` is drawn from the band `[lead_phi + min_dr, lead_phi + 2 pi - min_dr]`,
    /// which is non-empty for `min_dr < pi`; pairs failing the full dR test are redrawn.
    ///
    /// # Arguments
    ///
    /// * `lead_eta` - Pseudorapidity of the leading jet.
    /// * `lead_phi` - Azimuth of the leading jet, inside `(-pi, pi]`.
    /// * `min_dr` - Minimum distance from the jet, below `pi`.
    ///
    /// # Returns
    ///
    /// * `(eta, phi)` with `|eta| <= max_abs_eta`, `phi` in `(-pi, pi]` and a dR to the jet above `min_dr`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use uecore::algorithm::kinematics::delta_r;
    /// # use uereco::reco::random_cone::ConeAxisSampler;
    /// let mut sampler = ConeAxisSampler::new(42, 0.7);
    /// let (eta, phi) = sampler.avoiding(0.0, 0.0, 1.4);
    /// assert!(delta_r(eta, phi, 0.0, 0.0) > 1.4);
    /// ```
    pub fn avoiding(&mut self, lead_eta: f64, lead_phi: f64, min_dr: f64) -> (f64, f64) {
        loop {
            let dphi = self.rng.gen_range(min_dr..(2.0 * PI - min_dr));
            let phi = wrap_phi(lead_phi + dphi);
            let eta = self.rng.gen_range(-self.max_abs_eta..self.max_abs_eta);
            if delta_r(eta, phi, lead_eta, lead_phi) > min_dr {
                return (eta, phi);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum LeadJet {
    Unresolved,
    Resolved { eta: f64, phi: f64 },
    Unavailable,
}

struct Avoidance {
    jet_node: String,
    min_dr: f64,
}

/// Places one random cone per event over the configured inputs.
pub struct RandomConeTowerReco {
    config: RandomConeConfig,
    output_node: String,
    seed: u64,
    avoidance: Option<Avoidance>,
    sampler: ConeAxisSampler,
    cone: RandomCone,
    accepted: bool,
    trials: u32,
    lead_jet: LeadJet,
    vertex_gate: VertexGate,
}

impl RandomConeTowerReco {
    /// Validates the configuration, resolves defaults and seeds the generator.
    pub fn new(config: RandomConeConfig, geometry: &GeometryStore) -> RecoResult<Self> {
        config.validate()?;
        for input in &config.inputs {
            check_geometry(input, geometry)?;
        }

        let seed = resolve_seed(config.seed);
        let output_node = config.output_node_name();
        let max_abs_eta = config.resolved_max_abs_eta() as f64;
        let avoidance = config.avoid_lead_jet.as_ref().zip(config.resolved_min_dr()).map(|(avoid, min_dr)| Avoidance {
            jet_node: avoid.jet_node.clone(),
            min_dr: min_dr as f64,
        });

        info!(
            "{}: R = {} output node = {} max abs eta = {} masked threshold = {} seed = {}",
            MODULE, config.r, output_node, max_abs_eta, config.masked_threshold, seed
        );
        if let Some(avoid) = &avoidance {
            info!("{}: avoid leading jet = {} dR = {}", MODULE, avoid.jet_node, avoid.min_dr);
        }

        Ok(RandomConeTowerReco {
            config,
            output_node,
            seed,
            avoidance,
            sampler: ConeAxisSampler::new(seed, max_abs_eta),
            cone: RandomCone::new(),
            accepted: false,
            trials: 0,
            lead_jet: LeadJet::Unresolved,
            vertex_gate: VertexGate::new(),
        })
    }

    /// Runs the placement for one event.
    ///
    /// On [`EventStatus::Ok`] the accepted cone is available from [`RandomConeTowerReco::cone`].
    pub fn process_event(&mut self, event: &Event, geometry: &GeometryStore) -> RecoResult<EventStatus> {
        self.cone.reset();
        self.accepted = false;
        self.trials = 0;
        self.lead_jet = LeadJet::Unresolved;

        let Some(correction) = self.vertex_gate.acquire(event, MODULE) else {
            return Ok(EventStatus::AbortEvent(AbortReason::BadVertex));
        };

        let mut inputs: Vec<(CaloSource, Vec<CorrectedTower>)> = Vec::with_capacity(self.config.inputs.len());
        for input in &self.config.inputs {
            let (towers, table) = fetch_input(input, event, geometry)?;
            inputs.push((input.source, correct_towers(input, towers, table, geometry, correction)));
        }

        let r = self.config.r as f64;
        while self.trials < MAX_CONE_TRIALS {
            // membership uses the axis exactly as the cone stores it
            let (axis_eta, axis_phi) = self.cone_axis(event);
            let (axis_eta, axis_phi) = (axis_eta as f32, axis_phi as f32);
            let (cone_eta, cone_phi) = (axis_eta as f64, axis_phi as f64);

            self.cone.reset();
            self.cone.set_id(self.trials);
            self.cone.set_r(self.config.r);
            self.cone.set_eta(axis_eta);
            self.cone.set_phi(axis_phi);

            for (src, towers) in &inputs {
                for tower in towers {
                    if delta_r(tower.eta, tower.phi, cone_eta, cone_phi) < r {
                        self.cone.add_tower(*src, tower.pt as f32, tower.channel, tower.is_masked);
                    }
                }
            }
            self.trials += 1;

            if self.passes_masked_threshold() {
                self.accepted = true;
                debug!("{}: event {} {}", MODULE, event.event_id, self.cone);
                return Ok(EventStatus::Ok);
            }
            debug!("{}: cone failed masked threshold, trying again ({})", MODULE, self.trials);
        }

        warn!(
            "{}: cone failed masked threshold {} times in event {}, aborting event",
            MODULE, self.trials, event.event_id
        );
        Ok(EventStatus::AbortEvent(AbortReason::MaskedRetryExhausted { trials: self.trials }))
    }

    fn passes_masked_threshold(&self) -> bool {
        self.config
            .inputs
            .iter()
            .all(|input| self.cone.masked_fraction(Some(input.source)) <= self.config.masked_threshold)
    }

    /// Uniform axis, or one avoiding the leading jet once that jet is resolved for the event.
    fn cone_axis(&mut self, event: &Event) -> (f64, f64) {
        let Some(avoid) = &self.avoidance else {
            return self.sampler.uniform();
        };

        if self.lead_jet == LeadJet::Unresolved {
            self.lead_jet = match event.jet_collection(&avoid.jet_node) {
                None => {
                    warn!(
                        "{}: could not find leading jet node {}, uniform cones for event {}",
                        MODULE, avoid.jet_node, event.event_id
                    );
                    LeadJet::Unavailable
                }
                Some(jets) => match leading_jet(jets) {
                    Some(jet) => LeadJet::Resolved { eta: jet.eta as f64, phi: wrap_phi(jet.phi as f64) },
                    None => {
                        info!("{}: could not find leading jet in event {}", MODULE, event.event_id);
                        LeadJet::Unavailable
                    }
                },
            };
        }

        match self.lead_jet {
            LeadJet::Resolved { eta, phi } => self.sampler.avoiding(eta, phi, avoid.min_dr),
            _ => self.sampler.uniform(),
        }
    }

    /// The accepted cone of the last event, `None` if that event was aborted.
    pub fn cone(&self) -> Option<&RandomCone> {
        if self.accepted {
            Some(&self.cone)
        } else {
            None
        }
    }

    /// Trials used in the last event.
    pub fn trials(&self) -> u32 {
        self.trials
    }

    pub fn output_node(&self) -> &str {
        &self.output_node
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn dropped_vertex_events(&self) -> u64 {
        self.vertex_gate.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecoInput;
    use crate::error::RecoError;
    use uecore::calo::tower::TowerInfoContainer;
    use uecore::data::jet::Jet;

    fn hcal_event(vertex: f64) -> Event {
        let mut event = Event::new(0).with_vertex(vertex);
        let mut towers = TowerInfoContainer::empty_grid(CaloSource::HcalIn);
        for tower in towers.towers.iter_mut() {
            tower.energy = 0.5;
        }
        event.insert_towers("TOWERINFO_CALIB_HCALIN", towers);
        event
    }

    fn hcal_config(seed: u64) -> RandomConeConfig {
        RandomConeConfig::new(0.4).with_seed(seed).add_input(RecoInput::new(CaloSource::HcalIn))
    }

    #[test]
    fn test_uniform_axis_range() {
        let mut sampler = ConeAxisSampler::new(1234, 1.0);
        for _ in 0..10_000 {
            let (eta, phi) = sampler.uniform();
            assert!((-1.0..=1.0).contains(&eta));
            assert!(phi > -PI && phi <= PI);
        }
    }

    #[test]
    fn test_same_seed_same_axes() {
        let mut a = ConeAxisSampler::new(99, 0.7);
        let mut b = ConeAxisSampler::new(99, 0.7);
        for _ in 0..100 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn test_avoiding_axis_keeps_distance() {
        let mut sampler = ConeAxisSampler::new(7, 0.7);
        for _ in 0..10_000 {
            let (eta, phi) = sampler.avoiding(0.0, 0.0, 0.4);
            assert!(delta_r(eta, phi, 0.0, 0.0) > 0.4);
            assert!(phi > -PI && phi <= PI);
        }
    }

    #[test]
    fn test_avoiding_axis_near_boundary() {
        let mut sampler = ConeAxisSampler::new(8, 0.7);
        for _ in 0..2_000 {
            let (eta, phi) = sampler.avoiding(0.5, PI - 0.05, 1.4);
            assert!(delta_r(eta, phi, 0.5, PI - 0.05) > 1.4);
        }
    }

    #[test]
    fn test_accepts_clean_cone() {
        let geometry = GeometryStore::ideal();
        let mut reco = RandomConeTowerReco::new(hcal_config(5), &geometry).unwrap();
        let status = reco.process_event(&hcal_event(0.0), &geometry).unwrap();
        assert_eq!(status, EventStatus::Ok);
        assert_eq!(reco.trials(), 1);

        let cone = reco.cone().unwrap();
        assert_eq!(cone.id(), 0);
        assert!(cone.is_valid());
        assert!(cone.n_clustered(Some(CaloSource::HcalIn)) > 0);
        assert_eq!(cone.n_masked(None), 0);
        assert!((cone.eta() as f64).abs() <= 0.7 + 1e-6);

        let expected: f32 = cone.comp_src_vec(None).len() as f32;
        assert_eq!(cone.n_clustered(None) as f32, expected);
    }

    #[test]
    fn test_membership_matches_distance() {
        let geometry = GeometryStore::ideal();
        let event = hcal_event(3.0);
        let mut reco = RandomConeTowerReco::new(hcal_config(11), &geometry).unwrap();
        reco.process_event(&event, &geometry).unwrap();
        let cone = reco.cone().unwrap();

        let input = RecoInput::new(CaloSource::HcalIn);
        let (towers, table) = fetch_input(&input, &event, &geometry).unwrap();
        let corrected = correct_towers(&input, towers, table, &geometry, uecore::algorithm::kinematics::VertexCorrection::new(3.0));
        let mut inside: Vec<u32> = corrected
            .iter()
            .filter(|t| delta_r(t.eta, t.phi, cone.eta() as f64, cone.phi() as f64) < 0.4)
            .map(|t| t.channel)
            .collect();
        let mut members: Vec<u32> = cone.comp_src_vec(None).iter().map(|(_, ch)| *ch).collect();
        inside.sort_unstable();
        members.sort_unstable();

        assert!(!members.is_empty());
        assert_eq!(members, inside);
    }

    #[test]
    fn test_retry_cap_is_ten() {
        let geometry = GeometryStore::ideal();
        let mut event = hcal_event(0.0);
        if let Some(towers) = event.towers.get_mut("TOWERINFO_CALIB_HCALIN") {
            for tower in towers.towers.iter_mut() {
                tower.is_not_instr = true;
            }
        }

        let mut reco = RandomConeTowerReco::new(hcal_config(3).with_masked_threshold(0.0), &geometry).unwrap();
        let status = reco.process_event(&event, &geometry).unwrap();
        assert_eq!(status, EventStatus::AbortEvent(AbortReason::MaskedRetryExhausted { trials: 10 }));
        assert_eq!(reco.trials(), MAX_CONE_TRIALS);
        assert!(reco.cone().is_none());

        // the next clean event starts from scratch
        let status = reco.process_event(&hcal_event(0.0), &geometry).unwrap();
        assert_eq!(status, EventStatus::Ok);
    }

    fn two_input_event(mask_hcal_out: bool) -> Event {
        let mut event = hcal_event(0.0);
        let mut towers = TowerInfoContainer::empty_grid(CaloSource::HcalOut);
        for tower in towers.towers.iter_mut() {
            tower.energy = 0.5;
            tower.is_bad_chi2 = mask_hcal_out;
        }
        event.insert_towers("TOWERINFO_CALIB_HCALOUT", towers);
        event
    }

    #[test]
    fn test_one_masked_input_rejects_whole_cone() {
        let geometry = GeometryStore::ideal();
        let config = hcal_config(31).add_input(RecoInput::new(CaloSource::HcalOut)).with_masked_threshold(0.0);
        let mut reco = RandomConeTowerReco::new(config, &geometry).unwrap();

        let status = reco.process_event(&two_input_event(true), &geometry).unwrap();
        assert_eq!(status, EventStatus::AbortEvent(AbortReason::MaskedRetryExhausted { trials: 10 }));
        assert_eq!(reco.trials(), MAX_CONE_TRIALS);
        assert!(reco.cone().is_none());
    }

    #[test]
    fn test_clean_inputs_accepted_together() {
        let geometry = GeometryStore::ideal();
        let config = hcal_config(31).add_input(RecoInput::new(CaloSource::HcalOut)).with_masked_threshold(0.0);
        let mut reco = RandomConeTowerReco::new(config, &geometry).unwrap();

        let status = reco.process_event(&two_input_event(false), &geometry).unwrap();
        assert_eq!(status, EventStatus::Ok);
        assert_eq!(reco.trials(), 1);
        let cone = reco.cone().unwrap();
        assert!(cone.n_clustered(Some(CaloSource::HcalIn)) > 0);
        assert!(cone.n_clustered(Some(CaloSource::HcalOut)) > 0);

        // the masked outer input alone would abort, the clean inner one alone passes
        let mut reco = RandomConeTowerReco::new(hcal_config(31).with_masked_threshold(0.0), &geometry).unwrap();
        assert_eq!(reco.process_event(&two_input_event(true), &geometry).unwrap(), EventStatus::Ok);
    }

    #[test]
    fn test_threshold_tolerates_partial_masking() {
        let geometry = GeometryStore::ideal();
        let mut event = hcal_event(0.0);
        if let Some(towers) = event.towers.get_mut("TOWERINFO_CALIB_HCALIN") {
            for tower in towers.towers.iter_mut().filter(|t| t.iphi % 8 == 0) {
                tower.is_hot = true;
            }
        }

        let mut reco = RandomConeTowerReco::new(hcal_config(21).with_masked_threshold(0.5), &geometry).unwrap();
        assert_eq!(reco.process_event(&event, &geometry).unwrap(), EventStatus::Ok);
        assert!(reco.cone().unwrap().masked_fraction(Some(CaloSource::HcalIn)) <= 0.5);
    }

    #[test]
    fn test_bad_vertex() {
        let geometry = GeometryStore::ideal();
        let mut reco = RandomConeTowerReco::new(hcal_config(1), &geometry).unwrap();
        let status = reco.process_event(&hcal_event(f64::NAN), &geometry).unwrap();
        assert_eq!(status, EventStatus::AbortEvent(AbortReason::BadVertex));
        assert!(reco.cone().is_none());
        assert_eq!(reco.dropped_vertex_events(), 1);
    }

    #[test]
    fn test_avoids_leading_jet() {
        let geometry = GeometryStore::ideal();
        let config = hcal_config(17).avoid_lead_jet("AntiKt_r04", Some(0.4));
        let mut reco = RandomConeTowerReco::new(config, &geometry).unwrap();
        assert_eq!(reco.output_node(), "RandomCone_r4_avoidleadjet");

        let mut event = hcal_event(0.0);
        event.insert_jets("AntiKt_r04", vec![Jet::new(8.0, 0.3, 2.0), Jet::new(30.0, 0.0, 0.0)]);
        for _ in 0..200 {
            assert_eq!(reco.process_event(&event, &geometry).unwrap(), EventStatus::Ok);
            let cone = reco.cone().unwrap();
            assert!(delta_r(cone.eta() as f64, cone.phi() as f64, 0.0, 0.0) > 0.4 - 1e-6);
        }
    }

    #[test]
    fn test_missing_jets_fall_back_to_uniform() {
        let geometry = GeometryStore::ideal();
        let config = hcal_config(4).avoid_lead_jet("AntiKt_r04", None);
        let mut reco = RandomConeTowerReco::new(config, &geometry).unwrap();

        assert_eq!(reco.process_event(&hcal_event(0.0), &geometry).unwrap(), EventStatus::Ok);

        let mut event = hcal_event(0.0);
        event.insert_jets("AntiKt_r04", Vec::new());
        assert_eq!(reco.process_event(&event, &geometry).unwrap(), EventStatus::Ok);

        // avoidance resumes once jets are present again
        event.insert_jets("AntiKt_r04", vec![Jet::new(30.0, 0.0, 1.0)]);
        for _ in 0..50 {
            reco.process_event(&event, &geometry).unwrap();
            let cone = reco.cone().unwrap();
            assert!(delta_r(cone.eta() as f64, cone.phi() as f64, 0.0, 1.0) > 1.4 - 1e-6);
        }
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let geometry = GeometryStore::ideal();
        let mut reco = RandomConeTowerReco::new(hcal_config(2), &geometry).unwrap();
        let result = reco.process_event(&Event::new(0).with_vertex(0.0), &geometry);
        assert!(matches!(result, Err(RecoError::MissingTowerNode(_))));
    }

    #[test]
    fn test_new_rejects_empty_inputs() {
        let geometry = GeometryStore::ideal();
        let result = RandomConeTowerReco::new(RandomConeConfig::new(0.4).with_seed(1), &geometry);
        assert!(matches!(result, Err(RecoError::NoInputs(_))));
    }
}
