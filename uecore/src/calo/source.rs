use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UeError;

/// Dimensions of an angular grid, `nphi` azimuthal bins by `neta` pseudorapidity bins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub nphi: usize,
    pub neta: usize,
}

impl GridShape {
    pub const FINE: GridShape = GridShape { nphi: 256, neta: 96 };
    pub const COARSE: GridShape = GridShape { nphi: 64, neta: 24 };

    pub fn n_cells(&self) -> usize {
        self.nphi * self.neta
    }
}

/// Calorimeter subsystem owning a geometry table.
///
/// # Description
///
/// The electromagnetic calorimeter (`Cemc`) is the fine-granularity subsystem,
/// the inner and outer hadronic calorimeters share the coarse grid.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CalorimeterId {
    #[serde(rename = "CEMC")]
    Cemc,
    #[serde(rename = "HCALIN")]
    HcalIn,
    #[serde(rename = "HCALOUT")]
    HcalOut,
}

impl CalorimeterId {
    pub const ALL: [CalorimeterId; 3] = [CalorimeterId::Cemc, CalorimeterId::HcalIn, CalorimeterId::HcalOut];

    pub fn name(&self) -> &'static str {
        match self {
            CalorimeterId::Cemc => "CEMC",
            CalorimeterId::HcalIn => "HCALIN",
            CalorimeterId::HcalOut => "HCALOUT",
        }
    }

    /// Grid shape of the tower readout of this calorimeter.
    pub fn grid_shape(&self) -> GridShape {
        match self {
            CalorimeterId::Cemc => GridShape::FINE,
            CalorimeterId::HcalIn | CalorimeterId::HcalOut => GridShape::COARSE,
        }
    }

    /// Name of the geometry node, e.g. `TOWERGEOM_CEMC`.
    pub fn geometry_node(&self) -> String {
        format!("TOWERGEOM_{}", self.name())
    }

    /// Nominal tower-center radius in cm, used by the idealised geometry builder.
    pub fn nominal_radius(&self) -> f64 {
        match self {
            CalorimeterId::Cemc => 93.5,
            CalorimeterId::HcalIn => 127.5,
            CalorimeterId::HcalOut => 225.87,
        }
    }
}

impl Display for CalorimeterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CalorimeterId {
    type Err = UeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("TOWERGEOM_").unwrap_or(s);
        CalorimeterId::ALL
            .into_iter()
            .find(|calo| calo.name() == name)
            .ok_or_else(|| UeError::UnknownCalorimeter(s.to_string()))
    }
}

/// Tag identifying which tower collection a contribution came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaloSource {
    #[serde(rename = "CEMC")]
    Cemc,
    #[serde(rename = "HCALIN")]
    HcalIn,
    #[serde(rename = "HCALOUT")]
    HcalOut,
    #[serde(rename = "CEMC_RETOWER")]
    CemcRetower,
    #[serde(rename = "CEMC_RETOWER_SUB1")]
    CemcRetowerSub1,
    #[serde(rename = "HCALIN_SUB1")]
    HcalInSub1,
    #[serde(rename = "HCALOUT_SUB1")]
    HcalOutSub1,
}

struct SourceEntry {
    source: CaloSource,
    suffix: &'static str,
    geometry: CalorimeterId,
    radius_from: Option<CalorimeterId>,
}

// retowered EMCal towers sit on the inner HCal grid but keep the EMCal radius
const SOURCE_TABLE: [SourceEntry; 7] = [
    SourceEntry { source: CaloSource::Cemc, suffix: "CEMC", geometry: CalorimeterId::Cemc, radius_from: None },
    SourceEntry { source: CaloSource::HcalIn, suffix: "HCALIN", geometry: CalorimeterId::HcalIn, radius_from: None },
    SourceEntry { source: CaloSource::HcalOut, suffix: "HCALOUT", geometry: CalorimeterId::HcalOut, radius_from: None },
    SourceEntry { source: CaloSource::CemcRetower, suffix: "CEMC_RETOWER", geometry: CalorimeterId::HcalIn, radius_from: Some(CalorimeterId::Cemc) },
    SourceEntry { source: CaloSource::CemcRetowerSub1, suffix: "CEMC_RETOWER_SUB1", geometry: CalorimeterId::HcalIn, radius_from: Some(CalorimeterId::Cemc) },
    SourceEntry { source: CaloSource::HcalInSub1, suffix: "HCALIN_SUB1", geometry: CalorimeterId::HcalIn, radius_from: None },
    SourceEntry { source: CaloSource::HcalOutSub1, suffix: "HCALOUT_SUB1", geometry: CalorimeterId::HcalOut, radius_from: None },
];

impl CaloSource {
    pub const ALL: [CaloSource; 7] = [
        CaloSource::Cemc,
        CaloSource::HcalIn,
        CaloSource::HcalOut,
        CaloSource::CemcRetower,
        CaloSource::CemcRetowerSub1,
        CaloSource::HcalInSub1,
        CaloSource::HcalOutSub1,
    ];

    fn entry(&self) -> &'static SourceEntry {
        // the table is ordered like the enum
        &SOURCE_TABLE[*self as usize]
    }

    /// Node-name suffix of this source, e.g. `CEMC_RETOWER`.
    pub fn suffix(&self) -> &'static str {
        self.entry().suffix
    }

    /// Calorimeter whose geometry table locates the towers of this source.
    pub fn geometry(&self) -> CalorimeterId {
        self.entry().geometry
    }

    /// Calorimeter whose radius replaces the geometry radius, for retowered sources.
    pub fn radius_from(&self) -> Option<CalorimeterId> {
        self.entry().radius_from
    }

    pub fn is_retowered(&self) -> bool {
        self.radius_from().is_some()
    }

    pub fn grid_shape(&self) -> GridShape {
        self.geometry().grid_shape()
    }

    /// Tower node name for this source, `<prefix>_<suffix>`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use uecore::calo::source::CaloSource;
    /// assert_eq!(CaloSource::HcalIn.tower_node("TOWERINFO_CALIB"), "TOWERINFO_CALIB_HCALIN");
    /// ```
    pub fn tower_node(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.suffix())
    }
}

impl Display for CaloSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

impl FromStr for CaloSource {
    type Err = UeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SOURCE_TABLE
            .iter()
            .find(|entry| entry.suffix == s)
            .map(|entry| entry.source)
            .ok_or_else(|| UeError::UnknownSource(s.to_string()))
    }
}
