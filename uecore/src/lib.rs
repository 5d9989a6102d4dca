// calorimeter module
pub mod calo {
    pub mod source;
    pub mod tower;
    pub mod geometry;
}

// algorithm module
pub mod algorithm {
    pub mod kinematics;
}

// data module
pub mod data {
    pub mod calo_window_map;
    pub mod window_stats;
    pub mod random_cone;
    pub mod jet;
}

pub mod error;
