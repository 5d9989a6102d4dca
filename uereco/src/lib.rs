// src/lib.rs
pub mod config;
pub mod error;
pub mod event;
pub mod driver;

pub mod reco {
    pub mod status;
    pub mod vertex;
    pub mod towers;
    pub mod calo_window;
    pub mod random_cone;
}
